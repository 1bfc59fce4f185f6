//! Capability-backed candidate review.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{FunctionDescriptor, TestScenario, Verdict};
use crate::domain::ports::{
    CapabilityRequest, CapabilityRole, Critic, ExecutionParameters, GenerationCapability,
};
use crate::infrastructure::logging::scrub_secrets;
use crate::services::prompts::PromptTemplates;
use crate::services::response::extract_json_from_response;

/// One requested change in a review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Improvement {
    /// What is wrong.
    pub issue: String,
    /// How to fix it.
    pub suggestion: String,
}

/// Review document returned by the reviewing capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewFeedback {
    /// Whether the test needs no changes.
    pub is_perfect: bool,
    /// Requested changes, if any.
    #[serde(default)]
    pub improvements_needed: Option<Vec<Improvement>>,
}

impl ReviewFeedback {
    /// Map a review onto a verdict. Contradictory reviews are rejections
    /// with no feedback; nothing ambiguous is ever accepted.
    pub fn into_verdict(self) -> Verdict {
        let improvements = self.improvements_needed.unwrap_or_default();
        match (self.is_perfect, improvements.is_empty()) {
            (true, true) => Verdict::Accept,
            (false, false) => Verdict::reject(
                improvements
                    .iter()
                    .map(|i| format!("- {}: {}", i.issue.trim(), i.suggestion.trim()))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            _ => Verdict::reject(""),
        }
    }
}

/// Parse raw capability output into a verdict. Anything unparseable is a
/// rejection with empty feedback.
pub fn parse_verdict(response: &str) -> Verdict {
    let json = extract_json_from_response(response);
    match serde_json::from_str::<ReviewFeedback>(&json) {
        Ok(feedback) => feedback.into_verdict(),
        Err(e) => {
            debug!(error = %e, "malformed review document");
            Verdict::reject("")
        }
    }
}

/// Reviews candidates through a generation capability.
pub struct LlmCritic {
    capability: Arc<dyn GenerationCapability>,
    templates: PromptTemplates,
    parameters: ExecutionParameters,
}

impl LlmCritic {
    /// Critic over `capability`.
    pub fn new(
        capability: Arc<dyn GenerationCapability>,
        templates: PromptTemplates,
        parameters: ExecutionParameters,
    ) -> Self {
        Self {
            capability,
            templates,
            parameters,
        }
    }
}

#[async_trait]
impl Critic for LlmCritic {
    #[instrument(skip(self, descriptor, scenario, candidate), fields(scenario = %scenario.id))]
    async fn review(
        &self,
        descriptor: &FunctionDescriptor,
        scenario: &TestScenario,
        candidate: &str,
    ) -> DomainResult<Verdict> {
        let scenario_json = scenario
            .to_prompt_json()
            .map_err(|e| DomainError::ReviewFailure(e.to_string()))?;

        let request = CapabilityRequest::new(
            CapabilityRole::Reviewer,
            self.templates.reviewer_system(),
            self.templates.reviewer(descriptor, &scenario_json, candidate),
        )
        .with_parameters(self.parameters.clone());

        let response = self.capability.generate(request).await.map_err(|e| {
            let reason = scrub_secrets(&e.to_string());
            warn!(error = %reason, "reviewer capability failed");
            DomainError::ReviewFailure(format!("reviewer capability failed: {reason}"))
        })?;

        Ok(parse_verdict(&response.content))
    }
}
