//! Capability-backed candidate synthesis.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{FunctionDescriptor, TestScenario};
use crate::domain::ports::{
    CandidateSynthesizer, CapabilityRequest, CapabilityRole, ExecutionParameters,
    GenerationCapability,
};
use crate::infrastructure::logging::scrub_secrets;
use crate::services::prompts::PromptTemplates;
use crate::services::response::strip_code_fences;

/// Writes one test unit per call through a generation capability.
pub struct LlmCandidateSynthesizer {
    capability: Arc<dyn GenerationCapability>,
    templates: PromptTemplates,
    parameters: ExecutionParameters,
}

impl LlmCandidateSynthesizer {
    /// Synthesizer over `capability`.
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
impl CandidateSynthesizer for LlmCandidateSynthesizer {
    #[instrument(skip(self, descriptor, scenario, feedback), fields(scenario = %scenario.id))]
    async fn synthesize(
        &self,
        descriptor: &FunctionDescriptor,
        scenario: &TestScenario,
        feedback: Option<&str>,
    ) -> DomainResult<String> {
        let scenario_json = scenario
            .to_prompt_json()
            .map_err(|e| DomainError::SynthesisFailure(e.to_string()))?;

        let request = CapabilityRequest::new(
            CapabilityRole::Writer,
            self.templates.writer_system(),
            self.templates.writer(descriptor, &scenario_json, feedback),
        )
        .with_context(json!({
            "function": descriptor.function_name(),
            "scenario": scenario,
        }))
        .with_parameters(self.parameters.clone());

        debug!(request_id = %request.request_id, has_feedback = feedback.is_some(), "drafting candidate");

        let response = self.capability.generate(request).await.map_err(|e| {
            DomainError::SynthesisFailure(format!(
                "writer capability failed: {}",
                scrub_secrets(&e.to_string())
            ))
        })?;

        let candidate = strip_code_fences(&response.content);
        if candidate.is_empty() {
            return Err(DomainError::SynthesisFailure(
                "writer returned an empty candidate".to_string(),
            ));
        }
        Ok(candidate)
    }
}
