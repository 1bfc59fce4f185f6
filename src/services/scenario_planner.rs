//! Capability-backed scenario planning.
//!
//! Asks the generation capability for a categorized plan document, then
//! validates it locally. The capability never decides whether a plan is
//! valid; `PlanDocument::into_plan` does.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{FunctionDescriptor, PlanDocument, ScenarioCategory, TestPlan};
use crate::domain::ports::{
    CapabilityRequest, CapabilityRole, ExecutionParameters, GenerationCapability, ScenarioPlanner,
};
use crate::infrastructure::logging::scrub_secrets;
use crate::services::prompts::PromptTemplates;
use crate::services::response::extract_json_from_response;

/// Planner that delegates scenario enumeration to a generation capability.
pub struct LlmScenarioPlanner {
    capability: Arc<dyn GenerationCapability>,
    templates: PromptTemplates,
    parameters: ExecutionParameters,
    call_timeout: Duration,
}

impl LlmScenarioPlanner {
    /// Planner over `capability` with a per-call timeout.
    pub fn new(
        capability: Arc<dyn GenerationCapability>,
        templates: PromptTemplates,
        parameters: ExecutionParameters,
        call_timeout: Duration,
    ) -> Self {
        Self {
            capability,
            templates,
            parameters,
            call_timeout,
        }
    }

    /// Parse and validate raw capability output into a plan.
    pub fn parse_plan(response: &str) -> DomainResult<TestPlan> {
        let json = extract_json_from_response(response);
        let document: PlanDocument = serde_json::from_str(&json).map_err(|e| {
            DomainError::PlanningFailure(format!("unparseable plan document: {e}"))
        })?;
        document.into_plan()
    }
}

#[async_trait]
impl ScenarioPlanner for LlmScenarioPlanner {
    #[instrument(skip(self, descriptor), fields(function = %descriptor.qualified_name))]
    async fn plan(&self, descriptor: &FunctionDescriptor) -> DomainResult<TestPlan> {
        if !descriptor.has_behavior() {
            return Err(DomainError::PlanningFailure(format!(
                "{} has no actionable behavior to test",
                descriptor.qualified_name
            )));
        }

        let request = CapabilityRequest::new(
            CapabilityRole::Planner,
            self.templates.planner_system(),
            self.templates.planner(descriptor),
        )
        .with_context(descriptor.analysis_json())
        .with_parameters(self.parameters.clone());

        debug!(request_id = %request.request_id, "requesting test plan");

        let response = tokio::time::timeout(self.call_timeout, self.capability.generate(request))
            .await
            .map_err(|_| {
                DomainError::PlanningFailure(format!(
                    "planner timed out after {}s",
                    self.call_timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                let reason = scrub_secrets(&e.to_string());
                warn!(error = %reason, "planner capability failed");
                DomainError::PlanningFailure(format!("planner capability failed: {reason}"))
            })?;

        let plan = Self::parse_plan(&response.content)?;
        info!(
            scenarios = plan.len(),
            typical = plan.count(ScenarioCategory::Typical),
            boundary = plan.count(ScenarioCategory::Boundary),
            error = plan.count(ScenarioCategory::Error),
            "test plan validated"
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::capabilities::MockCapability;
    use crate::domain::models::descriptor::fixtures::add_descriptor;

    const PLAN: &str = r#"```json
{
  "typical": [
    {"description": "adds two positives", "inputs": {"number_a": 1, "number_b": 2}, "expected_outcome": {"returns": 3}}
  ],
  "boundary": [
    {"description": "adds zeros", "inputs": "{\"number_a\": 0, \"number_b\": 0}", "expected_outcome": {"returns": 0}}
  ],
  "error": [
    {"description": "rejects string input", "inputs": {"number_a": "x", "number_b": 5}, "expected_outcome": {"raises": "TypeError"}}
  ]
}
```"#;

    fn planner(capability: MockCapability) -> LlmScenarioPlanner {
        LlmScenarioPlanner::new(
            Arc::new(capability),
            PromptTemplates::default(),
            ExecutionParameters::default(),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_plan_flattens_categories_in_order() {
        let mock = MockCapability::new().with_response(CapabilityRole::Planner, PLAN);
        let plan = planner(mock).plan(&add_descriptor()).await.unwrap();

        let ids: Vec<&str> = plan.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["typical-1", "boundary-1", "error-1"]);
        assert_eq!(plan.scenarios()[1].inputs["number_a"], 0);
    }

    #[tokio::test]
    async fn test_empty_plan_is_planning_failure() {
        let mock = MockCapability::new().with_response(
            CapabilityRole::Planner,
            r#"{"typical": [], "boundary": [], "error": []}"#,
        );
        let err = planner(mock).plan(&add_descriptor()).await.unwrap_err();
        assert!(matches!(err, DomainError::PlanningFailure(_)));
    }

    #[tokio::test]
    async fn test_invariant_violation_is_rejected() {
        let mock = MockCapability::new().with_response(
            CapabilityRole::Planner,
            r#"{"error": [{"description": "bad", "inputs": {}, "expected_outcome": {"returns": 1}}]}"#,
        );
        let err = planner(mock).plan(&add_descriptor()).await.unwrap_err();
        assert_eq!(err.stage(), "planning");
    }

    #[tokio::test]
    async fn test_empty_body_never_calls_capability() {
        let mock = Arc::new(MockCapability::new());
        let planner = LlmScenarioPlanner::new(
            mock.clone(),
            PromptTemplates::default(),
            ExecutionParameters::default(),
            Duration::from_secs(5),
        );
        let mut descriptor = add_descriptor();
        descriptor.body = "def add(number_a: int, number_b: int) -> int:\n    pass".to_string();

        let err = planner.plan(&descriptor).await.unwrap_err();
        assert!(matches!(err, DomainError::PlanningFailure(_)));
        assert_eq!(mock.call_count(CapabilityRole::Planner), 0);
    }

    #[tokio::test]
    async fn test_capability_failure_is_planning_failure() {
        let mock = MockCapability::new().with_failure(
            CapabilityRole::Planner,
            crate::domain::ports::CapabilityError::Unavailable("offline".to_string()),
        );
        let err = planner(mock).plan(&add_descriptor()).await.unwrap_err();
        assert!(err.to_string().contains("offline"));
    }

    #[tokio::test]
    async fn test_unparseable_plan() {
        let mock = MockCapability::new().with_response(CapabilityRole::Planner, "I cannot help");
        let err = planner(mock).plan(&add_descriptor()).await.unwrap_err();
        assert!(matches!(err, DomainError::PlanningFailure(_)));
    }
}
