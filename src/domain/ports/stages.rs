//! Stage ports driven by the refinement orchestrator.
//!
//! The orchestrator only knows these contracts. The capability-backed
//! implementations live in `services`; tests substitute scripted ones.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{FunctionDescriptor, TestPlan, TestScenario, Verdict};

/// Turns a descriptor into a validated test plan.
#[async_trait]
pub trait ScenarioPlanner: Send + Sync {
    /// Fails with `DomainError::PlanningFailure`.
    async fn plan(&self, descriptor: &FunctionDescriptor) -> DomainResult<TestPlan>;
}

/// Produces one candidate test for one scenario.
#[async_trait]
pub trait CandidateSynthesizer: Send + Sync {
    /// `feedback` is the immediately preceding rejection's feedback, if any.
    ///
    /// Fails with `DomainError::SynthesisFailure`.
    async fn synthesize(
        &self,
        descriptor: &FunctionDescriptor,
        scenario: &TestScenario,
        feedback: Option<&str>,
    ) -> DomainResult<String>;
}

/// Judges a candidate against its scenario.
#[async_trait]
pub trait Critic: Send + Sync {
    /// Fails with `DomainError::ReviewFailure`.
    async fn review(
        &self,
        descriptor: &FunctionDescriptor,
        scenario: &TestScenario,
        candidate: &str,
    ) -> DomainResult<Verdict>;
}
