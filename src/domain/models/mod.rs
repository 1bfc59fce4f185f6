//! Pipeline data model.

pub mod artifact;
pub mod config;
pub mod descriptor;
pub mod refinement;
pub mod scenario;

pub use artifact::{OutputArtifact, RunReport};
pub use config::{
    CapabilityConfig, CapabilityKind, Config, LoggingConfig, OutputConfig, RateLimitConfig,
    RefinementConfig, RetryConfig,
};
pub use descriptor::{FunctionDescriptor, Parameter, UNTYPED};
pub use refinement::{
    AcceptedArtifact, AttemptStatus, ExhaustedPolicy, ExhaustedScenario, RefinementAttempt,
    RefinementState, ScenarioOutcome, Verdict, REVIEW_UNAVAILABLE,
};
pub use scenario::{
    ExpectedOutcome, PlanDocument, ScenarioCategory, ScenarioRecord, TestPlan, TestScenario,
};
