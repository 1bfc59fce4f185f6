//! Ports (interfaces) for the domain layer
//!
//! Ports define the contracts the pipeline depends on. Adapters and
//! services implement them.

pub mod capability;
pub mod extractor;
pub mod stages;
pub mod writer;

pub use capability::{
    CapabilityError, CapabilityRequest, CapabilityResponse, CapabilityRole, ExecutionParameters,
    GenerationCapability, HealthStatus, StopReason, TokenUsage,
};
pub use extractor::FunctionExtractor;
pub use stages::{CandidateSynthesizer, Critic, ScenarioPlanner};
pub use writer::ArtifactWriter;
