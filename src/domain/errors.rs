//! Domain errors for the autotest pipeline.

use thiserror::Error;

/// Errors raised by pipeline stages.
///
/// Only [`AnalysisFailure`](DomainError::AnalysisFailure),
/// [`PlanningFailure`](DomainError::PlanningFailure),
/// [`AssemblyFailure`](DomainError::AssemblyFailure),
/// [`WriteFailure`](DomainError::WriteFailure) and
/// [`Cancelled`](DomainError::Cancelled) ever reach the caller of a run.
/// Synthesis and review failures are absorbed by the refinement loop.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The function could not be extracted.
    #[error("Analysis failed: {0}")]
    AnalysisFailure(String),

    /// No valid plan could be produced.
    #[error("Planning failed: {0}")]
    PlanningFailure(String),

    /// A candidate could not be drafted.
    #[error("Synthesis failed: {0}")]
    SynthesisFailure(String),

    /// A candidate could not be reviewed.
    #[error("Review failed: {0}")]
    ReviewFailure(String),

    /// The output file could not be assembled.
    #[error("Assembly failed: {0}")]
    AssemblyFailure(String),

    /// The output file could not be written.
    #[error("Write failed: {0}")]
    WriteFailure(String),

    /// The run was cancelled.
    #[error("Run cancelled")]
    Cancelled,

    /// An internal invariant did not hold.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// JSON or YAML could not be converted.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl DomainError {
    /// Pipeline stage label attached to the error.
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::AnalysisFailure(_) => "analysis",
            Self::PlanningFailure(_) => "planning",
            Self::SynthesisFailure(_) => "synthesis",
            Self::ReviewFailure(_) => "review",
            Self::AssemblyFailure(_) => "assembly",
            Self::WriteFailure(_) => "write",
            Self::Cancelled => "cancelled",
            Self::ValidationFailed(_) => "validation",
            Self::SerializationError(_) => "serialization",
        }
    }

    /// Whether the error aborts a run.
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::SynthesisFailure(_) | Self::ReviewFailure(_))
    }
}

/// Result alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_labels() {
        assert_eq!(DomainError::AnalysisFailure("x".into()).stage(), "analysis");
        assert_eq!(DomainError::PlanningFailure("x".into()).stage(), "planning");
        assert_eq!(DomainError::AssemblyFailure("x".into()).stage(), "assembly");
        assert_eq!(DomainError::Cancelled.stage(), "cancelled");
    }

    #[test]
    fn test_recoverable_errors_are_not_fatal() {
        assert!(!DomainError::SynthesisFailure("x".into()).is_fatal());
        assert!(!DomainError::ReviewFailure("x".into()).is_fatal());
        assert!(DomainError::PlanningFailure("x".into()).is_fatal());
        assert!(DomainError::WriteFailure("x".into()).is_fatal());
    }
}
