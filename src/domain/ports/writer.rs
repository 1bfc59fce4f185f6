//! Artifact writer port.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::domain::errors::DomainResult;
use crate::domain::models::OutputArtifact;

/// Persists an assembled artifact.
#[async_trait]
pub trait ArtifactWriter: Send + Sync {
    /// Writes the artifact and returns the path written.
    ///
    /// Fails with `DomainError::WriteFailure`.
    async fn write(&self, artifact: &OutputArtifact) -> DomainResult<PathBuf>;
}
