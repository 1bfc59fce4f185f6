//! Filesystem artifact writer.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{info, instrument};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::OutputArtifact;
use crate::domain::ports::ArtifactWriter;

/// Writes artifacts below a base directory, creating parent directories
/// as needed. Existing files are overwritten.
#[derive(Debug, Clone, Default)]
pub struct FileSystemWriter {
    base_dir: Option<PathBuf>,
}

impl FileSystemWriter {
    /// Writer resolving artifact paths against the working directory.
    pub const fn new() -> Self {
        Self { base_dir: None }
    }

    /// Writer resolving artifact paths against `base_dir`.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn resolve(&self, artifact: &OutputArtifact) -> PathBuf {
        match &self.base_dir {
            Some(base) => base.join(&artifact.path),
            None => artifact.path.clone(),
        }
    }
}

#[async_trait]
impl ArtifactWriter for FileSystemWriter {
    #[instrument(skip(self, artifact), fields(path = %artifact.path.display()))]
    async fn write(&self, artifact: &OutputArtifact) -> DomainResult<PathBuf> {
        let target = self.resolve(artifact);

        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                DomainError::WriteFailure(format!(
                    "cannot create directory '{}': {e}",
                    parent.display()
                ))
            })?;
        }

        tokio::fs::write(&target, artifact.text.as_bytes())
            .await
            .map_err(|e| {
                DomainError::WriteFailure(format!("cannot write '{}': {e}", target.display()))
            })?;

        info!(
            path = %target.display(),
            tests = artifact.test_count,
            "test file written"
        );
        Ok(target)
    }
}
