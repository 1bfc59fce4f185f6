//! Function extractor port.

use async_trait::async_trait;
use std::path::Path;

use crate::domain::errors::DomainResult;
use crate::domain::models::FunctionDescriptor;

/// Turns a source file and a function name into a descriptor.
#[async_trait]
pub trait FunctionExtractor: Send + Sync {
    /// Language handled by this extractor (e.g. "python").
    fn language(&self) -> &'static str;

    /// Fails with `DomainError::AnalysisFailure`.
    async fn extract(&self, source_path: &Path, function_name: &str) -> DomainResult<FunctionDescriptor>;
}
