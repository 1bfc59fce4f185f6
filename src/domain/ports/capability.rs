//! Generation capability port.
//!
//! A capability is the external text-generation backend. Planner,
//! synthesizer and critic all talk to the same capability type with
//! different instructions. Backends can be:
//! - Claude Code CLI (default, no API key needed)
//! - Anthropic API (direct API access)
//! - A scripted mock for offline runs and tests

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Which pipeline stage is asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityRole {
    /// Produces the scenario plan.
    Planner,
    /// Drafts test candidates.
    Writer,
    /// Judges test candidates.
    Reviewer,
}

impl CapabilityRole {
    /// Lowercase label used in logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Planner => "planner",
            Self::Writer => "writer",
            Self::Reviewer => "reviewer",
        }
    }
}

impl fmt::Display for CapabilityRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request sent to a generation capability
#[derive(Debug, Clone)]
pub struct CapabilityRequest {
    /// Unique request identifier
    pub request_id: Uuid,

    /// Stage issuing the request
    pub role: CapabilityRole,

    /// Standing instruction (system prompt)
    pub system_prompt: String,

    /// Per-call instruction
    pub prompt: String,

    /// Optional structured context
    pub context: Option<serde_json::Value>,

    /// Execution parameters (model, temperature, etc.)
    pub parameters: ExecutionParameters,
}

impl CapabilityRequest {
    /// Request with default parameters and no context.
    pub fn new(
        role: CapabilityRole,
        system_prompt: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            role,
            system_prompt: system_prompt.into(),
            prompt: prompt.into(),
            context: None,
            parameters: ExecutionParameters::default(),
        }
    }

    /// Attach structured JSON context.
    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Override execution parameters.
    pub fn with_parameters(mut self, parameters: ExecutionParameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Prompt with the structured context appended, for text-only backends.
    pub fn rendered_prompt(&self) -> String {
        match &self.context {
            Some(context) => format!(
                "{}\n\n## Context\n```json\n{}\n```",
                self.prompt,
                serde_json::to_string_pretty(context).unwrap_or_else(|_| context.to_string())
            ),
            None => self.prompt.clone(),
        }
    }
}

/// Parameters for controlling generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionParameters {
    /// Model override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Maximum tokens to generate (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature (0.0 - 1.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Additional backend-specific parameters
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Default for ExecutionParameters {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: Some(4096),
            temperature: Some(0.0),
            extra: HashMap::new(),
        }
    }
}

/// Response from a generation capability
#[derive(Debug, Clone)]
pub struct CapabilityResponse {
    /// Request identifier
    pub request_id: Uuid,

    /// Generated text
    pub content: String,

    /// Reason generation stopped
    pub stop_reason: StopReason,

    /// Token usage statistics (if available)
    pub usage: Option<TokenUsage>,
}

impl CapabilityResponse {
    /// Plain text response with no usage data.
    pub fn text(request_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            request_id,
            content: content.into(),
            stop_reason: StopReason::EndTurn,
            usage: None,
        }
    }
}

/// Reason why generation stopped
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Natural end of generation
    EndTurn,

    /// Hit maximum token limit
    MaxTokens,

    /// Other/unknown reason
    Other(String),
}

impl StopReason {
    /// Map an API `stop_reason`.
    pub fn from_api(reason: Option<&str>) -> Self {
        match reason {
            Some("end_turn" | "stop_sequence") | None => Self::EndTurn,
            Some("max_tokens") => Self::MaxTokens,
            Some(other) => Self::Other(other.to_string()),
        }
    }
}

/// Token usage information
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    /// Prompt tokens.
    pub input_tokens: u64,
    /// Completion tokens.
    pub output_tokens: u64,
}

/// Health status of a capability
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Capability is healthy and available
    Healthy,

    /// Capability is degraded but usable
    Degraded,

    /// Capability is unavailable
    Unavailable,
}

/// Error types for capability operations
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    /// Required settings are missing.
    #[error("Capability not configured: {0}")]
    NotConfigured(String),

    /// The backend cannot be reached or started.
    #[error("Capability unavailable: {0}")]
    Unavailable(String),

    /// The backend refused the request for rate.
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// The call exceeded its deadline in seconds.
    #[error("Execution timeout after {0}s")]
    Timeout(u64),

    /// The backend returned an error.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// The transport failed.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Credentials were rejected.
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// A scripted mock ran out of replies.
    #[error("Script exhausted: {0}")]
    ScriptExhausted(String),
}

impl CapabilityError {
    /// Whether a transport-level retry could succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimitExceeded(_) | Self::NetworkError(_) | Self::Unavailable(_)
        )
    }
}

/// Port trait for generation capability implementations
///
/// Implementations must be `Send + Sync` for concurrent use across tokio
/// tasks: several scenario loops call the same capability at once.
#[async_trait]
pub trait GenerationCapability: Send + Sync {
    /// Unique identifier for this capability type
    ///
    /// Examples: "claude-code", "anthropic-api", "mock"
    fn capability_id(&self) -> &str;

    /// Generate text for a request
    ///
    /// # Errors
    /// - `CapabilityError::Unavailable` - backend cannot be reached
    /// - `CapabilityError::RateLimitExceeded` - rate limit hit
    /// - `CapabilityError::Timeout` - backend exceeded its own timeout
    /// - `CapabilityError::ExecutionFailed` - backend reported an error
    async fn generate(
        &self,
        request: CapabilityRequest,
    ) -> Result<CapabilityResponse, CapabilityError>;

    /// Check health of this capability
    async fn health_check(&self) -> Result<HealthStatus, CapabilityError> {
        Ok(HealthStatus::Healthy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rendered_prompt_appends_context() {
        let request = CapabilityRequest::new(CapabilityRole::Writer, "sys", "write a test")
            .with_context(serde_json::json!({"function": "add"}));
        let rendered = request.rendered_prompt();
        assert!(rendered.starts_with("write a test"));
        assert!(rendered.contains("\"function\": \"add\""));

        let bare = CapabilityRequest::new(CapabilityRole::Writer, "sys", "write a test");
        assert_eq!(bare.rendered_prompt(), "write a test");
    }

    #[test]
    fn test_stop_reason_from_api() {
        assert_eq!(StopReason::from_api(Some("end_turn")), StopReason::EndTurn);
        assert_eq!(StopReason::from_api(Some("max_tokens")), StopReason::MaxTokens);
        assert_eq!(StopReason::from_api(None), StopReason::EndTurn);
        assert_eq!(
            StopReason::from_api(Some("refusal")),
            StopReason::Other("refusal".to_string())
        );
    }

    #[test]
    fn test_transient_errors() {
        assert!(CapabilityError::RateLimitExceeded("429".into()).is_transient());
        assert!(CapabilityError::NetworkError("reset".into()).is_transient());
        assert!(!CapabilityError::AuthError("401".into()).is_transient());
        assert!(!CapabilityError::Timeout(5).is_transient());
    }
}
