//! Capability selection
//!
//! Builds the generation capability named by `capability.kind`.

use std::sync::Arc;
use tracing::info;

use super::{AnthropicApiCapability, AnthropicApiConfig, ClaudeCodeCapability, ClaudeCodeConfig, MockCapability};
use crate::domain::models::{CapabilityKind, Config};
use crate::domain::ports::{CapabilityError, ExecutionParameters, GenerationCapability};

/// Build the configured capability.
///
/// The Anthropic API key falls back to `ANTHROPIC_API_KEY` when the
/// configuration does not carry one.
pub fn capability_from_config(config: &Config) -> Result<Arc<dyn GenerationCapability>, CapabilityError> {
    let capability = &config.capability;
    let selected: Arc<dyn GenerationCapability> = match capability.kind {
        CapabilityKind::ClaudeCode => Arc::new(ClaudeCodeCapability::new(ClaudeCodeConfig {
            claude_path: capability.claude_code_path.clone(),
            working_dir: None,
            default_model: Some(capability.model.clone()),
            timeout_secs: config.refinement.call_timeout_secs,
        })),
        CapabilityKind::AnthropicApi => {
            let api_key = capability
                .api_key
                .clone()
                .filter(|k| !k.trim().is_empty())
                .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
                .unwrap_or_default();
            Arc::new(AnthropicApiCapability::new(AnthropicApiConfig {
                api_key,
                model: capability.model.clone(),
                base_url: capability.base_url.clone(),
                max_tokens: capability.max_tokens,
                temperature: capability.temperature,
                timeout_secs: config.refinement.call_timeout_secs,
                rate_limit: config.rate_limit.clone(),
                retry: config.retry.clone(),
            })?)
        }
        CapabilityKind::Mock => Arc::new(MockCapability::offline()),
    };

    info!(capability = selected.capability_id(), "generation capability ready");
    Ok(selected)
}

/// Per-request generation parameters derived from configuration.
pub fn execution_parameters(config: &Config) -> ExecutionParameters {
    ExecutionParameters {
        model: Some(config.capability.model.clone()),
        max_tokens: Some(config.capability.max_tokens),
        temperature: Some(config.capability.temperature),
        ..ExecutionParameters::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_kind_builds_offline_mock() {
        let mut config = Config::default();
        config.capability.kind = CapabilityKind::Mock;
        let capability = capability_from_config(&config).unwrap();
        assert_eq!(capability.capability_id(), "mock");
    }

    #[test]
    fn test_default_kind_is_claude_code() {
        let capability = capability_from_config(&Config::default()).unwrap();
        assert_eq!(capability.capability_id(), "claude-code");
    }

    #[test]
    fn test_anthropic_without_key_is_not_configured() {
        temp_env::with_var_unset("ANTHROPIC_API_KEY", || {
            let mut config = Config::default();
            config.capability.kind = CapabilityKind::AnthropicApi;
            let result = capability_from_config(&config);
            assert!(matches!(result, Err(CapabilityError::NotConfigured(_))));
        });
    }

    #[test]
    fn test_anthropic_key_from_config() {
        let mut config = Config::default();
        config.capability.kind = CapabilityKind::AnthropicApi;
        config.capability.api_key = Some("sk-test".to_string());
        let capability = capability_from_config(&config).unwrap();
        assert_eq!(capability.capability_id(), "anthropic-api");
    }

    #[test]
    fn test_execution_parameters_follow_config() {
        let params = execution_parameters(&Config::default());
        assert_eq!(params.model.as_deref(), Some("claude-sonnet-4-5-20250929"));
        assert_eq!(params.max_tokens, Some(4096));
    }
}
