//! Anthropic Messages API capability
//!
//! Calls the Messages API directly over HTTP. Requests are throttled with a
//! `governor` rate limiter and transient failures (429, 5xx, network) are
//! retried with exponential backoff.

use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::models::{RateLimitConfig, RetryConfig};
use crate::domain::ports::{
    CapabilityError, CapabilityRequest, CapabilityResponse, GenerationCapability, HealthStatus,
    StopReason, TokenUsage,
};
use crate::infrastructure::logging::scrub_secrets;

const ANTHROPIC_VERSION: &str = "2023-06-01";

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Configuration for the Anthropic API capability
#[derive(Debug, Clone)]
pub struct AnthropicApiConfig {
    /// API key (required)
    pub api_key: String,

    /// Model used when the request does not override it
    pub model: String,

    /// Base URL for API (for testing/proxies)
    pub base_url: String,

    /// Default maximum tokens to generate
    pub max_tokens: u32,

    /// Default sampling temperature
    pub temperature: f32,

    /// HTTP request timeout in seconds
    pub timeout_secs: u64,

    /// Request rate limit.
    pub rate_limit: RateLimitConfig,

    /// Retry policy for transient failures.
    pub retry: RetryConfig,
}

impl Default for AnthropicApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "claude-sonnet-4-5-20250929".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 4096,
            temperature: 0.0,
            timeout_secs: 300,
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

/// Generation capability backed by the Anthropic Messages API.
pub struct AnthropicApiCapability {
    http_client: reqwest::Client,
    config: AnthropicApiConfig,
    rate_limiter: DirectRateLimiter,
}

impl AnthropicApiCapability {
    /// Build the client. Fails when no API key is configured.
    pub fn new(config: AnthropicApiConfig) -> Result<Self, CapabilityError> {
        if config.api_key.trim().is_empty() {
            return Err(CapabilityError::NotConfigured(
                "an Anthropic API key is required (capability.api_key or ANTHROPIC_API_KEY)"
                    .to_string(),
            ));
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(10)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| CapabilityError::NotConfigured(format!("failed to build HTTP client: {e}")))?;

        let rate_limiter = RateLimiter::direct(quota(&config.rate_limit)?);

        Ok(Self {
            http_client,
            config,
            rate_limiter,
        })
    }

    /// Create from environment variable (`ANTHROPIC_API_KEY`).
    pub fn from_env() -> Result<Self, CapabilityError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            CapabilityError::NotConfigured("ANTHROPIC_API_KEY environment variable not set".to_string())
        })?;
        Self::new(AnthropicApiConfig {
            api_key,
            ..AnthropicApiConfig::default()
        })
    }

    async fn send_once(&self, request: &CapabilityRequest) -> Result<MessageResponse, CapabilityError> {
        let prompt = request.rendered_prompt();
        let body = MessageRequest {
            model: request.parameters.model.as_deref().unwrap_or(&self.config.model),
            max_tokens: request.parameters.max_tokens.unwrap_or(self.config.max_tokens),
            system: Some(request.system_prompt.as_str()).filter(|s| !s.is_empty()),
            temperature: request.parameters.temperature.or(Some(self.config.temperature)),
            messages: vec![Message {
                role: "user",
                content: &prompt,
            }],
        };

        let response = self
            .http_client
            .post(format!("{}/v1/messages", self.config.base_url.trim_end_matches('/')))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error response".to_string());
            return Err(classify_status(status, &scrub_secrets(&body)));
        }

        response.json::<MessageResponse>().await.map_err(|e| {
            CapabilityError::ExecutionFailed(format!("failed to parse Messages API response: {e}"))
        })
    }

    fn classify_transport(&self, err: &reqwest::Error) -> CapabilityError {
        if err.is_timeout() {
            CapabilityError::Timeout(self.config.timeout_secs)
        } else {
            CapabilityError::NetworkError(scrub_secrets(&err.to_string()))
        }
    }
}

fn quota(config: &RateLimitConfig) -> Result<Quota, CapabilityError> {
    let burst = NonZeroU32::new(config.burst_size)
        .ok_or_else(|| CapabilityError::NotConfigured("rate_limit.burst_size must be >= 1".to_string()))?;
    let period = (config.requests_per_second > 0.0)
        .then(|| Duration::from_secs_f64(1.0 / config.requests_per_second))
        .and_then(Quota::with_period)
        .ok_or_else(|| {
            CapabilityError::NotConfigured("rate_limit.requests_per_second must be positive".to_string())
        })?;
    Ok(period.allow_burst(burst))
}

fn classify_status(status: StatusCode, body: &str) -> CapabilityError {
    match status.as_u16() {
        401 | 403 => CapabilityError::AuthError(format!("{status}: {body}")),
        429 => CapabilityError::RateLimitExceeded(body.to_string()),
        500..=599 => CapabilityError::Unavailable(format!("{status}: {body}")),
        _ => CapabilityError::ExecutionFailed(format!("{status}: {body}")),
    }
}

#[async_trait]
impl GenerationCapability for AnthropicApiCapability {
    fn capability_id(&self) -> &str {
        "anthropic-api"
    }

    async fn generate(&self, request: CapabilityRequest) -> Result<CapabilityResponse, CapabilityError> {
        let retry = &self.config.retry;
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(retry.initial_backoff_ms))
            .with_max_interval(Duration::from_millis(retry.max_backoff_ms))
            .with_max_elapsed_time(None)
            .build();

        let mut attempts = 0u32;
        let max_retries = retry.max_retries;
        let request_ref = &request;

        let message = backoff::future::retry_notify(
            policy,
            || {
                attempts += 1;
                let attempt = attempts;
                async move {
                    self.rate_limiter.until_ready().await;
                    self.send_once(request_ref).await.map_err(|e| {
                        if e.is_transient() && attempt <= max_retries {
                            backoff::Error::transient(e)
                        } else {
                            backoff::Error::permanent(e)
                        }
                    })
                }
            },
            |err: CapabilityError, wait: Duration| {
                warn!(error = %err, wait_ms = wait.as_millis() as u64, "retrying Messages API call");
            },
        )
        .await?;

        let content = message
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        debug!(request_id = %request.request_id, chars = content.len(), "Messages API call complete");

        Ok(CapabilityResponse {
            request_id: request.request_id,
            content,
            stop_reason: StopReason::from_api(message.stop_reason.as_deref()),
            usage: message.usage.map(|u| TokenUsage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            }),
        })
    }

    async fn health_check(&self) -> Result<HealthStatus, CapabilityError> {
        if self.config.api_key.is_empty() {
            Ok(HealthStatus::Unavailable)
        } else {
            Ok(HealthStatus::Healthy)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::CapabilityRole;
    use mockito::{Matcher, Server};

    fn response_body(text: &str) -> String {
        serde_json::json!({
            "id": "msg_01ABC123",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": text}],
            "model": "claude-sonnet-4-5-20250929",
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 3}
        })
        .to_string()
    }

    fn capability(base_url: String, max_retries: u32) -> AnthropicApiCapability {
        AnthropicApiCapability::new(AnthropicApiConfig {
            api_key: "test-api-key".to_string(),
            base_url,
            rate_limit: RateLimitConfig {
                requests_per_second: 100.0,
                burst_size: 10,
            },
            retry: RetryConfig {
                max_retries,
                initial_backoff_ms: 1,
                max_backoff_ms: 5,
            },
            ..AnthropicApiConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_generate_success_with_mock() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "test-api-key")
            .match_header("anthropic-version", ANTHROPIC_VERSION)
            .match_body(Matcher::PartialJson(serde_json::json!({
                "system": "review strictly",
                "messages": [{"role": "user", "content": "is this test right?"}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(response_body("{\"is_perfect\": true}"))
            .create_async()
            .await;

        let response = capability(server.url(), 0)
            .generate(CapabilityRequest::new(
                CapabilityRole::Reviewer,
                "review strictly",
                "is this test right?",
            ))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.content, "{\"is_perfect\": true}");
        assert_eq!(response.stop_reason, StopReason::EndTurn);
        assert_eq!(response.usage.unwrap().output_tokens, 3);
    }

    #[tokio::test]
    async fn test_retries_transient_errors() {
        let mut server = Server::new_async().await;
        let failing = server
            .mock("POST", "/v1/messages")
            .with_status(529)
            .with_body("overloaded")
            .expect(1)
            .create_async()
            .await;
        let succeeding = server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body(response_body("ok"))
            .create_async()
            .await;

        let response = capability(server.url(), 2)
            .generate(CapabilityRequest::new(CapabilityRole::Writer, "", "hi"))
            .await
            .unwrap();

        failing.assert_async().await;
        succeeding.assert_async().await;
        assert_eq!(response.content, "ok");
    }

    #[tokio::test]
    async fn test_auth_error_is_not_retried() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .with_status(401)
            .with_body(r#"{"error": "invalid x-api-key sk-ant-REDACTED"}"#)
            .expect(1)
            .create_async()
            .await;

        let err = capability(server.url(), 3)
            .generate(CapabilityRequest::new(CapabilityRole::Writer, "", "hi"))
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, CapabilityError::AuthError(_)));
        assert!(!err.to_string().contains("sk-ant-api03"));
    }

    #[test]
    fn test_missing_api_key_is_not_configured() {
        let result = AnthropicApiCapability::new(AnthropicApiConfig::default());
        assert!(matches!(result, Err(CapabilityError::NotConfigured(_))));
    }

    #[test]
    fn test_status_classification() {
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(classify_status(StatusCode::BAD_GATEWAY, "").is_transient());
        assert!(!classify_status(StatusCode::BAD_REQUEST, "").is_transient());
    }
}
