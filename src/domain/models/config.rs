//! Run configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::refinement::ExhaustedPolicy;

/// Main configuration structure for autotest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Refinement loop configuration
    #[serde(default)]
    pub refinement: RefinementConfig,

    /// Output location and test framework
    #[serde(default)]
    pub output: OutputConfig,

    /// Generation capability configuration
    #[serde(default)]
    pub capability: CapabilityConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Transport retry policy for capability calls
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Run configuration consumed by the refinement orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RefinementConfig {
    /// Maximum synthesis attempts per scenario
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Maximum scenarios refined concurrently
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Timeout for a single capability call, in seconds
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// What to do with scenarios that never converge
    #[serde(default)]
    pub exhausted_policy: ExhaustedPolicy,
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_max_concurrency() -> usize {
    4
}

const fn default_call_timeout_secs() -> u64 {
    120
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            max_concurrency: default_max_concurrency(),
            call_timeout_secs: default_call_timeout_secs(),
            exhausted_policy: ExhaustedPolicy::default(),
        }
    }
}

impl RefinementConfig {
    /// `call_timeout_secs` as a `Duration`.
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OutputConfig {
    /// Root directory generated tests are nested under
    #[serde(default = "default_output_root")]
    pub root: String,

    /// File extension of generated test files
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Test framework imported by the preamble
    #[serde(default = "default_test_framework")]
    pub test_framework: String,
}

fn default_output_root() -> String {
    "tests".to_string()
}

fn default_extension() -> String {
    "py".to_string()
}

fn default_test_framework() -> String {
    "pytest".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: default_output_root(),
            extension: default_extension(),
            test_framework: default_test_framework(),
        }
    }
}

/// Generation capability backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    /// Claude Code CLI
    #[default]
    ClaudeCode,
    /// Direct Anthropic Messages API
    AnthropicApi,
    /// Offline scripted capability
    Mock,
}

impl CapabilityKind {
    /// Lowercase label used in config files.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ClaudeCode => "claude_code",
            Self::AnthropicApi => "anthropic_api",
            Self::Mock => "mock",
        }
    }
}

/// Generation capability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CapabilityConfig {
    /// Which backend to use
    #[serde(default)]
    pub kind: CapabilityKind,

    /// Model to request
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: f32,

    /// API key (can also be set via `ANTHROPIC_API_KEY`)
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Base URL for the API (for testing/proxies)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path to claude CLI executable
    #[serde(default = "default_claude_path")]
    pub claude_code_path: String,
}

fn default_model() -> String {
    "claude-sonnet-4-5-20250929".to_string()
}

const fn default_max_tokens() -> u32 {
    4096
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_claude_path() -> String {
    "claude".to_string()
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            kind: CapabilityKind::default(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            api_key: None,
            base_url: default_base_url(),
            claude_code_path: default_claude_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stderr only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitConfig {
    /// Requests per second allowed
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,

    /// Burst size for token bucket
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,
}

const fn default_requests_per_second() -> f64 {
    5.0
}

const fn default_burst_size() -> u32 {
    10
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
            burst_size: default_burst_size(),
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    1000
}

const fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}
