//! Claude Code capability
//!
//! Shells out to the Claude Code CLI in `--print` mode. Requires the
//! `claude` CLI to be installed and authenticated; no API key is managed
//! here.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::debug;

use crate::domain::ports::{
    CapabilityError, CapabilityRequest, CapabilityResponse, GenerationCapability, HealthStatus,
};
use crate::infrastructure::logging::scrub_secrets;

/// Configuration for the Claude Code capability
#[derive(Debug, Clone)]
pub struct ClaudeCodeConfig {
    /// Path to claude CLI executable (defaults to "claude" in PATH)
    pub claude_path: String,

    /// Working directory for claude execution (defaults to current dir)
    pub working_dir: Option<std::path::PathBuf>,

    /// Model passed with `--model` when the request does not override it
    pub default_model: Option<String>,

    /// Process timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ClaudeCodeConfig {
    fn default() -> Self {
        Self {
            claude_path: "claude".to_string(),
            working_dir: None,
            default_model: None,
            timeout_secs: 300,
        }
    }
}

/// Generation capability backed by the Claude Code CLI.
pub struct ClaudeCodeCapability {
    config: ClaudeCodeConfig,
}

impl ClaudeCodeCapability {
    /// Capability over the given CLI settings.
    pub const fn new(config: ClaudeCodeConfig) -> Self {
        Self { config }
    }

    async fn is_cli_available(&self) -> bool {
        Command::new(&self.config.claude_path)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .is_ok_and(|status| status.success())
    }

    /// CLI arguments for a request; the prompt itself goes to stdin.
    fn build_args(&self, request: &CapabilityRequest) -> Vec<String> {
        let mut args = vec![
            "--print".to_string(),
            "--output-format".to_string(),
            "text".to_string(),
        ];

        if let Some(model) = request
            .parameters
            .model
            .as_ref()
            .or(self.config.default_model.as_ref())
        {
            args.push("--model".to_string());
            args.push(model.clone());
        }

        if !request.system_prompt.is_empty() {
            args.push("--system-prompt".to_string());
            args.push(request.system_prompt.clone());
        }

        args
    }
}

impl Default for ClaudeCodeCapability {
    fn default() -> Self {
        Self::new(ClaudeCodeConfig::default())
    }
}

#[async_trait]
impl GenerationCapability for ClaudeCodeCapability {
    fn capability_id(&self) -> &str {
        "claude-code"
    }

    async fn generate(&self, request: CapabilityRequest) -> Result<CapabilityResponse, CapabilityError> {
        let mut cmd = Command::new(&self.config.claude_path);
        if let Some(ref wd) = self.config.working_dir {
            cmd.current_dir(wd);
        }
        cmd.args(self.build_args(&request))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            CapabilityError::Unavailable(format!(
                "failed to spawn {}: {e}. Is the Claude Code CLI installed?",
                self.config.claude_path
            ))
        })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| CapabilityError::ExecutionFailed("failed to get stdin handle".to_string()))?;
        stdin
            .write_all(request.rendered_prompt().as_bytes())
            .await
            .map_err(|e| CapabilityError::ExecutionFailed(format!("failed to write prompt: {e}")))?;
        drop(stdin);

        debug!(request_id = %request.request_id, role = %request.role, "claude CLI spawned");

        let output = timeout(
            Duration::from_secs(self.config.timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| CapabilityError::Timeout(self.config.timeout_secs))?
        .map_err(|e| CapabilityError::ExecutionFailed(format!("failed to wait for claude CLI: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CapabilityError::ExecutionFailed(format!(
                "claude CLI exited with code {:?}: {}",
                output.status.code(),
                scrub_secrets(stderr.trim())
            )));
        }

        let content = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(CapabilityResponse::text(request.request_id, content))
    }

    async fn health_check(&self) -> Result<HealthStatus, CapabilityError> {
        if self.is_cli_available().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unavailable)
        }
    }
}
