//! Implementation of the `autotest config` command.

use anyhow::Result;
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;

/// Effective configuration.
#[derive(Debug, Serialize)]
pub struct ConfigOutput {
    /// Merged configuration.
    #[serde(flatten)]
    pub config: Config,
}

impl CommandOutput for ConfigOutput {
    fn to_human(&self) -> String {
        serde_yaml::to_string(&self.config)
            .unwrap_or_else(|e| format!("failed to render configuration: {e}"))
    }
}

/// Print the effective configuration. The API key is never serialized.
pub fn execute(config: Config, json_mode: bool) -> Result<()> {
    output(&ConfigOutput { config }, json_mode);
    Ok(())
}
