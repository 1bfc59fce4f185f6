//! Command-line interface.

pub mod commands;
pub mod output;
pub mod service;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::domain::errors::DomainError;
use commands::generate::GenerateArgs;
use commands::inspect::InspectArgs;
use commands::plan::PlanArgs;

/// Exit status for a cancelled run (128 + SIGINT).
const EXIT_CANCELLED: i32 = 130;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "autotest", version, about = "Generate reviewed unit tests for a single function")]
pub struct Cli {
    /// Emit machine-readable JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file layered over .autotest/config.yaml
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Plan, draft, review and write tests for a function
    Generate(GenerateArgs),
    /// Analyze and plan only; print the scenarios
    Plan(PlanArgs),
    /// Analyze only; print the function descriptor
    Inspect(InspectArgs),
    /// Print the effective configuration
    Config,
}

/// Stage label for an error chain, when a pipeline stage caused it.
pub fn error_stage(err: &anyhow::Error) -> Option<&'static str> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<DomainError>())
        .map(DomainError::stage)
}

/// Report `err` and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    let stage = error_stage(&err);
    if json_mode {
        let body = serde_json::json!({
            "error": format!("{err:#}"),
            "stage": stage,
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        let label = stage.map_or_else(String::new, |s| format!(" [{s}]"));
        eprintln!("{}{label}: {err:#}", console::style("Error").red().bold());
    }

    let code = if stage == Some("cancelled") { EXIT_CANCELLED } else { 1 };
    std::process::exit(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_error_stage_found_through_context() {
        let err = Err::<(), _>(DomainError::PlanningFailure("empty plan".to_string()))
            .context("run failed")
            .unwrap_err();
        assert_eq!(error_stage(&err), Some("planning"));
    }

    #[test]
    fn test_error_stage_absent_for_other_errors() {
        let err = anyhow::anyhow!("config file missing");
        assert_eq!(error_stage(&err), None);
    }

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
