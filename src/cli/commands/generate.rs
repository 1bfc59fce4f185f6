//! Implementation of the `autotest generate` command.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::TargetArgs;
use crate::cli::output::progress::render_events;
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::cli::service::build_pipeline;
use crate::domain::models::{CapabilityKind, Config, ExhaustedPolicy, RunReport};
use crate::infrastructure::config::ConfigLoader;
use crate::services::RunRequest;

const EVENT_BUFFER: usize = 64;

/// Arguments for `generate`.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Source file and function.
    #[command(flatten)]
    pub target: TargetArgs,

    /// Maximum synthesis attempts per scenario
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Maximum scenarios refined concurrently
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Timeout for a single capability call, in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Root directory for generated tests
    #[arg(long)]
    pub output_root: Option<String>,

    /// Assemble the test file but do not write it
    #[arg(long)]
    pub dry_run: bool,

    /// Keep the last candidate of scenarios that never converge
    #[arg(long)]
    pub keep_exhausted: bool,

    /// Use the deterministic offline capability
    #[arg(long)]
    pub mock: bool,
}

impl GenerateArgs {
    /// Apply command-line flags on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(max_attempts) = self.max_attempts {
            config.refinement.max_attempts = max_attempts;
        }
        if let Some(concurrency) = self.concurrency {
            config.refinement.max_concurrency = concurrency;
        }
        if let Some(timeout_secs) = self.timeout_secs {
            config.refinement.call_timeout_secs = timeout_secs;
        }
        if let Some(root) = &self.output_root {
            config.output.root.clone_from(root);
        }
        if self.keep_exhausted {
            config.refinement.exhausted_policy = ExhaustedPolicy::KeepLastCandidate;
        }
        if self.mock {
            config.capability.kind = CapabilityKind::Mock;
        }
    }
}

/// Result of `generate`.
#[derive(Debug, Serialize)]
pub struct GenerateOutput {
    /// Run summary.
    #[serde(flatten)]
    pub report: RunReport,
    /// Print the assembled text after the table.
    #[serde(skip)]
    pub show_text: bool,
}

impl CommandOutput for GenerateOutput {
    fn to_human(&self) -> String {
        let report = &self.report;
        let mut lines = vec![TableFormatter::new().format_report(report)];

        if report.has_warnings() {
            lines.push(format!("\n{}", console::style("Warnings:").yellow().bold()));
            for warning in &report.warnings {
                lines.push(format!("  - {warning}"));
            }
        }

        if self.show_text {
            lines.push(format!("\n# {}", report.artifact.path.display()));
            lines.push(report.artifact.text.clone());
        }

        lines.join("\n")
    }
}

/// Run the whole pipeline for one function.
pub async fn execute(args: GenerateArgs, mut config: Config, json_mode: bool) -> Result<()> {
    args.apply_overrides(&mut config);
    ConfigLoader::validate(&config)
        .context("Invalid configuration after applying command-line flags")?;

    let pipeline = build_pipeline(&config)?;
    let request = RunRequest::new(args.target.source_path()?, &args.target.function)
        .dry_run(args.dry_run);

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling run");
                cancel.cancel();
            }
        })
    };

    let (events, progress) = if json_mode {
        (None, None)
    } else {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        (Some(tx), Some(tokio::spawn(render_events(rx))))
    };

    let result = pipeline.run(&request, &cancel, events).await;
    interrupt.abort();
    if let Some(progress) = progress {
        let _ = progress.await;
    }

    let report = result?;
    output(
        &GenerateOutput {
            show_text: args.dry_run,
            report,
        },
        json_mode,
    );
    Ok(())
}

