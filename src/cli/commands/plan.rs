//! Implementation of the `autotest plan` command.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use super::TargetArgs;
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::cli::service::build_pipeline;
use crate::domain::models::{CapabilityKind, Config, ScenarioCategory, TestPlan};
use crate::infrastructure::config::ConfigLoader;

/// Arguments for `plan`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Source file and function.
    #[command(flatten)]
    pub target: TargetArgs,

    /// Use the deterministic offline capability
    #[arg(long)]
    pub mock: bool,
}

/// Result of `plan`.
#[derive(Debug, Serialize)]
pub struct PlanOutput {
    /// Qualified function name.
    pub function: String,
    /// Function signature.
    pub signature: String,
    /// Planned scenarios.
    pub plan: TestPlan,
}

impl CommandOutput for PlanOutput {
    fn to_human(&self) -> String {
        let counts = ScenarioCategory::ALL
            .iter()
            .map(|c| format!("{} {c}", self.plan.count(*c)))
            .collect::<Vec<_>>()
            .join(", ");

        [
            format!("{}", console::style(&self.signature).bold()),
            format!("{} scenario(s): {counts}", self.plan.len()),
            TableFormatter::new().format_plan(&self.plan),
        ]
        .join("\n")
    }
}

/// Analyze and plan without refinement.
pub async fn execute(args: PlanArgs, mut config: Config, json_mode: bool) -> Result<()> {
    if args.mock {
        config.capability.kind = CapabilityKind::Mock;
    }
    ConfigLoader::validate(&config).context("Invalid configuration")?;

    let pipeline = build_pipeline(&config)?;
    let (descriptor, plan) = pipeline
        .plan(&args.target.source_path()?, &args.target.function)
        .await?;

    output(
        &PlanOutput {
            function: descriptor.qualified_name,
            signature: descriptor.signature,
            plan,
        },
        json_mode,
    );
    Ok(())
}
