//! Implementation of the `autotest inspect` command.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use super::TargetArgs;
use crate::adapters::extractor::PythonFunctionExtractor;
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::FunctionDescriptor;
use crate::domain::ports::FunctionExtractor;

/// Arguments for `inspect`.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Source file and function.
    #[command(flatten)]
    pub target: TargetArgs,

    /// Also print the function source
    #[arg(long)]
    pub source: bool,
}

/// Result of `inspect`.
#[derive(Debug, Serialize)]
pub struct InspectOutput {
    /// Extracted descriptor.
    #[serde(flatten)]
    pub descriptor: FunctionDescriptor,
    /// Whether the body has statements to test.
    pub has_behavior: bool,
    /// Print the function source.
    #[serde(skip)]
    pub show_source: bool,
}

impl CommandOutput for InspectOutput {
    fn to_human(&self) -> String {
        let descriptor = &self.descriptor;
        let mut lines = vec![
            format!("Function:  {}", console::style(&descriptor.qualified_name).bold()),
            format!("Source:    {}", descriptor.source_path.display()),
            format!("Signature: {}", descriptor.signature),
            format!("Returns:   {}", descriptor.return_type),
        ];

        if descriptor.has_documentation() {
            lines.push(format!("Docstring: {}", descriptor.documentation));
        } else {
            lines.push("Docstring: (none)".to_string());
        }
        if !self.has_behavior {
            lines.push(format!(
                "{} body has no behavior to test",
                console::style("!").yellow()
            ));
        }
        if !descriptor.parameters.is_empty() {
            lines.push(TableFormatter::new().format_parameters(descriptor));
        }
        if self.show_source {
            lines.push(String::new());
            lines.push(descriptor.body.clone());
        }

        lines.join("\n")
    }
}

/// Extract and print a descriptor.
pub async fn execute(args: InspectArgs, json_mode: bool) -> Result<()> {
    let descriptor = PythonFunctionExtractor::new()
        .extract(&args.target.source_path()?, &args.target.function)
        .await?;

    output(
        &InspectOutput {
            has_behavior: descriptor.has_behavior(),
            descriptor,
            show_source: args.source,
        },
        json_mode,
    );
    Ok(())
}
