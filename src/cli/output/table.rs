//! Table output formatting for CLI commands
//!
//! Renders run summaries, test plans and function descriptors using
//! comfy-table.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use std::env;

use super::truncate;
use crate::domain::models::{
    ExpectedOutcome, FunctionDescriptor, RunReport, ScenarioCategory, TestPlan,
};

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
    /// Maximum width for tables (None = auto)
    max_width: Option<u16>,
}

impl TableFormatter {
    /// Create a new table formatter
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    /// Create a new table formatter with custom settings
    pub const fn with_config(use_colors: bool, max_width: Option<u16>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    /// Two-column summary of a finished run
    pub fn format_report(&self, report: &RunReport) -> String {
        let mut table = self.create_base_table();
        table.set_header(vec![
            Cell::new("Run").add_attribute(Attribute::Bold),
            Cell::new(report.run_id.to_string()).add_attribute(Attribute::Bold),
        ]);

        let written = report
            .written_to
            .as_ref()
            .map_or_else(|| "(dry run)".to_string(), |p| p.display().to_string());

        table.add_row(vec![Cell::new("Function"), Cell::new(&report.function)]);
        table.add_row(vec![
            Cell::new("Source"),
            Cell::new(report.source_path.display().to_string()),
        ]);
        table.add_row(vec![Cell::new("Planned"), Cell::new(report.planned)]);
        table.add_row(vec![
            Cell::new("Accepted"),
            self.count_cell(report.accepted, Color::Green),
        ]);
        table.add_row(vec![
            Cell::new("Exhausted"),
            self.count_cell(report.exhausted, Color::Yellow),
        ]);
        table.add_row(vec![
            Cell::new("Synthesis calls"),
            Cell::new(report.synthesis_calls),
        ]);
        table.add_row(vec![Cell::new("Output"), Cell::new(written)]);
        table.add_row(vec![
            Cell::new("Duration"),
            Cell::new(format!("{} ms", report.duration_ms())),
        ]);

        table.to_string()
    }

    /// One row per planned scenario, in plan order
    pub fn format_plan(&self, plan: &TestPlan) -> String {
        let mut table = self.create_base_table();
        table.set_header(vec![
            Cell::new("ID").add_attribute(Attribute::Bold),
            Cell::new("Category").add_attribute(Attribute::Bold),
            Cell::new("Description").add_attribute(Attribute::Bold),
            Cell::new("Inputs").add_attribute(Attribute::Bold),
            Cell::new("Expected").add_attribute(Attribute::Bold),
        ]);

        for scenario in plan.iter() {
            let category = if self.use_colors {
                Cell::new(scenario.category).fg(category_color(scenario.category))
            } else {
                Cell::new(scenario.category)
            };
            let inputs = serde_json::Value::Object(scenario.inputs.clone()).to_string();

            table.add_row(vec![
                Cell::new(&scenario.id),
                category,
                Cell::new(truncate(&scenario.description, 60)),
                Cell::new(truncate(&inputs, 40)),
                Cell::new(outcome_label(&scenario.expected_outcome)),
            ]);
        }

        table.to_string()
    }

    /// Parameter table for an extracted function
    pub fn format_parameters(&self, descriptor: &FunctionDescriptor) -> String {
        let mut table = self.create_base_table();
        table.set_header(vec![
            Cell::new("Parameter").add_attribute(Attribute::Bold),
            Cell::new("Type").add_attribute(Attribute::Bold),
            Cell::new("Default").add_attribute(Attribute::Bold),
        ]);

        for param in &descriptor.parameters {
            table.add_row(vec![
                Cell::new(&param.name),
                Cell::new(&param.declared_type),
                Cell::new(param.default.as_deref().unwrap_or("-")),
            ]);
        }

        table.to_string()
    }

    fn count_cell(&self, count: usize, color: Color) -> Cell {
        if self.use_colors && count > 0 {
            Cell::new(count).fg(color)
        } else {
            Cell::new(count)
        }
    }

    /// Create a base table with common settings
    fn create_base_table(&self) -> Table {
        let mut table = Table::new();

        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        if let Some(width) = self.max_width {
            table.set_width(width);
        }

        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    !matches!(env::var("TERM").as_deref(), Ok("dumb"))
}

const fn category_color(category: ScenarioCategory) -> Color {
    match category {
        ScenarioCategory::Typical => Color::Green,
        ScenarioCategory::Boundary => Color::Cyan,
        ScenarioCategory::Error => Color::Red,
    }
}

fn outcome_label(outcome: &ExpectedOutcome) -> String {
    match outcome {
        ExpectedOutcome::Returns(value) => format!("returns {}", truncate(&value.to_string(), 30)),
        ExpectedOutcome::Raises(kind) => format!("raises {kind}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{OutputArtifact, TestScenario};
    use chrono::Utc;
    use serde_json::{json, Map};
    use std::path::PathBuf;
    use uuid::Uuid;

    fn plain() -> TableFormatter {
        TableFormatter::with_config(false, Some(160))
    }

    #[test]
    fn test_format_plan_lists_scenarios_in_order() {
        let mut inputs = Map::new();
        inputs.insert("a".to_string(), json!("x"));
        inputs.insert("b".to_string(), json!(5));
        let plan = TestPlan::new(vec![
            TestScenario::new(
                "typical-1",
                "adds two positives",
                ScenarioCategory::Typical,
                Map::new(),
                ExpectedOutcome::Returns(json!(3)),
            )
            .unwrap(),
            TestScenario::new(
                "error-1",
                "rejects string input",
                ScenarioCategory::Error,
                inputs,
                ExpectedOutcome::Raises("TypeError".to_string()),
            )
            .unwrap(),
        ])
        .unwrap();

        let rendered = plain().format_plan(&plan);
        let typical = rendered.find("typical-1").unwrap();
        let error = rendered.find("error-1").unwrap();
        assert!(typical < error);
        assert!(rendered.contains("raises TypeError"));
        assert!(rendered.contains("returns 3"));
    }

    #[test]
    fn test_format_report_marks_dry_run() {
        let now = Utc::now();
        let report = RunReport {
            run_id: Uuid::new_v4(),
            function: "add".to_string(),
            source_path: PathBuf::from("example_code/code.py"),
            planned: 3,
            accepted: 2,
            exhausted: 1,
            synthesis_calls: 5,
            artifact: OutputArtifact {
                path: PathBuf::from("tests/example_code/code/test_add.py"),
                text: String::new(),
                test_count: 2,
            },
            written_to: None,
            warnings: vec![],
            started_at: now,
            completed_at: now,
        };

        let rendered = plain().format_report(&report);
        assert!(rendered.contains("(dry run)"));
        assert!(rendered.contains("Synthesis calls"));
    }
}
