//! Output artifact and run report models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Final assembled test file, ready to be handed to a writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputArtifact {
    /// Destination path, relative to the working directory.
    pub path: PathBuf,
    /// Full file contents.
    pub text: String,
    /// Number of test bodies included after the preamble.
    pub test_count: usize,
}

impl OutputArtifact {
    /// Whether no test bodies were assembled.
    pub const fn is_empty(&self) -> bool {
        self.test_count == 0
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique id of the run.
    pub run_id: Uuid,
    /// Qualified function name.
    pub function: String,
    /// Source file the function came from.
    pub source_path: PathBuf,
    /// Scenarios in the plan.
    pub planned: usize,
    /// Scenarios the critic accepted.
    pub accepted: usize,
    /// Scenarios that ran out of attempts.
    pub exhausted: usize,
    /// Total synthesis calls across all scenarios.
    pub synthesis_calls: u32,
    /// Assembled test file.
    pub artifact: OutputArtifact,
    /// Where the artifact was written; `None` for dry runs.
    pub written_to: Option<PathBuf>,
    /// One entry per exhausted scenario, plus a note when no test survived.
    pub warnings: Vec<String>,
    /// When the run began.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub completed_at: DateTime<Utc>,
}

impl RunReport {
    /// Wall-clock duration in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        (self.completed_at - self.started_at).num_milliseconds()
    }

    /// Whether any scenario was exhausted or the output is empty.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
