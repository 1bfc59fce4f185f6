//! Progress rendering for refinement runs using indicatif
//!
//! The spinner draws to stderr and is driven by [`RefinementEvent`]s
//! received from the orchestrator.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::services::RefinementEvent;

const SPINNER_TEMPLATE: &str = "[{elapsed_precise}] {spinner:.green} {msg}";
const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Create a spinner for indeterminate operations
pub fn create_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template(SPINNER_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars(SPINNER_CHARS);
    spinner.set_style(style);
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Extension trait for ProgressBar to add common utility methods
pub trait ProgressBarExt {
    /// Finish with a success message (green checkmark)
    fn finish_success(&self, message: impl Into<String>);

    /// Finish with a warning message (yellow !)
    fn finish_warning(&self, message: impl Into<String>);
}

impl ProgressBarExt for ProgressBar {
    fn finish_success(&self, message: impl Into<String>) {
        self.finish_with_message(format!("{} {}", console::style("✓").green(), message.into()));
    }

    fn finish_warning(&self, message: impl Into<String>) {
        self.finish_with_message(format!("{} {}", console::style("!").yellow(), message.into()));
    }
}

/// Spinner message for an event; `None` for events that end the display.
pub fn describe_event(event: &RefinementEvent) -> Option<String> {
    Some(match event {
        RefinementEvent::Started { total_scenarios } => {
            format!("refining {total_scenarios} scenario(s)")
        }
        RefinementEvent::ScenarioStarted { scenario_id, description } => {
            format!("{scenario_id}: {description}")
        }
        RefinementEvent::AttemptDrafted { scenario_id, attempt } => {
            format!("{scenario_id}: reviewing draft {attempt}")
        }
        RefinementEvent::AttemptRejected { scenario_id, attempt, .. } => {
            format!("{scenario_id}: draft {attempt} rejected, revising")
        }
        RefinementEvent::ScenarioAccepted { scenario_id, attempts } => {
            format!("{scenario_id}: accepted after {attempts} attempt(s)")
        }
        RefinementEvent::ScenarioExhausted { scenario_id, attempts } => {
            format!("{scenario_id}: exhausted after {attempts} attempt(s)")
        }
        RefinementEvent::Completed { .. } => return None,
    })
}

/// Render events until the sender side closes.
pub async fn render_events(mut events: mpsc::Receiver<RefinementEvent>) {
    let spinner = create_spinner();
    spinner.set_message("planning scenarios");

    let mut completed = None;
    while let Some(event) = events.recv().await {
        match describe_event(&event) {
            Some(message) => spinner.set_message(message),
            None => {
                if let RefinementEvent::Completed { accepted, exhausted } = event {
                    completed = Some((accepted, exhausted));
                }
            }
        }
    }

    match completed {
        Some((accepted, 0)) => spinner.finish_success(format!("{accepted} scenario(s) accepted")),
        Some((accepted, exhausted)) => spinner.finish_warning(format!(
            "{accepted} scenario(s) accepted, {exhausted} exhausted"
        )),
        None => spinner.finish_and_clear(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_spinner() {
        let spinner = create_spinner();
        spinner.set_message("Loading...");
        spinner.finish_success("Done");
        assert!(spinner.is_finished());
    }

    #[test]
    fn test_describe_event() {
        let message = describe_event(&RefinementEvent::AttemptRejected {
            scenario_id: "error-1".to_string(),
            attempt: 1,
            feedback: "missing exception assertion".to_string(),
        });
        assert_eq!(message.as_deref(), Some("error-1: draft 1 rejected, revising"));
        assert!(describe_event(&RefinementEvent::Completed { accepted: 1, exhausted: 0 }).is_none());
    }

    #[tokio::test]
    async fn test_render_events_drains_channel() {
        let (tx, rx) = mpsc::channel(8);
        let renderer = tokio::spawn(render_events(rx));
        tx.send(RefinementEvent::Started { total_scenarios: 1 }).await.unwrap();
        tx.send(RefinementEvent::Completed { accepted: 1, exhausted: 0 }).await.unwrap();
        drop(tx);
        renderer.await.unwrap();
    }
}
