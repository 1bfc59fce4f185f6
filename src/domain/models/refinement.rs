//! Refinement domain models.
//!
//! Each scenario is refined through an explicit, bounded state machine:
//!
//! ```text
//! Drafting --candidate--> Reviewing --accept--> Accepted
//!    ^  |                     |
//!    |  +--draft failure--+   +--reject--+
//!    |                    v              v
//!    +------ attempt <= max_attempts ----+
//!                         |
//!                         +-- attempt > max_attempts --> Exhausted
//! ```
//!
//! A [`RefinementAttempt`] is owned by exactly one scenario task for the
//! lifetime of its loop.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::errors::{DomainError, DomainResult};

/// Feedback recorded when the critic could not be reached.
pub const REVIEW_UNAVAILABLE: &str = "review unavailable";

/// Machine state of a scenario's refinement loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefinementState {
    /// Waiting on the synthesizer for a candidate.
    Drafting,
    /// Waiting on the critic for a verdict.
    Reviewing,
    /// A candidate passed review.
    Accepted,
    /// The attempt budget ran out.
    Exhausted,
}

impl RefinementState {
    /// Whether the loop stops in this state.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Exhausted)
    }

    /// Lowercase label used in logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Drafting => "drafting",
            Self::Reviewing => "reviewing",
            Self::Accepted => "accepted",
            Self::Exhausted => "exhausted",
        }
    }
}

impl fmt::Display for RefinementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse status of an attempt, as reported outside the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// Drafting or reviewing.
    InProgress,
    /// Terminal, converged.
    Accepted,
    /// Terminal, out of attempts.
    Exhausted,
}

/// The critic's judgment on a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// The candidate is good as written.
    Accept,
    /// The candidate needs another draft.
    Reject {
        /// Guidance for the next draft. May be empty.
        feedback: String,
    },
}

impl Verdict {
    /// Shorthand for [`Verdict::Reject`].
    pub fn reject(feedback: impl Into<String>) -> Self {
        Self::Reject { feedback: feedback.into() }
    }

    /// Whether this is [`Verdict::Accept`].
    pub const fn is_accept(&self) -> bool {
        matches!(self, Self::Accept)
    }
}

/// What happens to a scenario that never converges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustedPolicy {
    /// Contribute no artifact; surface a warning.
    #[default]
    Drop,
    /// Emit the last synthesized candidate anyway; still surface a warning.
    KeepLastCandidate,
}

/// Mutable per-scenario loop state.
#[derive(Debug, Clone)]
pub struct RefinementAttempt {
    /// Scenario this loop refines.
    pub scenario_id: String,
    /// 1-based attempt counter.
    pub attempt: u32,
    /// Most recent synthesized candidate.
    pub candidate: Option<String>,
    /// Most recent critic feedback. Only the critic writes this.
    pub feedback: Option<String>,
    /// Why the latest draft failed, if it did.
    pub failure: Option<String>,
    /// Current machine state.
    pub state: RefinementState,
    max_attempts: u32,
}

impl RefinementAttempt {
    /// Fresh loop in `Drafting` with at least one attempt.
    pub fn new(scenario_id: impl Into<String>, max_attempts: u32) -> Self {
        Self {
            scenario_id: scenario_id.into(),
            attempt: 1,
            candidate: None,
            feedback: None,
            failure: None,
            state: RefinementState::Drafting,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Coarse status for reporting.
    pub const fn status(&self) -> AttemptStatus {
        match self.state {
            RefinementState::Accepted => AttemptStatus::Accepted,
            RefinementState::Exhausted => AttemptStatus::Exhausted,
            RefinementState::Drafting | RefinementState::Reviewing => AttemptStatus::InProgress,
        }
    }

    /// Synthesis call budget.
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Number of synthesis calls made so far.
    pub const fn attempts_used(&self) -> u32 {
        match self.state {
            RefinementState::Drafting | RefinementState::Exhausted => self.attempt - 1,
            RefinementState::Reviewing | RefinementState::Accepted => self.attempt,
        }
    }

    /// Critic feedback to hand the synthesizer for the next draft. Draft
    /// failures never show up here.
    pub fn prior_feedback(&self) -> Option<&str> {
        self.feedback.as_deref()
    }

    /// Drafting -> Reviewing.
    pub fn record_candidate(&mut self, candidate: String) -> DomainResult<()> {
        self.expect_state(RefinementState::Drafting, RefinementState::Reviewing)?;
        self.candidate = Some(candidate);
        self.failure = None;
        self.state = RefinementState::Reviewing;
        Ok(())
    }

    /// A failed draft consumes an attempt. The reason is kept for
    /// diagnostics and the prior critic feedback is left in place.
    pub fn record_draft_failure(&mut self, reason: impl Into<String>) -> DomainResult<RefinementState> {
        self.expect_state(RefinementState::Drafting, RefinementState::Drafting)?;
        self.failure = Some(reason.into());
        Ok(self.advance())
    }

    /// Reviewing -> Accepted | Drafting | Exhausted.
    pub fn record_verdict(&mut self, verdict: Verdict) -> DomainResult<RefinementState> {
        self.expect_state(RefinementState::Reviewing, RefinementState::Accepted)?;
        match verdict {
            Verdict::Accept => {
                self.state = RefinementState::Accepted;
                Ok(self.state)
            }
            Verdict::Reject { feedback } => {
                self.feedback = Some(feedback);
                Ok(self.advance())
            }
        }
    }

    fn advance(&mut self) -> RefinementState {
        self.attempt += 1;
        self.state = if self.attempt <= self.max_attempts {
            RefinementState::Drafting
        } else {
            RefinementState::Exhausted
        };
        self.state
    }

    fn expect_state(&self, expected: RefinementState, to: RefinementState) -> DomainResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(DomainError::ValidationFailed(format!(
                "invalid refinement transition for {} from {} to {}",
                self.scenario_id, self.state, to
            )))
        }
    }

    /// Freeze an accepted attempt into its artifact.
    pub fn into_accepted(self) -> DomainResult<AcceptedArtifact> {
        let attempts = self.attempts_used();
        match (self.state, self.candidate) {
            (RefinementState::Accepted, Some(text)) => Ok(AcceptedArtifact {
                scenario_id: self.scenario_id,
                text,
                attempts,
            }),
            (state, _) => Err(DomainError::ValidationFailed(format!(
                "scenario {} is {state}, not accepted",
                self.scenario_id
            ))),
        }
    }
}

/// A candidate that passed review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedArtifact {
    /// Scenario the test covers.
    pub scenario_id: String,
    /// Test function source.
    pub text: String,
    /// Synthesis calls consumed, including the accepted one.
    pub attempts: u32,
}

/// Diagnostics for a scenario that never converged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExhaustedScenario {
    /// Scenario that never converged.
    pub scenario_id: String,
    /// Its planned description.
    pub description: String,
    /// Synthesis calls consumed.
    pub attempts: u32,
    /// Last candidate the synthesizer produced, if any.
    pub last_candidate: Option<String>,
    /// Last critic feedback, if any.
    pub final_feedback: Option<String>,
    /// Failure reason when the final draft never reached review.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<String>,
}

impl ExhaustedScenario {
    /// Diagnostics for an attempt that ran out of budget.
    pub fn from_attempt(attempt: RefinementAttempt, description: impl Into<String>) -> Self {
        Self {
            attempts: attempt.attempts_used(),
            scenario_id: attempt.scenario_id,
            description: description.into(),
            last_candidate: attempt.candidate,
            final_feedback: attempt.feedback,
            last_failure: attempt.failure,
        }
    }

    /// Human-readable run warning.
    pub fn warning(&self) -> String {
        let reason = self
            .last_failure
            .as_deref()
            .or(self.final_feedback.as_deref())
            .filter(|f| !f.trim().is_empty());
        match reason {
            Some(feedback) => format!(
                "scenario {} ({}) exhausted after {} attempt(s): {}",
                self.scenario_id, self.description, self.attempts, feedback
            ),
            None => format!(
                "scenario {} ({}) exhausted after {} attempt(s)",
                self.scenario_id, self.description, self.attempts
            ),
        }
    }
}

/// Terminal result of one scenario's loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioOutcome {
    /// The critic accepted a candidate.
    Accepted(AcceptedArtifact),
    /// The attempt budget ran out.
    Exhausted(ExhaustedScenario),
    /// The run was cancelled before this scenario reached a terminal state.
    Cancelled {
        /// Scenario left unfinished.
        scenario_id: String,
    },
}

impl ScenarioOutcome {
    /// Scenario this outcome belongs to.
    pub fn scenario_id(&self) -> &str {
        match self {
            Self::Accepted(a) => &a.scenario_id,
            Self::Exhausted(e) => &e.scenario_id,
            Self::Cancelled { scenario_id } => scenario_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_on_first_attempt() {
        let mut attempt = RefinementAttempt::new("typical-1", 3);
        assert_eq!(attempt.status(), AttemptStatus::InProgress);
        attempt.record_candidate("def test_x(): pass".into()).unwrap();
        assert_eq!(attempt.state, RefinementState::Reviewing);
        assert_eq!(attempt.record_verdict(Verdict::Accept).unwrap(), RefinementState::Accepted);

        let artifact = attempt.into_accepted().unwrap();
        assert_eq!(artifact.attempts, 1);
        assert_eq!(artifact.text, "def test_x(): pass");
    }

    #[test]
    fn test_reject_then_accept_counts_two_attempts() {
        let mut attempt = RefinementAttempt::new("error-1", 3);
        attempt.record_candidate("first".into()).unwrap();
        let next = attempt
            .record_verdict(Verdict::reject("missing exception assertion"))
            .unwrap();
        assert_eq!(next, RefinementState::Drafting);
        assert_eq!(attempt.prior_feedback(), Some("missing exception assertion"));

        attempt.record_candidate("second".into()).unwrap();
        attempt.record_verdict(Verdict::Accept).unwrap();
        let artifact = attempt.into_accepted().unwrap();
        assert_eq!(artifact.attempts, 2);
        assert_eq!(artifact.text, "second");
    }

    #[test]
    fn test_single_attempt_budget_exhausts_on_reject() {
        let mut attempt = RefinementAttempt::new("typical-1", 1);
        attempt.record_candidate("only".into()).unwrap();
        let next = attempt.record_verdict(Verdict::reject("nope")).unwrap();
        assert_eq!(next, RefinementState::Exhausted);
        assert_eq!(attempt.status(), AttemptStatus::Exhausted);
        assert_eq!(attempt.attempts_used(), 1);

        let exhausted = ExhaustedScenario::from_attempt(attempt, "adds");
        assert_eq!(exhausted.last_candidate.as_deref(), Some("only"));
        assert_eq!(exhausted.final_feedback.as_deref(), Some("nope"));
        assert!(exhausted.warning().contains("nope"));
    }

    #[test]
    fn test_draft_failures_consume_budget() {
        let mut attempt = RefinementAttempt::new("typical-1", 2);
        assert_eq!(attempt.record_draft_failure("timeout").unwrap(), RefinementState::Drafting);
        assert_eq!(attempt.record_draft_failure("timeout").unwrap(), RefinementState::Exhausted);
        assert_eq!(attempt.attempts_used(), 2);
        assert!(attempt.candidate.is_none());
    }

    #[test]
    fn test_draft_failure_keeps_critic_feedback() {
        let mut attempt = RefinementAttempt::new("error-1", 3);
        attempt.record_candidate("first".into()).unwrap();
        attempt
            .record_verdict(Verdict::reject("missing exception assertion"))
            .unwrap();
        attempt
            .record_draft_failure("writer timed out after 120s")
            .unwrap();

        assert_eq!(attempt.prior_feedback(), Some("missing exception assertion"));
        assert_eq!(attempt.failure.as_deref(), Some("writer timed out after 120s"));
        assert_eq!(attempt.attempts_used(), 2);

        attempt.record_candidate("third".into()).unwrap();
        assert!(attempt.failure.is_none());
    }

    #[test]
    fn test_exhausted_warning_prefers_latest_draft_failure() {
        let mut attempt = RefinementAttempt::new("error-1", 2);
        attempt.record_candidate("first".into()).unwrap();
        attempt.record_verdict(Verdict::reject("wrong value")).unwrap();
        attempt.record_draft_failure("writer returned empty output").unwrap();

        let exhausted = ExhaustedScenario::from_attempt(attempt, "rejects string input");
        assert_eq!(exhausted.final_feedback.as_deref(), Some("wrong value"));
        assert_eq!(exhausted.last_failure.as_deref(), Some("writer returned empty output"));
        assert!(exhausted.warning().ends_with("writer returned empty output"));
    }

    #[test]
    fn test_invalid_transitions_are_rejected() {
        let mut attempt = RefinementAttempt::new("typical-1", 2);
        assert!(attempt.record_verdict(Verdict::Accept).is_err());
        attempt.record_candidate("x".into()).unwrap();
        assert!(attempt.record_candidate("y".into()).is_err());
        assert!(attempt.record_draft_failure("boom").is_err());
        assert!(attempt.clone().into_accepted().is_err());
    }

    #[test]
    fn test_zero_budget_is_clamped_to_one() {
        let attempt = RefinementAttempt::new("typical-1", 0);
        assert_eq!(attempt.max_attempts(), 1);
    }

    #[test]
    fn test_warning_without_feedback() {
        let exhausted = ExhaustedScenario {
            scenario_id: "boundary-1".into(),
            description: "empty list".into(),
            attempts: 3,
            last_candidate: None,
            final_feedback: Some(String::new()),
            last_failure: None,
        };
        assert_eq!(exhausted.warning(), "scenario boundary-1 (empty list) exhausted after 3 attempt(s)");
    }
}
