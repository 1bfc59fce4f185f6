//! Refinement orchestrator: the per-scenario draft/review loop and the
//! bounded fan-out that runs one loop per planned scenario.
//!
//! Each scenario is an explicit state machine
//! (`Drafting -> Reviewing -> Accepted | Drafting | Exhausted`) owned by a
//! single tokio task in a `JoinSet`. Tasks are bounded by a semaphore and
//! write their outcome into a slot indexed by plan position, so results
//! come back in plan order whatever order the tasks finish in. A failing
//! task cancels the run-scoped token and the rest of the set is aborted
//! before `refine_plan` returns.

use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AcceptedArtifact, ExhaustedPolicy, ExhaustedScenario, FunctionDescriptor, RefinementAttempt,
    RefinementConfig, RefinementState, ScenarioOutcome, TestPlan, TestScenario, Verdict,
    REVIEW_UNAVAILABLE,
};
use crate::domain::ports::{CandidateSynthesizer, Critic};

/// Progress event emitted while refining a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefinementEvent {
    /// Refinement of a plan started.
    Started {
        /// Scenarios in the plan.
        total_scenarios: usize,
    },
    /// A scenario loop started.
    ScenarioStarted {
        /// Scenario id.
        scenario_id: String,
        /// Planned description.
        description: String,
    },
    /// A candidate was drafted and goes to review.
    AttemptDrafted {
        /// Scenario id.
        scenario_id: String,
        /// 1-based attempt number.
        attempt: u32,
    },
    /// A draft failed or a candidate was rejected.
    AttemptRejected {
        /// Scenario id.
        scenario_id: String,
        /// 1-based attempt number.
        attempt: u32,
        /// Critic feedback or the draft failure reason.
        feedback: String,
    },
    /// A scenario reached `Accepted`.
    ScenarioAccepted {
        /// Scenario id.
        scenario_id: String,
        /// Synthesis calls consumed.
        attempts: u32,
    },
    /// A scenario reached `Exhausted`.
    ScenarioExhausted {
        /// Scenario id.
        scenario_id: String,
        /// Synthesis calls consumed.
        attempts: u32,
    },
    /// Every scenario reached a terminal state.
    Completed {
        /// Scenarios the critic accepted.
        accepted: usize,
        /// Scenarios that ran out of attempts.
        exhausted: usize,
    },
}

/// Fan-in result of refining a whole plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefinementReport {
    /// Scenarios the critic accepted, in plan order.
    pub accepted: Vec<AcceptedArtifact>,
    /// Tests handed to the assembler, in plan order. Under
    /// `keep_last_candidate` this adds the last candidate of exhausted
    /// scenarios to `accepted`.
    pub artifacts: Vec<AcceptedArtifact>,
    /// Scenarios that never converged, in plan order.
    pub exhausted: Vec<ExhaustedScenario>,
    /// Synthesis calls issued across all scenarios.
    pub synthesis_calls: u32,
}

impl RefinementReport {
    /// One warning per exhausted scenario.
    pub fn warnings(&self) -> Vec<String> {
        self.exhausted.iter().map(ExhaustedScenario::warning).collect()
    }
}

#[derive(Clone, Default)]
struct EventSink(Option<mpsc::Sender<RefinementEvent>>);

impl EventSink {
    async fn emit(&self, event: RefinementEvent) {
        if let Some(tx) = &self.0 {
            let _ = tx.send(event).await;
        }
    }
}

/// Drives synthesis and review for every scenario of a plan.
#[derive(Clone)]
pub struct RefinementOrchestrator {
    synthesizer: Arc<dyn CandidateSynthesizer>,
    critic: Arc<dyn Critic>,
    config: RefinementConfig,
}

impl RefinementOrchestrator {
    /// Orchestrator over the given stages.
    pub fn new(
        synthesizer: Arc<dyn CandidateSynthesizer>,
        critic: Arc<dyn Critic>,
        config: RefinementConfig,
    ) -> Self {
        Self {
            synthesizer,
            critic,
            config,
        }
    }

    /// Run configuration in effect.
    pub const fn config(&self) -> &RefinementConfig {
        &self.config
    }

    /// Refine every scenario of `plan` concurrently.
    ///
    /// Returns `DomainError::Cancelled` if `cancel` fires before every
    /// scenario reaches a terminal state.
    #[instrument(skip_all, fields(function = %descriptor.qualified_name, scenarios = plan.len()))]
    pub async fn refine_plan(
        &self,
        descriptor: Arc<FunctionDescriptor>,
        plan: &TestPlan,
        cancel: &CancellationToken,
        events: Option<mpsc::Sender<RefinementEvent>>,
    ) -> DomainResult<RefinementReport> {
        let sink = EventSink(events);
        sink.emit(RefinementEvent::Started {
            total_scenarios: plan.len(),
        })
        .await;

        let run = cancel.child_token();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for (index, scenario) in plan.iter().enumerate() {
            let permit = tokio::select! {
                biased;
                () = run.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => permit.map_err(|_| {
                    DomainError::ValidationFailed("refinement semaphore closed".to_string())
                })?,
            };

            let orchestrator = self.clone();
            let descriptor = Arc::clone(&descriptor);
            let scenario = scenario.clone();
            let run = run.clone();
            let sink = sink.clone();

            tasks.spawn(async move {
                let _permit = permit;
                // Fires on error or panic so siblings stop issuing calls.
                let guard = run.clone().drop_guard();
                let result = orchestrator
                    .run_scenario(&descriptor, &scenario, &run, &sink)
                    .await;
                if result.is_ok() {
                    let _ = guard.disarm();
                }
                (index, result)
            });
        }

        let mut slots: Vec<Option<ScenarioOutcome>> = vec![None; plan.len()];
        while let Some(joined) = tasks.join_next().await {
            let failure = match joined {
                Ok((index, Ok(outcome))) => {
                    slots[index] = Some(outcome);
                    continue;
                }
                Ok((_, Err(e))) => e,
                Err(e) => DomainError::ValidationFailed(format!("refinement task failed: {e}")),
            };
            warn!(error = %failure, "refinement task failed, aborting remaining scenarios");
            run.cancel();
            tasks.shutdown().await;
            return Err(failure);
        }

        let mut report = RefinementReport::default();
        for slot in slots {
            match slot {
                Some(ScenarioOutcome::Accepted(artifact)) => {
                    report.synthesis_calls += artifact.attempts;
                    report.artifacts.push(artifact.clone());
                    report.accepted.push(artifact);
                }
                Some(ScenarioOutcome::Exhausted(exhausted)) => {
                    report.synthesis_calls += exhausted.attempts;
                    if self.config.exhausted_policy == ExhaustedPolicy::KeepLastCandidate {
                        if let Some(text) = &exhausted.last_candidate {
                            report.artifacts.push(AcceptedArtifact {
                                scenario_id: exhausted.scenario_id.clone(),
                                text: text.clone(),
                                attempts: exhausted.attempts,
                            });
                        }
                    }
                    report.exhausted.push(exhausted);
                }
                Some(ScenarioOutcome::Cancelled { scenario_id }) => {
                    info!(scenario = %scenario_id, "refinement cancelled");
                    return Err(DomainError::Cancelled);
                }
                None => return Err(DomainError::Cancelled),
            }
        }

        info!(
            accepted = report.accepted.len(),
            exhausted = report.exhausted.len(),
            synthesis_calls = report.synthesis_calls,
            "refinement complete"
        );
        sink.emit(RefinementEvent::Completed {
            accepted: report.accepted.len(),
            exhausted: report.exhausted.len(),
        })
        .await;

        Ok(report)
    }

    /// Run one scenario's loop to a terminal state without progress events.
    pub async fn refine_scenario(
        &self,
        descriptor: &FunctionDescriptor,
        scenario: &TestScenario,
        cancel: &CancellationToken,
    ) -> DomainResult<ScenarioOutcome> {
        self.run_scenario(descriptor, scenario, cancel, &EventSink::default())
            .await
    }

    #[instrument(skip_all, fields(scenario = %scenario.id))]
    async fn run_scenario(
        &self,
        descriptor: &FunctionDescriptor,
        scenario: &TestScenario,
        cancel: &CancellationToken,
        sink: &EventSink,
    ) -> DomainResult<ScenarioOutcome> {
        let mut attempt = RefinementAttempt::new(&scenario.id, self.config.max_attempts);
        sink.emit(RefinementEvent::ScenarioStarted {
            scenario_id: scenario.id.clone(),
            description: scenario.description.clone(),
        })
        .await;

        loop {
            match attempt.state {
                RefinementState::Drafting => {
                    if cancel.is_cancelled() {
                        return Ok(cancelled(scenario));
                    }
                    let number = attempt.attempt;
                    debug!(attempt = number, "drafting");

                    let drafted = tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Ok(cancelled(scenario)),
                        result = timeout(
                            self.config.call_timeout(),
                            self.synthesizer.synthesize(descriptor, scenario, attempt.prior_feedback()),
                        ) => result.unwrap_or_else(|_| {
                            Err(DomainError::SynthesisFailure(format!(
                                "writer timed out after {}s",
                                self.config.call_timeout_secs
                            )))
                        }),
                    };

                    match drafted {
                        Ok(candidate) => {
                            attempt.record_candidate(candidate)?;
                            sink.emit(RefinementEvent::AttemptDrafted {
                                scenario_id: scenario.id.clone(),
                                attempt: number,
                            })
                            .await;
                        }
                        Err(e) => {
                            warn!(attempt = number, error = %e, "draft failed");
                            let reason = e.to_string();
                            attempt.record_draft_failure(reason.clone())?;
                            sink.emit(RefinementEvent::AttemptRejected {
                                scenario_id: scenario.id.clone(),
                                attempt: number,
                                feedback: reason,
                            })
                            .await;
                        }
                    }
                }
                RefinementState::Reviewing => {
                    if cancel.is_cancelled() {
                        return Ok(cancelled(scenario));
                    }
                    let number = attempt.attempt;
                    let candidate = attempt.candidate.as_deref().unwrap_or_default();

                    let reviewed = tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Ok(cancelled(scenario)),
                        result = timeout(
                            self.config.call_timeout(),
                            self.critic.review(descriptor, scenario, candidate),
                        ) => result,
                    };

                    let verdict = match reviewed {
                        Ok(Ok(verdict)) => verdict,
                        Ok(Err(e)) => {
                            warn!(attempt = number, error = %e, "review unavailable");
                            Verdict::reject(REVIEW_UNAVAILABLE)
                        }
                        Err(_) => {
                            warn!(attempt = number, "review timed out");
                            Verdict::reject(REVIEW_UNAVAILABLE)
                        }
                    };

                    if let Verdict::Reject { feedback } = &verdict {
                        debug!(attempt = number, %feedback, "candidate rejected");
                        sink.emit(RefinementEvent::AttemptRejected {
                            scenario_id: scenario.id.clone(),
                            attempt: number,
                            feedback: feedback.clone(),
                        })
                        .await;
                    }
                    attempt.record_verdict(verdict)?;
                }
                RefinementState::Accepted => {
                    let artifact = attempt.into_accepted()?;
                    info!(attempts = artifact.attempts, "scenario accepted");
                    sink.emit(RefinementEvent::ScenarioAccepted {
                        scenario_id: artifact.scenario_id.clone(),
                        attempts: artifact.attempts,
                    })
                    .await;
                    return Ok(ScenarioOutcome::Accepted(artifact));
                }
                RefinementState::Exhausted => {
                    let exhausted = ExhaustedScenario::from_attempt(attempt, &scenario.description);
                    warn!(attempts = exhausted.attempts, "scenario exhausted");
                    sink.emit(RefinementEvent::ScenarioExhausted {
                        scenario_id: exhausted.scenario_id.clone(),
                        attempts: exhausted.attempts,
                    })
                    .await;
                    return Ok(ScenarioOutcome::Exhausted(exhausted));
                }
            }
        }
    }
}

fn cancelled(scenario: &TestScenario) -> ScenarioOutcome {
    ScenarioOutcome::Cancelled {
        scenario_id: scenario.id.clone(),
    }
}
