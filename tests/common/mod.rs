//! Common test utilities for integration tests
//!
//! Scripted stage fakes, fixtures and temp-dir helpers shared across the
//! integration test binaries.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use autotest::domain::errors::{DomainError, DomainResult};
use autotest::domain::models::{
    ExpectedOutcome, FunctionDescriptor, OutputArtifact, Parameter, RefinementConfig,
    ScenarioCategory, TestPlan, TestScenario, Verdict,
};
use autotest::domain::ports::{
    ArtifactWriter, CandidateSynthesizer, Critic, FunctionExtractor, ScenarioPlanner,
};

/// Source of the two-integer `add` function.
pub const ADD_SOURCE: &str = r#""""Example code to demonstrate graph invocation."""


def add(number_a: int, number_b: int) -> int:
    """Adds two integers and returns the result."""
    #
    if type(number_a) is not int or type(number_b) is not int:
        raise TypeError(
            "Parameter(s) "
            f"(a: {number_a}, number_b: {number_b}) "
            "of invalid type"
        )

    return number_a + number_b
"#;

/// Create a temporary directory for test isolation
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Temp project containing `example_code/code.py` with [`ADD_SOURCE`].
pub fn temp_project() -> TempDir {
    let dir = temp_dir();
    let code_dir = dir.path().join("example_code");
    std::fs::create_dir_all(&code_dir).expect("Failed to create example_code");
    std::fs::write(code_dir.join("code.py"), ADD_SOURCE).expect("Failed to write code.py");
    dir
}

/// Files under `root`, relative to it, sorted.
pub fn files_under(root: &Path) -> Vec<PathBuf> {
    fn walk(dir: &Path, root: &Path, out: &mut Vec<PathBuf>) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(&path, root, out);
            } else if let Ok(relative) = path.strip_prefix(root) {
                out.push(relative.to_path_buf());
            }
        }
    }
    let mut out = Vec::new();
    walk(root, root, &mut out);
    out.sort();
    out
}

pub fn add_descriptor() -> FunctionDescriptor {
    FunctionDescriptor {
        qualified_name: "add".to_string(),
        parameters: vec![
            Parameter::new("number_a", Some("int".to_string())),
            Parameter::new("number_b", Some("int".to_string())),
        ],
        return_type: "int".to_string(),
        documentation: "Adds two integers and returns the result.".to_string(),
        signature: "def add(number_a: int, number_b: int) -> int:".to_string(),
        body: "def add(number_a: int, number_b: int) -> int:\n    return number_a + number_b"
            .to_string(),
        source_path: PathBuf::from("example_code/code.py"),
    }
}

/// The "rejects string input" error scenario.
pub fn string_input_scenario() -> TestScenario {
    let mut inputs = Map::new();
    inputs.insert("number_a".to_string(), json!("x"));
    inputs.insert("number_b".to_string(), json!(5));
    TestScenario::new(
        "error-1",
        "rejects string input",
        ScenarioCategory::Error,
        inputs,
        ExpectedOutcome::Raises("TypeError".to_string()),
    )
    .expect("valid scenario")
}

/// Plan of `n` typical scenarios with ids `typical-1..=n`.
pub fn typical_plan(n: usize) -> TestPlan {
    TestPlan::new(
        (1..=n)
            .map(|i| {
                let mut inputs = Map::new();
                inputs.insert("number_a".to_string(), json!(i));
                inputs.insert("number_b".to_string(), json!(1));
                TestScenario::new(
                    format!("typical-{i}"),
                    format!("adds {i} and 1"),
                    ScenarioCategory::Typical,
                    inputs,
                    ExpectedOutcome::Returns(Value::from(i + 1)),
                )
                .expect("valid scenario")
            })
            .collect(),
    )
    .expect("non-empty plan")
}

pub fn refinement_config(max_attempts: u32, max_concurrency: usize) -> RefinementConfig {
    RefinementConfig {
        max_attempts,
        max_concurrency,
        call_timeout_secs: 5,
        ..RefinementConfig::default()
    }
}

/// One recorded synthesis call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisCall {
    pub scenario_id: String,
    pub attempt: u32,
    pub feedback: Option<String>,
}

type SynthesisScript = dyn Fn(&TestScenario, u32, Option<&str>) -> DomainResult<String> + Send + Sync;

/// Synthesizer driven by a closure of (scenario, attempt, feedback).
pub struct ScriptedSynthesizer {
    script: Box<SynthesisScript>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<SynthesisCall>>,
}

impl ScriptedSynthesizer {
    pub fn new(
        script: impl Fn(&TestScenario, u32, Option<&str>) -> DomainResult<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            delays: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Candidate text naming the scenario and attempt.
    pub fn echo() -> Self {
        Self::new(|scenario, attempt, _| {
            Ok(format!(
                "def test_{}_v{attempt}():\n    assert True",
                scenario.id.replace('-', "_")
            ))
        })
    }

    pub fn with_delay(mut self, scenario_id: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(scenario_id.into(), delay);
        self
    }

    pub fn calls(&self) -> Vec<SynthesisCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, scenario_id: &str) -> Vec<SynthesisCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.scenario_id == scenario_id)
            .collect()
    }
}

#[async_trait]
impl CandidateSynthesizer for ScriptedSynthesizer {
    async fn synthesize(
        &self,
        _descriptor: &FunctionDescriptor,
        scenario: &TestScenario,
        feedback: Option<&str>,
    ) -> DomainResult<String> {
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            let attempt = 1 + calls.iter().filter(|c| c.scenario_id == scenario.id).count() as u32;
            calls.push(SynthesisCall {
                scenario_id: scenario.id.clone(),
                attempt,
                feedback: feedback.map(str::to_string),
            });
            attempt
        };
        if let Some(delay) = self.delays.get(&scenario.id) {
            tokio::time::sleep(*delay).await;
        }
        (self.script)(scenario, attempt, feedback)
    }
}

type ReviewScript = dyn Fn(&TestScenario, &str) -> DomainResult<Verdict> + Send + Sync;

/// Critic driven by a closure of (scenario, candidate).
pub struct ScriptedCritic {
    script: Box<ReviewScript>,
    reviews: Mutex<Vec<(String, String)>>,
}

impl ScriptedCritic {
    pub fn new(
        script: impl Fn(&TestScenario, &str) -> DomainResult<Verdict> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            reviews: Mutex::new(Vec::new()),
        }
    }

    pub fn accept_all() -> Self {
        Self::new(|_, _| Ok(Verdict::Accept))
    }

    pub fn reject_all(feedback: &'static str) -> Self {
        Self::new(move |_, _| Ok(Verdict::reject(feedback)))
    }

    pub fn review_count(&self) -> usize {
        self.reviews.lock().unwrap().len()
    }
}

#[async_trait]
impl Critic for ScriptedCritic {
    async fn review(
        &self,
        _descriptor: &FunctionDescriptor,
        scenario: &TestScenario,
        candidate: &str,
    ) -> DomainResult<Verdict> {
        self.reviews
            .lock()
            .unwrap()
            .push((scenario.id.clone(), candidate.to_string()));
        (self.script)(scenario, candidate)
    }
}

/// Planner returning a fixed result.
pub struct StaticPlanner {
    plan: Option<TestPlan>,
}

impl StaticPlanner {
    pub fn new(plan: TestPlan) -> Self {
        Self { plan: Some(plan) }
    }

    pub fn failing() -> Self {
        Self { plan: None }
    }
}

#[async_trait]
impl ScenarioPlanner for StaticPlanner {
    async fn plan(&self, _descriptor: &FunctionDescriptor) -> DomainResult<TestPlan> {
        self.plan
            .clone()
            .ok_or_else(|| DomainError::PlanningFailure("planner produced no scenarios".to_string()))
    }
}

/// Extractor returning a fixed descriptor.
pub struct StaticExtractor(pub FunctionDescriptor);

#[async_trait]
impl FunctionExtractor for StaticExtractor {
    fn language(&self) -> &'static str {
        "python"
    }

    async fn extract(&self, _source_path: &Path, _function_name: &str) -> DomainResult<FunctionDescriptor> {
        Ok(self.0.clone())
    }
}

/// Writer that records artifacts in memory.
#[derive(Default)]
pub struct MemoryWriter {
    written: Mutex<Vec<OutputArtifact>>,
}

impl MemoryWriter {
    pub fn written(&self) -> Vec<OutputArtifact> {
        self.written.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactWriter for MemoryWriter {
    async fn write(&self, artifact: &OutputArtifact) -> DomainResult<PathBuf> {
        self.written.lock().unwrap().push(artifact.clone());
        Ok(artifact.path.clone())
    }
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
