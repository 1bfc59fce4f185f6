//! Test scenario and test plan domain models.
//!
//! A [`TestPlan`] can only be built through [`TestPlan::new`], which checks
//! that every scenario's category agrees with the shape of its expected
//! outcome. Planner output that fails this check never reaches refinement.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

use crate::domain::errors::{DomainError, DomainResult};

/// Category of a planned test scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioCategory {
    /// Happy path / typical usage.
    Typical,
    /// Edge and boundary values.
    Boundary,
    /// Invalid input expected to raise.
    Error,
}

impl ScenarioCategory {
    /// Categories in plan order.
    pub const ALL: [Self; 3] = [Self::Typical, Self::Boundary, Self::Error];

    /// Lowercase label.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Typical => "typical",
            Self::Boundary => "boundary",
            Self::Error => "error",
        }
    }

    /// Whether scenarios of this category must expect an error.
    pub const fn expects_error(&self) -> bool {
        matches!(self, Self::Error)
    }
}

impl fmt::Display for ScenarioCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expected result of running the function with a scenario's inputs.
///
/// Serializes as `{"returns": <value>}` or `{"raises": "<ErrorKind>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedOutcome {
    /// The function returns this value.
    Returns(Value),
    /// The function raises an error of this kind.
    Raises(String),
}

impl ExpectedOutcome {
    /// Parse an interchange record, requiring exactly one of `returns` or
    /// `raises`. A `null` return value is a valid expectation.
    pub fn from_record(record: &Value) -> DomainResult<Self> {
        let Some(object) = record.as_object() else {
            return Err(DomainError::ValidationFailed(format!(
                "expected_outcome must be an object, got {record}"
            )));
        };

        match (object.get("returns"), object.get("raises")) {
            (Some(value), None) => Ok(Self::Returns(value.clone())),
            (None, Some(Value::String(kind))) if is_error_kind(kind) => {
                Ok(Self::Raises(kind.trim().to_string()))
            }
            (None, Some(other)) => Err(DomainError::ValidationFailed(format!(
                "raises must name an error kind, got {other}"
            ))),
            (Some(_), Some(_)) => Err(DomainError::ValidationFailed(
                "expected_outcome carries both returns and raises".to_string(),
            )),
            (None, None) => Err(DomainError::ValidationFailed(
                "expected_outcome carries neither returns nor raises".to_string(),
            )),
        }
    }

    /// Whether this is [`ExpectedOutcome::Raises`].
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Raises(_))
    }
}

fn is_error_kind(kind: &str) -> bool {
    let kind = kind.trim();
    !kind.is_empty()
        && kind
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_alphanumeric() || c == '_'))
}

/// One planned unit-test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestScenario {
    /// Unique within a plan, e.g. `boundary-2`.
    pub id: String,
    /// What the test checks.
    pub description: String,
    /// Scenario category.
    pub category: ScenarioCategory,
    /// Parameter name to literal value, in planner order.
    pub inputs: Map<String, Value>,
    /// Return value or raised exception.
    pub expected_outcome: ExpectedOutcome,
}

impl TestScenario {
    /// Build a scenario, checking category against outcome shape.
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        category: ScenarioCategory,
        inputs: Map<String, Value>,
        expected_outcome: ExpectedOutcome,
    ) -> DomainResult<Self> {
        let scenario = Self {
            id: id.into(),
            description: description.into(),
            category,
            inputs,
            expected_outcome,
        };
        scenario.validate()?;
        Ok(scenario)
    }

    /// Check the category/outcome invariant and the id.
    pub fn validate(&self) -> DomainResult<()> {
        if self.id.trim().is_empty() {
            return Err(DomainError::ValidationFailed("scenario id is empty".to_string()));
        }
        if self.description.trim().is_empty() {
            return Err(DomainError::ValidationFailed(format!(
                "scenario {} has an empty description",
                self.id
            )));
        }
        if self.category.expects_error() != self.expected_outcome.is_error() {
            let found = if self.expected_outcome.is_error() { "raises" } else { "returns" };
            return Err(DomainError::ValidationFailed(format!(
                "scenario {} is {} but expects `{}`",
                self.id, self.category, found
            )));
        }
        Ok(())
    }

    /// JSON rendering handed to synthesis and review instructions.
    pub fn to_prompt_json(&self) -> DomainResult<String> {
        let record = serde_json::json!({
            "description": self.description,
            "category": self.category,
            "inputs": self.inputs,
            "expected_outcome": self.expected_outcome,
        });
        Ok(serde_json::to_string_pretty(&record)?)
    }
}

/// Ordered, non-empty, validated sequence of scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestPlan {
    scenarios: Vec<TestScenario>,
}

impl TestPlan {
    /// Validate and wrap planner output. Every failure is a planning failure.
    pub fn new(scenarios: Vec<TestScenario>) -> DomainResult<Self> {
        if scenarios.is_empty() {
            return Err(DomainError::PlanningFailure(
                "planner produced no scenarios".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(scenarios.len());
        for scenario in &scenarios {
            scenario
                .validate()
                .map_err(|e| DomainError::PlanningFailure(e.to_string()))?;
            if !seen.insert(scenario.id.as_str()) {
                return Err(DomainError::PlanningFailure(format!(
                    "duplicate scenario id {}",
                    scenario.id
                )));
            }
        }

        Ok(Self { scenarios })
    }

    /// Scenarios in plan order.
    pub fn scenarios(&self) -> &[TestScenario] {
        &self.scenarios
    }

    /// Iterate scenarios in plan order.
    pub fn iter(&self) -> std::slice::Iter<'_, TestScenario> {
        self.scenarios.iter()
    }

    /// Number of scenarios.
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    /// Always false for a constructed plan; provided for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    /// Number of scenarios in `category`.
    pub fn count(&self, category: ScenarioCategory) -> usize {
        self.scenarios.iter().filter(|s| s.category == category).count()
    }
}

impl<'a> IntoIterator for &'a TestPlan {
    type Item = &'a TestScenario;
    type IntoIter = std::slice::Iter<'a, TestScenario>;

    fn into_iter(self) -> Self::IntoIter {
        self.scenarios.iter()
    }
}

/// Scenario record as emitted by the planning capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioRecord {
    /// What the test checks.
    pub description: String,
    /// Object, JSON-encoded object string, or null.
    #[serde(default)]
    pub inputs: Value,
    /// `{"returns": ..}` or `{"raises": ..}`.
    pub expected_outcome: Value,
}

impl ScenarioRecord {
    fn parse_inputs(&self) -> DomainResult<Map<String, Value>> {
        match &self.inputs {
            Value::Null => Ok(Map::new()),
            Value::Object(map) => Ok(map.clone()),
            Value::String(encoded) if encoded.trim().is_empty() => Ok(Map::new()),
            Value::String(encoded) => match serde_json::from_str::<Value>(encoded) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(other) => Err(DomainError::ValidationFailed(format!(
                    "inputs string must encode an object, got {other}"
                ))),
                Err(e) => Err(DomainError::ValidationFailed(format!(
                    "inputs string is not valid JSON: {e}"
                ))),
            },
            other => Err(DomainError::ValidationFailed(format!(
                "inputs must be a mapping, got {other}"
            ))),
        }
    }

    fn into_scenario(self, id: String, category: ScenarioCategory) -> DomainResult<TestScenario> {
        let inputs = self.parse_inputs()?;
        let outcome = ExpectedOutcome::from_record(&self.expected_outcome)?;
        TestScenario::new(id, self.description, category, inputs, outcome)
    }
}

/// Categorized plan document returned by the planning capability.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanDocument {
    /// Typical cases.
    #[serde(default, alias = "Happy Path / Typical Cases", alias = "happy_path_cases")]
    pub typical: Vec<ScenarioRecord>,
    /// Boundary cases.
    #[serde(default, alias = "Edge Cases", alias = "edge_cases")]
    pub boundary: Vec<ScenarioRecord>,
    /// Error cases.
    #[serde(default, alias = "Error Conditions / Invalid Input", alias = "error_conditions")]
    pub error: Vec<ScenarioRecord>,
}

impl PlanDocument {
    /// Records across all categories.
    pub fn len(&self) -> usize {
        self.typical.len() + self.boundary.len() + self.error.len()
    }

    /// Whether every category is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten typical, boundary, error (in that order) into a validated plan.
    pub fn into_plan(self) -> DomainResult<TestPlan> {
        let groups = [
            (ScenarioCategory::Typical, self.typical),
            (ScenarioCategory::Boundary, self.boundary),
            (ScenarioCategory::Error, self.error),
        ];

        let mut scenarios = Vec::new();
        for (category, records) in groups {
            for (idx, record) in records.into_iter().enumerate() {
                let id = format!("{}-{}", category, idx + 1);
                let scenario = record
                    .into_scenario(id.clone(), category)
                    .map_err(|e| DomainError::PlanningFailure(format!("{id}: {e}")))?;
                scenarios.push(scenario);
            }
        }

        TestPlan::new(scenarios)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inputs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn typical(id: &str) -> TestScenario {
        TestScenario::new(
            id,
            "adds two positives",
            ScenarioCategory::Typical,
            inputs(json!({"a": 1, "b": 2})),
            ExpectedOutcome::Returns(json!(3)),
        )
        .unwrap()
    }

    #[test]
    fn test_outcome_from_record() {
        assert_eq!(
            ExpectedOutcome::from_record(&json!({"returns": 3})).unwrap(),
            ExpectedOutcome::Returns(json!(3))
        );
        assert_eq!(
            ExpectedOutcome::from_record(&json!({"returns": null})).unwrap(),
            ExpectedOutcome::Returns(Value::Null)
        );
        assert_eq!(
            ExpectedOutcome::from_record(&json!({"raises": "TypeError"})).unwrap(),
            ExpectedOutcome::Raises("TypeError".to_string())
        );
        assert!(ExpectedOutcome::from_record(&json!({"returns": 1, "raises": "TypeError"})).is_err());
        assert!(ExpectedOutcome::from_record(&json!({})).is_err());
        assert!(ExpectedOutcome::from_record(&json!({"raises": ""})).is_err());
        assert!(ExpectedOutcome::from_record(&json!({"raises": "not an error"})).is_err());
        assert!(ExpectedOutcome::from_record(&json!("returns")).is_err());
    }

    #[test]
    fn test_outcome_serializes_as_single_key_record() {
        let raises = serde_json::to_value(ExpectedOutcome::Raises("ValueError".into())).unwrap();
        assert_eq!(raises, json!({"raises": "ValueError"}));
        let returns = serde_json::to_value(ExpectedOutcome::Returns(json!([1, 2]))).unwrap();
        assert_eq!(returns, json!({"returns": [1, 2]}));
    }

    #[test]
    fn test_error_scenario_must_raise() {
        let result = TestScenario::new(
            "error-1",
            "rejects string input",
            ScenarioCategory::Error,
            inputs(json!({"a": "x", "b": 5})),
            ExpectedOutcome::Returns(json!(null)),
        );
        assert!(matches!(result, Err(DomainError::ValidationFailed(_))));

        let result = TestScenario::new(
            "boundary-1",
            "zero",
            ScenarioCategory::Boundary,
            Map::new(),
            ExpectedOutcome::Raises("ValueError".into()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_plan_rejects_empty_and_duplicates() {
        assert!(matches!(TestPlan::new(vec![]), Err(DomainError::PlanningFailure(_))));
        assert!(matches!(
            TestPlan::new(vec![typical("typical-1"), typical("typical-1")]),
            Err(DomainError::PlanningFailure(_))
        ));
        let plan = TestPlan::new(vec![typical("typical-1"), typical("typical-2")]).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.count(ScenarioCategory::Typical), 2);
    }

    #[test]
    fn test_plan_document_flattens_in_category_order() {
        let doc: PlanDocument = serde_json::from_value(json!({
            "error": [{
                "description": "rejects string input",
                "inputs": {"a": "x", "b": 5},
                "expected_outcome": {"raises": "TypeError"}
            }],
            "typical": [{
                "description": "adds two positives",
                "inputs": "{\"a\": 1, \"b\": 2}",
                "expected_outcome": {"returns": 3}
            }],
            "boundary": [{
                "description": "adds zeros",
                "inputs": {"a": 0, "b": 0},
                "expected_outcome": {"returns": 0}
            }]
        }))
        .unwrap();

        let plan = doc.into_plan().unwrap();
        let ids: Vec<_> = plan.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["typical-1", "boundary-1", "error-1"]);
        assert_eq!(plan.scenarios()[0].inputs["a"], json!(1));
    }

    #[test]
    fn test_plan_document_accepts_long_category_keys() {
        let doc: PlanDocument = serde_json::from_value(json!({
            "Happy Path / Typical Cases": [{
                "description": "adds",
                "inputs": {"a": 1, "b": 1},
                "expected_outcome": {"returns": 2}
            }],
            "Edge Cases": [],
            "Error Conditions / Invalid Input": []
        }))
        .unwrap();
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.into_plan().unwrap().len(), 1);
    }

    #[test]
    fn test_plan_document_rejects_mismatched_category() {
        let doc: PlanDocument = serde_json::from_value(json!({
            "typical": [{
                "description": "adds",
                "inputs": {"a": 1, "b": 1},
                "expected_outcome": {"raises": "TypeError"}
            }]
        }))
        .unwrap();
        let err = doc.into_plan().unwrap_err();
        assert!(matches!(err, DomainError::PlanningFailure(ref msg) if msg.contains("typical-1")));
    }

    #[test]
    fn test_plan_document_rejects_bad_inputs() {
        let doc: PlanDocument = serde_json::from_value(json!({
            "typical": [{
                "description": "adds",
                "inputs": [1, 2],
                "expected_outcome": {"returns": 3}
            }]
        }))
        .unwrap();
        assert!(matches!(doc.into_plan(), Err(DomainError::PlanningFailure(_))));
    }

    #[test]
    fn test_empty_document_is_planning_failure() {
        let doc = PlanDocument::default();
        assert!(doc.is_empty());
        assert!(matches!(doc.into_plan(), Err(DomainError::PlanningFailure(_))));
    }
}
