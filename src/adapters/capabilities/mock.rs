//! Scripted generation capability for tests and offline runs.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::domain::ports::{
    CapabilityError, CapabilityRequest, CapabilityResponse, CapabilityRole, GenerationCapability,
    TokenUsage,
};

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Reply with this text.
    Success(String),
    /// Fail with this execution error.
    Failure(String),
    /// Reply after a delay.
    Delayed(Duration, String),
}

impl MockResponse {
    /// Scripted successful reply.
    pub fn success(output: impl Into<String>) -> Self {
        Self::Success(output.into())
    }

    /// Scripted execution failure.
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure(error.into())
    }
}

#[derive(Debug)]
enum Scripted {
    Reply(MockResponse),
    Error(CapabilityError),
}

/// Capability that replays per-role scripts in order.
///
/// When a role's script runs dry the mock either fails with
/// `CapabilityError::ScriptExhausted` or, in offline mode, answers with a
/// deterministic reply derived from the request context.
#[derive(Debug, Default)]
pub struct MockCapability {
    scripts: Mutex<HashMap<CapabilityRole, VecDeque<Scripted>>>,
    calls: Mutex<Vec<(CapabilityRole, String)>>,
    offline: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockCapability {
    /// Mock with no scripted replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock that never runs dry: planner, writer and reviewer all produce
    /// deterministic offline replies.
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    /// Queue a successful reply for `role`.
    pub fn with_response(self, role: CapabilityRole, output: impl Into<String>) -> Self {
        self.push(role, Scripted::Reply(MockResponse::success(output)));
        self
    }

    /// Queue an arbitrary reply for `role`.
    pub fn with_mock_response(self, role: CapabilityRole, response: MockResponse) -> Self {
        self.push(role, Scripted::Reply(response));
        self
    }

    /// Queue a failure for `role`.
    pub fn with_failure(self, role: CapabilityRole, error: CapabilityError) -> Self {
        self.push(role, Scripted::Error(error));
        self
    }

    fn push(&self, role: CapabilityRole, entry: Scripted) {
        lock(&self.scripts).entry(role).or_default().push_back(entry);
    }

    /// Number of requests received for `role`.
    pub fn call_count(&self, role: CapabilityRole) -> usize {
        lock(&self.calls).iter().filter(|(r, _)| *r == role).count()
    }

    /// Prompts received for `role`, in arrival order.
    pub fn prompts(&self, role: CapabilityRole) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .filter(|(r, _)| *r == role)
            .map(|(_, prompt)| prompt.clone())
            .collect()
    }

    fn offline_reply(request: &CapabilityRequest) -> String {
        let context = request.context.clone().unwrap_or(Value::Null);
        match request.role {
            CapabilityRole::Planner => offline_plan(&context),
            CapabilityRole::Writer => offline_test(&context),
            CapabilityRole::Reviewer => {
                json!({"is_perfect": true, "improvements_needed": null}).to_string()
            }
        }
    }
}

#[async_trait]
impl GenerationCapability for MockCapability {
    fn capability_id(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: CapabilityRequest) -> Result<CapabilityResponse, CapabilityError> {
        lock(&self.calls).push((request.role, request.prompt.clone()));

        let next = lock(&self.scripts)
            .get_mut(&request.role)
            .and_then(VecDeque::pop_front);

        let content = match next {
            Some(Scripted::Reply(MockResponse::Success(output))) => output,
            Some(Scripted::Reply(MockResponse::Failure(error))) => {
                return Err(CapabilityError::ExecutionFailed(error))
            }
            Some(Scripted::Reply(MockResponse::Delayed(delay, output))) => {
                tokio::time::sleep(delay).await;
                output
            }
            Some(Scripted::Error(error)) => return Err(error),
            None if self.offline => Self::offline_reply(&request),
            None => return Err(CapabilityError::ScriptExhausted(request.role.to_string())),
        };

        let mut response = CapabilityResponse::text(request.request_id, content);
        response.usage = Some(TokenUsage::default());
        Ok(response)
    }
}

/// One typical scenario with a representative value per parameter.
fn offline_plan(context: &Value) -> String {
    let name = context["qualified_name"].as_str().unwrap_or("function");
    let inputs: serde_json::Map<String, Value> = context["parameters"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|param| {
            let name = param["name"].as_str()?;
            if matches!(name, "self" | "cls") || name.starts_with('*') {
                return None;
            }
            Some((name.to_string(), sample_value(param["declared_type"].as_str())))
        })
        .collect();

    json!({
        "typical": [{
            "description": format!("calls {name} with representative inputs"),
            "inputs": inputs,
            "expected_outcome": {"returns": null},
        }],
        "boundary": [],
        "error": [],
    })
    .to_string()
}

fn sample_value(declared_type: Option<&str>) -> Value {
    match declared_type.unwrap_or_default() {
        "int" => json!(1),
        "float" => json!(1.0),
        "str" => json!("a"),
        "bool" => json!(true),
        t if t.starts_with("list") || t.starts_with("List") => json!([]),
        t if t.starts_with("dict") || t.starts_with("Dict") => json!({}),
        _ => Value::Null,
    }
}

/// A test that calls the function with the scenario's inputs and checks
/// its expected outcome.
fn offline_test(context: &Value) -> String {
    let function = context["function"].as_str().unwrap_or("function");
    let scenario = &context["scenario"];
    let id = scenario["id"].as_str().unwrap_or("scenario").replace('-', "_");
    let args = scenario["inputs"]
        .as_object()
        .map(|inputs| {
            inputs
                .iter()
                .map(|(k, v)| format!("{k}={}", python_literal(v)))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default();

    let outcome = &scenario["expected_outcome"];
    if let Some(kind) = outcome["raises"].as_str() {
        format!("def test_{function}_{id}():\n    with pytest.raises({kind}):\n        {function}({args})")
    } else {
        format!(
            "def test_{function}_{id}():\n    assert {function}({args}) == {}",
            python_literal(&outcome["returns"])
        )
    }
}

/// Render a JSON value as a Python literal.
pub fn python_literal(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => Value::String(s.clone()).to_string(),
        Value::Array(items) => format!(
            "[{}]",
            items.iter().map(python_literal).collect::<Vec<_>>().join(", ")
        ),
        Value::Object(map) => format!(
            "{{{}}}",
            map.iter()
                .map(|(k, v)| format!("{}: {}", Value::String(k.clone()), python_literal(v)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(role: CapabilityRole) -> CapabilityRequest {
        CapabilityRequest::new(role, "system", "prompt")
    }

    #[tokio::test]
    async fn test_scripts_replay_in_order_per_role() {
        let mock = MockCapability::new()
            .with_response(CapabilityRole::Writer, "first")
            .with_response(CapabilityRole::Writer, "second")
            .with_response(CapabilityRole::Reviewer, "review");

        assert_eq!(mock.generate(request(CapabilityRole::Writer)).await.unwrap().content, "first");
        assert_eq!(mock.generate(request(CapabilityRole::Reviewer)).await.unwrap().content, "review");
        assert_eq!(mock.generate(request(CapabilityRole::Writer)).await.unwrap().content, "second");
        assert_eq!(mock.call_count(CapabilityRole::Writer), 2);
    }

    #[tokio::test]
    async fn test_exhausted_script_fails() {
        let mock = MockCapability::new();
        let err = mock.generate(request(CapabilityRole::Planner)).await.unwrap_err();
        assert!(matches!(err, CapabilityError::ScriptExhausted(_)));
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let mock = MockCapability::new()
            .with_mock_response(CapabilityRole::Writer, MockResponse::failure("boom"));
        let err = mock.generate(request(CapabilityRole::Writer)).await.unwrap_err();
        assert_eq!(err.to_string(), "Execution failed: boom");
    }

    #[tokio::test]
    async fn test_offline_plan_uses_parameters() {
        let mock = MockCapability::offline();
        let req = request(CapabilityRole::Planner).with_context(json!({
            "qualified_name": "add",
            "parameters": [
                {"name": "number_a", "declared_type": "int"},
                {"name": "number_b", "declared_type": "int"}
            ]
        }));
        let plan: Value = serde_json::from_str(&mock.generate(req).await.unwrap().content).unwrap();
        assert_eq!(plan["typical"][0]["inputs"], json!({"number_a": 1, "number_b": 1}));
    }

    #[tokio::test]
    async fn test_offline_writer_renders_raises() {
        let mock = MockCapability::offline();
        let req = request(CapabilityRole::Writer).with_context(json!({
            "function": "add",
            "scenario": {
                "id": "error-1",
                "inputs": {"number_a": "x", "number_b": 5},
                "expected_outcome": {"raises": "TypeError"}
            }
        }));
        let test = mock.generate(req).await.unwrap().content;
        assert_eq!(
            test,
            "def test_add_error_1():\n    with pytest.raises(TypeError):\n        add(number_a=\"x\", number_b=5)"
        );
    }

    #[test]
    fn test_python_literal() {
        assert_eq!(python_literal(&json!(null)), "None");
        assert_eq!(python_literal(&json!([true, false, 1.5])), "[True, False, 1.5]");
        assert_eq!(python_literal(&json!({"k": "v"})), "{\"k\": \"v\"}");
    }
}
