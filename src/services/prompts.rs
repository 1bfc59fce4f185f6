//! Instruction templates for the planner, test writer and reviewer.

use crate::domain::models::FunctionDescriptor;

/// Renders instructions for every capability-backed stage.
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    test_framework: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self::new("pytest")
    }
}

impl PromptTemplates {
    /// Templates targeting `test_framework`.
    pub fn new(test_framework: impl Into<String>) -> Self {
        Self {
            test_framework: test_framework.into(),
        }
    }

    /// Framework named in prompts and the preamble.
    pub fn test_framework(&self) -> &str {
        &self.test_framework
    }

    /// System prompt for planning.
    pub fn planner_system(&self) -> String {
        "You are a meticulous test planner. You read a single function and enumerate the \
         test scenarios needed to verify it. You answer with JSON only."
            .to_string()
    }

    /// Planning prompt for `descriptor`.
    pub fn planner(&self, descriptor: &FunctionDescriptor) -> String {
        format!(
            r#"## Function Under Test
Name: {name}
Signature: {signature}

## Source
```
{body}
```

## Instructions
Plan a comprehensive set of unit test scenarios for this function, grouped into three categories:

1. **typical**: happy-path calls with ordinary inputs. These MUST use `returns`.
2. **boundary**: edge and boundary values (empty, zero, negative, very large, ...). These MUST use `returns`.
3. **error**: invalid input that makes the function raise. These MUST use `raises` with the exception class name.

Each scenario's `inputs` maps parameter names to literal JSON values. Use only the parameters in the signature.

## Required Output Format (JSON)
```json
{{
  "typical": [
    {{
      "description": "One-sentence purpose of the test",
      "inputs": {{"param": 1}},
      "expected_outcome": {{"returns": 2}}
    }}
  ],
  "boundary": [],
  "error": [
    {{
      "description": "One-sentence purpose of the test",
      "inputs": {{"param": "x"}},
      "expected_outcome": {{"raises": "TypeError"}}
    }}
  ]
}}
```

IMPORTANT: Output ONLY the JSON object, no other text."#,
            name = descriptor.qualified_name,
            signature = descriptor.signature,
            body = descriptor.body,
        )
    }

    /// System prompt for writing tests.
    pub fn writer_system(&self) -> String {
        format!(
            "You are an expert Python engineer who writes precise {} unit tests. \
             You answer with code only.",
            self.test_framework
        )
    }

    /// Prompt for drafting one scenario's test.
    pub fn writer(
        &self,
        descriptor: &FunctionDescriptor,
        scenario_json: &str,
        feedback: Option<&str>,
    ) -> String {
        let feedback_section = match feedback {
            Some(feedback) if !feedback.trim().is_empty() => format!(
                "\n## Reviewer Feedback On Your Previous Attempt\n{feedback}\n\nAddress every point above in this attempt.\n"
            ),
            Some(_) => "\n## Reviewer Feedback On Your Previous Attempt\nThe previous attempt was rejected without specific feedback. Re-read the scenario carefully.\n".to_string(),
            None => String::new(),
        };

        format!(
            r#"## Function Under Test
Name: {name}
Signature: {signature}
Docstring: {doc}

## Source
```
{body}
```

## Scenario
```json
{scenario_json}
```
{feedback_section}
## Instructions
Write exactly ONE {framework} test function for this scenario.

- Name it `test_{function}_<short_snake_case_summary>`.
- Call `{function}` with exactly the scenario's inputs.
- For `returns`, assert equality with the expected value.
- For `raises`, use `with pytest.raises(<ErrorKind>):` around the call.
- Do NOT include imports; they are added separately.

Output ONLY the Python code for the test function."#,
            name = descriptor.qualified_name,
            signature = descriptor.signature,
            doc = if descriptor.has_documentation() {
                descriptor.documentation.as_str()
            } else {
                "No docstring provided."
            },
            body = descriptor.body,
            framework = self.test_framework,
            function = descriptor.function_name(),
        )
    }

    /// System prompt for reviewing tests.
    pub fn reviewer_system(&self) -> String {
        format!(
            "You are a strict reviewer of {} unit tests. You answer with JSON only.",
            self.test_framework
        )
    }

    /// Prompt for reviewing one candidate.
    pub fn reviewer(
        &self,
        descriptor: &FunctionDescriptor,
        scenario_json: &str,
        candidate: &str,
    ) -> String {
        format!(
            r#"## Function Under Test
Signature: {signature}

## Source
```
{body}
```

## Scenario
```json
{scenario_json}
```

## Candidate Test
```python
{candidate}
```

## Review Criteria
1. The test calls `{function}` with exactly the scenario's inputs.
2. The assertion matches the scenario's expected outcome (`returns` or `raises`).
3. The test is self-contained, deterministic and syntactically valid.
4. The test does not re-import or redefine the function under test.

## Required Output Format (JSON)
```json
{{
  "is_perfect": false,
  "improvements_needed": [
    {{"issue": "What is wrong", "suggestion": "How to fix it"}}
  ]
}}
```
`improvements_needed` MUST contain at least one item when `is_perfect` is false, and MUST be null or empty when `is_perfect` is true.

IMPORTANT: Output ONLY the JSON object, no other text."#,
            signature = descriptor.signature,
            body = descriptor.body,
            function = descriptor.function_name(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::descriptor::fixtures::add_descriptor;

    #[test]
    fn test_planner_prompt_mentions_signature() {
        let prompt = PromptTemplates::default().planner(&add_descriptor());
        assert!(prompt.contains("def add(number_a: int, number_b: int) -> int:"));
        assert!(prompt.contains("\"typical\""));
    }

    #[test]
    fn test_writer_prompt_includes_feedback_verbatim() {
        let templates = PromptTemplates::default();
        let prompt = templates.writer(
            &add_descriptor(),
            "{}",
            Some("missing exception assertion"),
        );
        assert!(prompt.contains("missing exception assertion"));

        let first = templates.writer(&add_descriptor(), "{}", None);
        assert!(!first.contains("Reviewer Feedback"));

        let empty = templates.writer(&add_descriptor(), "{}", Some(""));
        assert!(empty.contains("rejected without specific feedback"));
    }

    #[test]
    fn test_reviewer_prompt_embeds_candidate() {
        let prompt = PromptTemplates::new("pytest").reviewer(
            &add_descriptor(),
            "{}",
            "def test_add(): assert add(1, 2) == 3",
        );
        assert!(prompt.contains("def test_add(): assert add(1, 2) == 3"));
        assert!(prompt.contains("is_perfect"));
    }
}
