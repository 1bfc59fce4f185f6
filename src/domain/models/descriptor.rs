//! Function descriptor domain model.
//!
//! A descriptor is the structured view of the function under test. It is
//! produced once per run by an extractor and is read-only afterwards.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Type label used when a parameter or return value carries no annotation.
pub const UNTYPED: &str = "untyped";

/// A single declared parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name as written in the signature.
    pub name: String,
    /// Declared type, or [`UNTYPED`].
    pub declared_type: String,
    /// Default value expression, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl Parameter {
    /// Parameter without a default.
    pub fn new(name: impl Into<String>, declared_type: Option<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| UNTYPED.to_string()),
            default: None,
        }
    }

    /// Attach a default value expression.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Whether the parameter carries an annotation.
    pub fn is_typed(&self) -> bool {
        self.declared_type != UNTYPED
    }
}

/// Structured description of the function under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    /// Qualified name (`Class.method` for methods, plain name otherwise).
    pub qualified_name: String,
    /// Ordered parameter list.
    pub parameters: Vec<Parameter>,
    /// Declared return type, or [`UNTYPED`].
    pub return_type: String,
    /// Docstring text, empty when absent.
    pub documentation: String,
    /// Signature line as it appears in source, normalized to one line.
    pub signature: String,
    /// Full source of the function, dedented.
    pub body: String,
    /// Path of the file the function came from, relative to the project root.
    pub source_path: PathBuf,
}

impl FunctionDescriptor {
    /// Bare function name (last segment of the qualified name).
    pub fn function_name(&self) -> &str {
        self.qualified_name
            .rsplit('.')
            .next()
            .unwrap_or(&self.qualified_name)
    }

    /// Path of the source file.
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Whether a docstring was found.
    pub fn has_documentation(&self) -> bool {
        !self.documentation.trim().is_empty()
    }

    /// Whether the body contains anything beyond the signature, docstring
    /// and `pass`/`...` placeholders.
    pub fn has_behavior(&self) -> bool {
        let mut depth = 0i32;
        let mut in_header = true;
        let mut open_quote: Option<&str> = None;

        for raw in self.body.lines() {
            let mut line = raw.trim();

            if in_header {
                let mut rest = None;
                for (idx, ch) in line.char_indices() {
                    match ch {
                        '(' | '[' | '{' => depth += 1,
                        ')' | ']' | '}' => depth -= 1,
                        ':' if depth == 0 && line[..idx].contains(')') => {
                            rest = Some(line[idx + 1..].trim());
                            break;
                        }
                        _ => {}
                    }
                }
                match rest {
                    Some(tail) => {
                        in_header = false;
                        line = tail;
                    }
                    None => continue,
                }
            }

            if let Some(quote) = open_quote {
                if line.contains(quote) {
                    open_quote = None;
                }
                continue;
            }

            if line.is_empty() || line.starts_with('#') || line == "pass" || line == "..." {
                continue;
            }

            if let Some(quote) = ["\"\"\"", "'''"].into_iter().find(|q| line.starts_with(q)) {
                if line.matches(quote).count() < 2 {
                    open_quote = Some(quote);
                }
                continue;
            }

            return true;
        }
        false
    }

    /// Short JSON summary used as planner context.
    pub fn analysis_json(&self) -> serde_json::Value {
        serde_json::json!({
            "qualified_name": self.qualified_name,
            "signature": self.signature,
            "docstring": if self.has_documentation() {
                self.documentation.as_str()
            } else {
                "No docstring provided."
            },
            "parameters": self.parameters,
            "return_type": self.return_type,
        })
    }
}
