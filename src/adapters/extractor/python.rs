//! Python function extractor.
//!
//! Locates a `def` by name with a line-anchored regex and recovers the
//! rest from indentation: the (possibly multi-line) header, parameters,
//! return annotation, docstring and body. When the name is defined more
//! than once the last definition wins.

use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{FunctionDescriptor, Parameter, UNTYPED};
use crate::domain::ports::FunctionExtractor;

/// Extracts Python function descriptors from source files.
///
/// Relative source paths are read against an optional project root; the
/// descriptor keeps the path as given.
#[derive(Debug, Clone, Default)]
pub struct PythonFunctionExtractor {
    root: Option<PathBuf>,
}

impl PythonFunctionExtractor {
    /// Extractor resolving paths against the working directory.
    pub const fn new() -> Self {
        Self { root: None }
    }

    /// Extractor resolving relative paths against `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }
}

#[async_trait]
impl FunctionExtractor for PythonFunctionExtractor {
    fn language(&self) -> &'static str {
        "python"
    }

    #[instrument(skip(self), fields(file = %source_path.display()))]
    async fn extract(&self, source_path: &Path, function_name: &str) -> DomainResult<FunctionDescriptor> {
        let location = match &self.root {
            Some(root) if source_path.is_relative() => root.join(source_path),
            _ => source_path.to_path_buf(),
        };
        let source = tokio::fs::read_to_string(&location).await.map_err(|e| {
            DomainError::AnalysisFailure(format!("cannot read '{}': {e}", source_path.display()))
        })?;
        let descriptor = parse_function(&source, source_path, function_name)?;
        debug!(
            function = %descriptor.qualified_name,
            parameters = descriptor.parameters.len(),
            "function extracted"
        );
        Ok(descriptor)
    }
}

/// Parse `function_name` out of Python `source`.
pub fn parse_function(
    source: &str,
    source_path: &Path,
    function_name: &str,
) -> DomainResult<FunctionDescriptor> {
    if !is_identifier(function_name) {
        return Err(DomainError::AnalysisFailure(format!(
            "'{function_name}' is not a valid Python identifier"
        )));
    }

    let pattern = Regex::new(&format!(
        r"(?m)^([ \t]*)((?:async[ \t]+)?)def[ \t]+{}[ \t]*\(",
        regex::escape(function_name)
    ))
    .map_err(|e| DomainError::AnalysisFailure(e.to_string()))?;

    let not_found = || {
        DomainError::AnalysisFailure(format!(
            "function '{function_name}' not found in '{}'",
            source_path.display()
        ))
    };
    let captures = pattern.captures_iter(source).last().ok_or_else(not_found)?;
    let whole = captures.get(0).ok_or_else(not_found)?;
    let indent = captures.get(1).map_or(0, |m| m.as_str().len());
    let is_async = captures.get(2).is_some_and(|m| !m.as_str().is_empty());

    let def_start = whole.start();
    let open = whole.end() - 1;
    let (close, colon) = scan_header(source, open).ok_or_else(|| {
        DomainError::AnalysisFailure(format!(
            "could not parse the signature of '{function_name}'"
        ))
    })?;

    let raw_params = strip_comments(&source[open + 1..close]);
    let pieces: Vec<String> = split_top_level(&raw_params, b',')
        .into_iter()
        .map(collapse_whitespace)
        .filter(|p| !p.is_empty())
        .collect();
    let parameters: Vec<Parameter> = pieces.iter().filter_map(|p| parse_parameter(p)).collect();

    let return_type = source[close + 1..colon]
        .trim()
        .strip_prefix("->")
        .map(collapse_whitespace)
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| UNTYPED.to_string());

    let header_end = source[colon..].find('\n').map_or(source.len(), |i| colon + i);
    let inline = strip_comments(&source[colon + 1..header_end]);
    let inline = inline.trim();

    let (body_end, first_statement) = body_extent(source, header_end, indent);
    if inline.is_empty() && first_statement.is_none() {
        return Err(DomainError::AnalysisFailure(format!(
            "function '{function_name}' has no body"
        )));
    }

    let documentation = if inline.is_empty() {
        first_statement
            .and_then(|start| leading_string_literal(&source[start..body_end]))
            .unwrap_or_default()
    } else {
        leading_string_literal(inline).unwrap_or_default()
    };

    let body = dedent(&source[def_start..body_end.max(header_end)], indent);

    let signature = format!(
        "{}def {function_name}({}){}:",
        if is_async { "async " } else { "" },
        pieces.join(", "),
        if return_type == UNTYPED {
            String::new()
        } else {
            format!(" -> {return_type}")
        }
    );

    let mut owners = enclosing_classes(&source[..def_start], indent);
    owners.push(function_name.to_string());

    Ok(FunctionDescriptor {
        qualified_name: owners.join("."),
        parameters,
        return_type,
        documentation,
        signature,
        body,
        source_path: source_path.to_path_buf(),
    })
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Byte offsets of the `)` closing the parameter list and of the `:`
/// ending the header, starting from the opening `(`.
fn scan_header(source: &str, open: usize) -> Option<(usize, usize)> {
    let bytes = source.as_bytes();
    let mut depth = 0usize;
    let mut close = None;
    let mut quote: Option<u8> = None;
    let mut i = open;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 1;
            } else if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'"' | b'\'' => quote = Some(b),
            b'#' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 && close.is_none() {
                    close = Some(i);
                }
            }
            b':' if depth == 0 => {
                if let Some(close) = close {
                    return Some((close, i));
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// End offset of the indented block after the header, and the offset of
/// its first non-blank line.
fn body_extent(source: &str, header_end: usize, indent: usize) -> (usize, Option<usize>) {
    let mut end = header_end;
    let mut first = None;
    let mut cursor = header_end;

    while cursor < source.len() {
        let line_start = cursor + 1;
        let line_end = source
            .get(line_start..)
            .and_then(|rest| rest.find('\n'))
            .map_or(source.len(), |i| line_start + i);
        let line = source.get(line_start..line_end).unwrap_or_default();
        cursor = line_end;

        let trimmed = line.trim_start();
        if trimmed.trim_end().is_empty() {
            continue;
        }
        if line.len() - trimmed.len() <= indent {
            break;
        }
        if first.is_none() {
            first = Some(line_start);
        }
        end = line_end;
    }
    (end, first)
}

/// Remove `#` comments outside string literals.
fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut in_comment = false;

    for c in text.chars() {
        if in_comment {
            if c == '\n' {
                in_comment = false;
                out.push(c);
            }
            continue;
        }
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == '#' => {
                in_comment = true;
                continue;
            }
            None => {}
        }
        out.push(c);
    }
    out
}

/// Split on `separator` where it is not nested in brackets or strings.
fn split_top_level(text: &str, separator: u8) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let bytes = text.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 1;
            } else if b == q {
                quote = None;
            }
        } else {
            match b {
                b'"' | b'\'' => quote = Some(b),
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth = depth.saturating_sub(1),
                _ if b == separator && depth == 0 => {
                    parts.push(&text[start..i]);
                    start = i + 1;
                }
                _ => {}
            }
        }
        i += 1;
    }
    parts.push(&text[start..]);
    parts
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `name[: annotation][= default]`; bare `/` and `*` markers yield `None`.
fn parse_parameter(piece: &str) -> Option<Parameter> {
    if piece == "/" || piece == "*" {
        return None;
    }
    let (head, default) = match split_top_level(piece, b'=').as_slice() {
        [head, rest @ ..] if !rest.is_empty() => (head.trim(), Some(rest.join("=").trim().to_string())),
        _ => (piece.trim(), None),
    };
    let (name, annotation) = match head.split_once(':') {
        Some((name, annotation)) => (name.trim(), Some(annotation.trim().to_string())),
        None => (head, None),
    };
    let parameter = Parameter::new(name, annotation);
    Some(match default {
        Some(default) => parameter.with_default(default),
        None => parameter,
    })
}

/// Cleaned text of a string literal opening `text`, if any.
fn leading_string_literal(text: &str) -> Option<String> {
    let text = text.trim_start();
    let text = text
        .strip_prefix(['r', 'R', 'u', 'U'])
        .filter(|rest| rest.starts_with(['"', '\'']))
        .unwrap_or(text);

    for quote in ["\"\"\"", "'''"] {
        if let Some(after) = text.strip_prefix(quote) {
            let close = after.find(quote)?;
            return Some(clean_docstring(&after[..close]));
        }
    }

    let quote = text.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let after = &text[1..];
    let close = after.find(quote)?;
    Some(after[..close].trim().to_string())
}

/// Strip the first line, dedent the rest by their common indentation and
/// drop surrounding blank lines.
fn clean_docstring(raw: &str) -> String {
    let mut lines = raw.lines();
    let first = lines.next().unwrap_or_default().trim().to_string();
    let rest: Vec<&str> = lines.collect();
    let margin = rest
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut cleaned: Vec<String> = std::iter::once(first)
        .chain(
            rest.iter()
                .map(|l| l.get(margin..).unwrap_or_default().trim_end().to_string()),
        )
        .collect();
    while cleaned.last().is_some_and(|l| l.is_empty()) {
        cleaned.pop();
    }
    while cleaned.first().is_some_and(|l| l.is_empty()) {
        cleaned.remove(0);
    }
    cleaned.join("\n")
}

fn dedent(block: &str, indent: usize) -> String {
    block
        .lines()
        .map(|line| {
            let leading = line.len() - line.trim_start().len();
            line.get(leading.min(indent)..).unwrap_or(line).trim_end()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Names of the classes enclosing a definition indented by `indent`.
/// A function nested in another function has no importable owner.
fn enclosing_classes(preceding: &str, indent: usize) -> Vec<String> {
    let mut owners = Vec::new();
    let mut threshold = indent;

    for line in preceding.lines().rev() {
        if threshold == 0 {
            break;
        }
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line_indent = line.len() - trimmed.len();
        if line_indent >= threshold {
            continue;
        }
        threshold = line_indent;

        if let Some(rest) = trimmed.strip_prefix("class") {
            if rest.starts_with([' ', '\t']) {
                let name: String = rest
                    .trim_start()
                    .chars()
                    .take_while(|c| c.is_alphanumeric() || *c == '_')
                    .collect();
                owners.push(name);
            }
        } else if trimmed.starts_with("def ") || trimmed.starts_with("async def ") {
            return Vec::new();
        }
    }
    owners.reverse();
    owners
}
