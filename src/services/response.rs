//! Helpers for pulling structured content out of free-form capability output.

/// Extract a JSON object or array from a response that may wrap it in a
/// Markdown fence or surround it with prose.
///
/// Falls back to the trimmed input when nothing JSON-shaped is found, so the
/// caller's parse error reports what the capability actually said.
pub fn extract_json_from_response(response: &str) -> String {
    let trimmed = response.trim();

    if let Some(fenced) = fenced_block(trimmed, Some("json")).or_else(|| fenced_block(trimmed, None)) {
        let fenced = fenced.trim();
        if fenced.starts_with('{') || fenced.starts_with('[') {
            return fenced.to_string();
        }
    }

    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return trimmed.to_string();
    }

    balanced_json(trimmed).map_or_else(|| trimmed.to_string(), str::to_string)
}

/// Strip a surrounding Markdown code fence, keeping only the code inside.
///
/// Text without a fence is returned trimmed.
pub fn strip_code_fences(response: &str) -> String {
    let trimmed = response.trim();
    fenced_block(trimmed, None).map_or_else(|| trimmed.to_string(), |code| code.trim().to_string())
}

/// Content of the first fenced block. With `language`, only a fence opened
/// with that info string matches.
fn fenced_block<'a>(text: &'a str, language: Option<&str>) -> Option<&'a str> {
    let open = match language {
        Some(lang) => {
            let marker = format!("```{lang}");
            text.find(&marker)?
        }
        None => text.find("```")?,
    };
    let after_ticks = &text[open + 3..];
    // Skip the info string up to the end of the opening line.
    let content_start = after_ticks.find('\n').map_or(after_ticks.len(), |i| i + 1);
    let content = &after_ticks[content_start..];
    let close = content.find("```").unwrap_or(content.len());
    Some(&content[..close])
}

/// First balanced `{...}` or `[...]` span, respecting string literals.
fn balanced_json(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}
