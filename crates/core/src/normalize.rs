//! Agent response normalization.
//!
//! The drafting pipeline returns loosely structured text: sometimes a JSON
//! object, sometimes a Python-literal dict, sometimes wrapped in a markdown
//! code fence, sometimes raw prose full of escaped whitespace. This module
//! coerces any of those shapes into clean displayable text.
//!
//! The normalizer is an ordered chain of pure parsers. Each step returns
//! `Option` and the chain takes the first confident result; nothing in here
//! ever fails outward. Unparseable input falls through to a trimmed raw-text
//! fallback.

use serde_json::Value;

/// Shown whenever the pipeline produced no output at all.
pub const NO_RESPONSE_PLACEHOLDER: &str = "⚠️ No response from agent.";

const DRAFT_LABEL: &str = "sale_deed_draft:";

/// Collapses an arbitrary agent response into a single display string.
///
/// Resolution order: placeholder for absent input, fence stripping, strict
/// JSON parse, loose literal parse, escape decoding, label stripping, and a
/// final cosmetic polish over whatever text remains. A parsed mapping that
/// carries a `response` key collapses to that value alone.
pub fn flatten_response(raw: Option<&str>) -> String {
    let Some(text) = non_blank(raw) else {
        return NO_RESPONSE_PLACEHOLDER.to_string();
    };

    let text = strip_code_fence(text);

    if let Some(parsed) = parse_strict(&text).or_else(|| parse_loose(&text)) {
        return render_mapping(&parsed);
    }

    let mut text = text.into_owned();
    if let Some(decoded) = decode_escapes(&text) {
        text = decoded;
    }
    if let Some(unlabeled) = strip_draft_label(&text) {
        text = unlabeled;
    }

    polish(&text)
}

/// Splits an arbitrary agent response into an ordered list of messages.
///
/// On a successful mapping parse every top-level value becomes its own
/// message; otherwise the whole trimmed response is the single message.
pub fn split_responses(raw: Option<&str>) -> Vec<String> {
    let Some(text) = non_blank(raw) else {
        return vec![NO_RESPONSE_PLACEHOLDER.to_string()];
    };

    let text = strip_code_fence(text);

    if let Some(parsed) = parse_strict(&text).or_else(|| parse_loose(&text)) {
        return parsed
            .iter()
            .map(|(_, value)| match value {
                Value::String(s) => s.trim().to_string(),
                other => flatten_value(other),
            })
            .collect();
    }

    vec![text.trim().to_string()]
}

/// Best-effort structured parse of one response: fence stripping plus the
/// strict and loose mapping parsers. `None` when the text is not dict-shaped.
pub fn parse_object(raw: &str) -> Option<serde_json::Map<String, Value>> {
    let text = strip_code_fence(raw.trim());
    parse_strict(&text).or_else(|| parse_loose(&text))
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|text| !text.is_empty())
}

fn render_mapping(parsed: &serde_json::Map<String, Value>) -> String {
    match parsed.get("response") {
        Some(Value::String(reply)) => reply.clone(),
        Some(other) => flatten_value(other),
        None => flatten_value(&Value::Object(parsed.clone())),
    }
}

/// Removes a leading ``` or ```json fence and its closing marker.
fn strip_code_fence(text: &str) -> std::borrow::Cow<'_, str> {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return std::borrow::Cow::Borrowed(trimmed);
    };

    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_prefix('\n').unwrap_or(rest);
    let rest = rest.trim_end();
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    let rest = rest.strip_suffix('\n').unwrap_or(rest);
    std::borrow::Cow::Owned(rest.to_string())
}

fn parse_strict(text: &str) -> Option<serde_json::Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Tolerant parse of Python-literal dict text: single-quoted strings and
/// `True`/`False`/`None` keywords are rewritten to JSON, then parsed
/// strictly. Anything that still fails to parse is rejected.
fn parse_loose(text: &str) -> Option<serde_json::Map<String, Value>> {
    let rewritten = python_literal_to_json(text)?;
    parse_strict(&rewritten)
}

fn python_literal_to_json(input: &str) -> Option<String> {
    let mut output = String::with_capacity(input.len() + 8);
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\'' | '"' => {
                let quote = ch;
                output.push('"');
                loop {
                    match chars.next() {
                        Some('\\') => {
                            let escaped = chars.next()?;
                            match escaped {
                                // \' has no meaning in JSON strings
                                '\'' => output.push('\''),
                                '"' => output.push_str("\\\""),
                                other => {
                                    output.push('\\');
                                    output.push(other);
                                }
                            }
                        }
                        Some(c) if c == quote => break,
                        Some('"') => output.push_str("\\\""),
                        Some(c) => output.push(c),
                        None => return None,
                    }
                }
                output.push('"');
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::new();
                word.push(c);
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match word.as_str() {
                    "True" => output.push_str("true"),
                    "False" => output.push_str("false"),
                    "None" => output.push_str("null"),
                    _ => output.push_str(&word),
                }
            }
            c => output.push(c),
        }
    }

    Some(output)
}

/// Flattens a parsed value into display lines: each mapping key becomes a
/// header line followed by its value's lines one indent level deeper;
/// sequence elements are flattened without a header of their own.
pub fn flatten_value(value: &Value) -> String {
    let mut lines = Vec::new();
    flatten_into(value, 0, &mut lines);
    lines.join("\n")
}

fn flatten_into(value: &Value, indent: usize, lines: &mut Vec<String>) {
    let prefix = "  ".repeat(indent);
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                lines.push(format!("{prefix}{key}:"));
                flatten_into(nested, indent + 1, lines);
            }
        }
        Value::Array(items) => {
            for item in items {
                flatten_into(item, indent + 1, lines);
            }
        }
        Value::String(text) => lines.push(format!("{prefix}{text}")),
        other => lines.push(format!("{prefix}{other}")),
    }
}

/// Decodes backslash escape sequences (`\n`, `\t`, `\r`, `\uXXXX`, quotes)
/// into literal characters. Returns `None` when there is nothing to decode
/// or a `\u` sequence is malformed, in which case callers keep the original.
fn decode_escapes(input: &str) -> Option<String> {
    if !input.contains('\\') {
        return None;
    }

    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            output.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => output.push('\n'),
            Some('t') => output.push('\t'),
            Some('r') => output.push('\r'),
            Some('\\') => output.push('\\'),
            Some('\'') => output.push('\''),
            Some('"') => output.push('"'),
            Some('u') => {
                let code: String = chars.by_ref().take(4).collect();
                if code.len() != 4 {
                    return None;
                }
                let decoded =
                    u32::from_str_radix(&code, 16).ok().and_then(char::from_u32)?;
                output.push(decoded);
            }
            Some(other) => {
                output.push('\\');
                output.push(other);
            }
            None => output.push('\\'),
        }
    }

    Some(output)
}

fn strip_draft_label(text: &str) -> Option<String> {
    let lowered = text.to_lowercase();
    if !lowered.starts_with(DRAFT_LABEL) {
        return None;
    }
    text.split_once(':').map(|(_, rest)| rest.trim().to_string())
}

/// Cosmetic cleanup over raw prose. Idempotent: polishing already-clean text
/// yields the same text.
pub fn polish(text: &str) -> String {
    let literal = text.replace("\\n", "\n").replace("\\t", "\t");
    let no_backslashes: String = literal.chars().filter(|&c| c != '\\').collect();

    let mut spaced = String::with_capacity(no_backslashes.len());
    let mut previous_space = false;
    for c in no_backslashes.chars() {
        if c == ' ' {
            if previous_space {
                continue;
            }
            previous_space = true;
        } else {
            previous_space = false;
        }
        spaced.push(c);
    }

    let mut punctuated = String::with_capacity(spaced.len() + 8);
    let mut chars = spaced.chars().peekable();
    while let Some(c) = chars.next() {
        punctuated.push(c);
        if matches!(c, '.' | ',') {
            if let Some(&next) = chars.peek() {
                if !next.is_whitespace() {
                    punctuated.push(' ');
                }
            }
        }
    }

    let mut collapsed = String::with_capacity(punctuated.len());
    let mut newline_run = 0usize;
    for c in punctuated.chars() {
        if c == '\n' {
            newline_run += 1;
            continue;
        }
        if newline_run > 0 {
            collapsed.push_str(if newline_run >= 3 { "\n\n" } else { &"\n\n"[..newline_run] });
            newline_run = 0;
        }
        collapsed.push(c);
    }
    if newline_run > 0 {
        collapsed.push_str(if newline_run >= 3 { "\n\n" } else { &"\n\n"[..newline_run] });
    }

    collapsed.trim().to_string()
}
