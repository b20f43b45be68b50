// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool call payload parsing
//!
//! A payload is a JSON object whose reserved key names the tool; every other
//! key is the tool's input. Payloads cut off by the end of the stream can be
//! salvaged by closing whatever was left open.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use thiserror::Error;

/// How many cut points the salvage walk will try before giving up
const MAX_SALVAGE_CUTS: usize = 16;

/// A successfully parsed tool call payload
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedInvocation {
    /// Tool name taken from the reserved key
    pub name: String,
    /// Remaining keys of the payload
    pub input: Value,
    /// Payload text as extracted from the stream
    pub raw: String,
    /// The payload was completed by the salvage step
    pub autocompleted: bool,
}

/// A payload that could not be turned into a tool call
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvocationError {
    /// The payload is not a JSON object
    #[error("malformed tool call ({message}): {preview}")]
    ParseError {
        preview: String,
        message: String,
        autocompleted: bool,
    },

    /// The payload does not name a tool
    #[error("unknown tool: {reason}")]
    UnknownTool {
        reason: String,
        raw: String,
        autocompleted: bool,
    },
}

impl InvocationError {
    /// Stable kind name
    pub fn kind(&self) -> &'static str {
        match self {
            InvocationError::ParseError { .. } => "parse_error",
            InvocationError::UnknownTool { .. } => "unknown_tool",
        }
    }

    /// Whether the payload went through the salvage step
    pub fn autocompleted(&self) -> bool {
        match self {
            InvocationError::ParseError { autocompleted, .. }
            | InvocationError::UnknownTool { autocompleted, .. } => *autocompleted,
        }
    }
}

/// Parse a payload into a tool call.
///
/// `tool_key` names the reserved key holding the tool name; it is removed
/// from the input. `preview_chars` bounds the head and tail of the payload
/// quoted in a parse error.
pub fn parse_invocation(
    raw: &str,
    tool_key: &str,
    autocompleted: bool,
    preview_chars: usize,
) -> std::result::Result<ParsedInvocation, InvocationError> {
    let value: Value = serde_json::from_str(raw.trim()).map_err(|e| InvocationError::ParseError {
        preview: preview(raw, preview_chars),
        message: e.to_string(),
        autocompleted,
    })?;

    let Value::Object(object) = value else {
        return Err(InvocationError::ParseError {
            preview: preview(raw, preview_chars),
            message: "tool call payload is not a JSON object".to_string(),
            autocompleted,
        });
    };

    invocation_from_object(object, raw, tool_key, autocompleted)
}

/// Split an already-decoded object into tool name and input
pub fn invocation_from_object(
    mut object: Map<String, Value>,
    raw: &str,
    tool_key: &str,
    autocompleted: bool,
) -> std::result::Result<ParsedInvocation, InvocationError> {
    let name = match object.remove(tool_key) {
        Some(Value::String(name)) if !name.trim().is_empty() => name,
        Some(Value::String(_)) => {
            return Err(unknown(format!("`{}` is empty", tool_key), raw, autocompleted))
        }
        Some(other) => {
            return Err(unknown(
                format!("`{}` must be a string, got {}", tool_key, type_name(&other)),
                raw,
                autocompleted,
            ))
        }
        None => {
            return Err(unknown(
                format!("missing `{}` key", tool_key),
                raw,
                autocompleted,
            ))
        }
    };

    Ok(ParsedInvocation {
        name,
        input: Value::Object(object),
        raw: raw.to_string(),
        autocompleted,
    })
}

/// Parse a payload whose end marker never arrived.
///
/// The payload is closed by [`salvage_truncated`] and parsed with the
/// autocompleted flag set. When nothing can be salvaged the raw text is
/// parsed as-is so the caller still gets a precise error.
pub fn parse_truncated(
    raw: &str,
    tool_key: &str,
    preview_chars: usize,
) -> std::result::Result<ParsedInvocation, InvocationError> {
    match salvage_truncated(raw) {
        Some(completed) => parse_invocation(&completed, tool_key, true, preview_chars).map(
            |mut parsed| {
                parsed.raw = raw.to_string();
                parsed
            },
        ),
        None => parse_invocation(raw, tool_key, true, preview_chars),
    }
}

/// Close a JSON object that was cut off mid-stream.
///
/// Walks the payload tracking string and escape state and the stack of open
/// containers. Two candidates are tried: the payload closed where it
/// stopped (finishing an open string, dropping a dangling comma, filling a
/// dangling colon with `null`), then the payload cut back to each earlier
/// comma or opening bracket and closed there. The first candidate that
/// decodes to an object wins.
pub fn salvage_truncated(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('{') {
        return None;
    }

    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut cuts: VecDeque<(usize, Vec<char>)> = VecDeque::with_capacity(MAX_SALVAGE_CUTS);

    for (idx, ch) in trimmed.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' | '[' => {
                stack.push(if ch == '{' { '}' } else { ']' });
                remember_cut(&mut cuts, idx + 1, &stack);
            }
            '}' | ']' => {
                if stack.pop() != Some(ch) {
                    return None;
                }
                if stack.is_empty() {
                    // The object closed; whatever follows is not ours to fix.
                    let complete = &trimmed[..idx + ch.len_utf8()];
                    return is_object(complete).then(|| complete.to_string());
                }
            }
            ',' if !stack.is_empty() => remember_cut(&mut cuts, idx, &stack),
            _ => {}
        }
    }

    let mut candidate = trimmed.to_string();
    if in_string {
        if escaped {
            candidate.pop();
        }
        candidate.push('"');
    }
    close_open(&mut candidate, &stack);
    if is_object(&candidate) {
        return Some(candidate);
    }

    cuts.iter().rev().find_map(|(cut, open)| {
        let mut candidate = trimmed[..*cut].to_string();
        close_open(&mut candidate, open);
        is_object(&candidate).then_some(candidate)
    })
}

/// Keep only the newest cut points
fn remember_cut(cuts: &mut VecDeque<(usize, Vec<char>)>, cut: usize, open: &[char]) {
    if cuts.len() == MAX_SALVAGE_CUTS {
        cuts.pop_front();
    }
    cuts.push_back((cut, open.to_vec()));
}

/// Preview of a payload: the first and last `chars` characters joined by `...`
pub fn preview(raw: &str, chars: usize) -> String {
    let total = raw.chars().count();
    if total <= chars.saturating_mul(2) {
        return raw.to_string();
    }
    let head: String = raw.chars().take(chars).collect();
    let tail: String = raw.chars().skip(total - chars).collect();
    format!("{}...{}", head, tail)
}

fn close_open(candidate: &mut String, open: &[char]) {
    let kept = candidate.trim_end().len();
    candidate.truncate(kept);
    if candidate.ends_with(',') {
        candidate.pop();
    }
    if candidate.ends_with(':') {
        candidate.push_str("null");
    }
    candidate.extend(open.iter().rev());
}

fn is_object(text: &str) -> bool {
    matches!(serde_json::from_str::<Value>(text), Ok(Value::Object(_)))
}

fn unknown(reason: String, raw: &str, autocompleted: bool) -> InvocationError {
    InvocationError::UnknownTool {
        reason,
        raw: raw.to_string(),
        autocompleted,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
