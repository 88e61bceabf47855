//! Best-effort recovery of JSON from model output.
//!
//! Models asked for "single line JSON only" still wrap answers in markdown
//! fences, add prose around the object, leave trailing commas or close the
//! object twice. [`parse_lenient`] tries a strict parse first and only then
//! applies these repairs, in order:
//!
//! 1. strip markdown code fences
//! 2. cut to the outermost object or array
//! 3. drop trailing commas outside strings
//! 4. remove a single extra closing brace at the very end

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Model output that could not be turned into JSON.
#[derive(Error, Debug)]
pub enum RepairError {
    #[error("model output is empty")]
    Empty,

    #[error("could not recover JSON from model output: {0}")]
    Unrecoverable(#[source] serde_json::Error),
}

/// Parses `text` as JSON, repairing the common ways model output is malformed.
pub fn parse_lenient(text: &str) -> Result<Value, RepairError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(RepairError::Empty);
    }

    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    let candidate = drop_trailing_commas(outermost_json(strip_code_fences(trimmed)));
    let err = match serde_json::from_str(&candidate) {
        Ok(value) => {
            debug!("recovered JSON after cleanup");
            return Ok(value);
        }
        Err(err) => err,
    };

    if let Some(stripped) = candidate.strip_suffix('}') {
        if let Ok(value) = serde_json::from_str(stripped) {
            debug!("recovered JSON by removing an extra closing brace");
            return Ok(value);
        }
    }

    Err(RepairError::Unrecoverable(err))
}

fn strip_code_fences(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (```json) along with the opening fence
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn outermost_json(text: &str) -> &str {
    let start = text.find(|c: char| c == '{' || c == '[');
    let end = text.rfind(|c: char| c == '}' || c == ']');
    match (start, end) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

fn drop_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut chars = text.char_indices().peekable();

    while let Some((index, c)) = chars.next() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            out.push(c);
            continue;
        }

        match c {
            '"' => in_string = true,
            ',' => {
                let next = text[index + 1..].trim_start().chars().next();
                if matches!(next, Some('}') | Some(']')) {
                    continue;
                }
            }
            _ => {}
        }
        out.push(c);
    }

    out
}
