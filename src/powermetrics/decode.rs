//! Strict decoding of an untrusted request body into [`PowerMetrics`].
//!
//! Every rejection is classified precisely enough for a client to fix its
//! request. Failures that do not fit a known class become
//! [`DecodeError::Internal`]; its detail is meant for the server log only.

use serde_json::error::Category;
use thiserror::Error;

use super::{model::PowerMetrics, timestamp::PATTERN};

/// Upper bound on the request body, in bytes (1 MiB).
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

const ROOT_FIELD: &str = "(root)";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Request body must not be larger than 1MB")]
    PayloadTooLarge,

    #[error("Request body must not be empty")]
    EmptyBody,

    #[error("Request body contains unknown field \"{0}\"")]
    UnknownField(String),

    #[error("Request body is missing the \"{0}\" field")]
    MissingField(String),

    #[error("Request body contains duplicate field \"{0}\"")]
    DuplicateField(String),

    #[error("Request body contains badly-formed JSON (at position {0})")]
    MalformedSyntax(usize),

    #[error("Request body contains an invalid value for the \"{field}\" field (at position {offset})")]
    TypeMismatch { field: String, offset: usize },

    #[error("Request body contains a malformed timestamp in the \"{field}\" field (at position {offset}), expected {}", PATTERN)]
    MalformedTimestamp { field: String, offset: usize },

    #[error("Request body must only contain a single JSON object")]
    TrailingData,

    #[error("unclassified decode failure: {0}")]
    Internal(String),
}

/// Decode exactly one [`PowerMetrics`] document from `input`.
///
/// Unknown fields are rejected at every nesting level, and nothing but
/// whitespace may follow the document.
pub fn decode(input: &[u8]) -> Result<PowerMetrics, DecodeError> {
    if input.len() > MAX_BODY_BYTES {
        return Err(DecodeError::PayloadTooLarge);
    }
    if input.iter().all(|&b| is_json_whitespace(b)) {
        return Err(DecodeError::EmptyBody);
    }

    let mut de = serde_json::Deserializer::from_slice(input);
    let payload: PowerMetrics =
        serde_path_to_error::deserialize(&mut de).map_err(|e| classify(input, e))?;

    de.end().map_err(|_| DecodeError::TrailingData)?;

    Ok(payload)
}

/// JSON whitespace only; `u8::is_ascii_whitespace` also accepts form feed.
fn is_json_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

fn classify(input: &[u8], err: serde_path_to_error::Error<serde_json::Error>) -> DecodeError {
    let path = err.path().to_string();
    let inner = err.into_inner();
    let offset = byte_offset(input, inner.line(), inner.column());

    match inner.classify() {
        Category::Syntax | Category::Eof => DecodeError::MalformedSyntax(offset),
        Category::Data => {
            let message = inner.to_string();
            if let Some(name) = backquoted_after(&message, "unknown field `") {
                DecodeError::UnknownField(join_path(&path, name))
            } else if let Some(name) = backquoted_after(&message, "missing field `") {
                DecodeError::MissingField(join_path(&path, name))
            } else if let Some(name) = backquoted_after(&message, "duplicate field `") {
                DecodeError::DuplicateField(join_path(&path, name))
            } else if message.starts_with("malformed timestamp") {
                DecodeError::MalformedTimestamp {
                    field: field_name(path),
                    offset,
                }
            } else {
                DecodeError::TypeMismatch {
                    field: field_name(path),
                    offset,
                }
            }
        }
        Category::Io => DecodeError::Internal(inner.to_string()),
    }
}

/// serde_json reports positions as 1-based line plus column; convert that
/// to the number of bytes consumed when the error was raised.
fn byte_offset(input: &[u8], line: usize, column: usize) -> usize {
    let line_start: usize = input
        .split(|&b| b == b'\n')
        .take(line.saturating_sub(1))
        .map(|l| l.len() + 1)
        .sum();
    (line_start + column).min(input.len())
}

/// Extract `name` from messages shaped like ``<prefix>name`, ...``.
fn backquoted_after<'a>(message: &'a str, prefix: &str) -> Option<&'a str> {
    message.strip_prefix(prefix)?.split('`').next()
}

fn join_path(path: &str, name: &str) -> String {
    if path == "." || path.is_empty() {
        name.to_owned()
    } else if path.ends_with(name) {
        path.to_owned()
    } else {
        format!("{path}.{name}")
    }
}

fn field_name(path: String) -> String {
    if path == "." || path.is_empty() {
        ROOT_FIELD.to_owned()
    } else {
        path
    }
}
