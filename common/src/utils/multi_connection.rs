//! Multi-connection blob parsing.
//!
//! A blob is either a flat JSON object (`{"Label": "connection string"}`) or
//! free text with one connection per line, optionally prefixed `Label:`.
//!
//! The label heuristic is line-local: a connection string that itself has a
//! `:` before its first `=` (a URL, for instance) is read as a labelled line.

use serde_json::{Map, Value};

use crate::models::RawConnectionEntry;
use crate::utils::connection_string::strip_quotes;

/// Prefix of labels synthesized for unlabelled lines.
const LINE_LABEL_PREFIX: &str = "DB_";

/// Splits a blob into `(label, raw connection string)` entries in input order.
///
/// JSON object mode wins when the trimmed input is braced and parses; any
/// JSON failure silently falls back to line mode.
pub fn parse_multiple_connections(input: &str) -> Vec<RawConnectionEntry> {
    let trimmed = input.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        match parse_json_object(trimmed) {
            Some(entries) => return entries,
            None => tracing::debug!("Multi-connection input is not a flat JSON object, parsing line by line"),
        }
    }
    parse_lines(input)
}

/// Property order is preserved; null and empty values are skipped. Any
/// non-string value rejects the whole object.
fn parse_json_object(input: &str) -> Option<Vec<RawConnectionEntry>> {
    let object: Map<String, Value> = serde_json::from_str(input).ok()?;
    let mut entries = Vec::with_capacity(object.len());
    for (label, value) in object {
        match value {
            Value::String(raw) if !raw.is_empty() => {
                entries.push(RawConnectionEntry::new(label, raw));
            }
            Value::String(_) | Value::Null => {}
            _ => return None,
        }
    }
    Some(entries)
}

fn parse_lines(input: &str) -> Vec<RawConnectionEntry> {
    input
        .split('\n')
        .filter(|line| !line.is_empty())
        .enumerate()
        .filter_map(|(index, line)| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            Some(parse_labelled_line(line).unwrap_or_else(|| {
                RawConnectionEntry::new(
                    format!("{}{}", LINE_LABEL_PREFIX, index + 1),
                    strip_quotes(line),
                )
            }))
        })
        .collect()
}

/// `Label: value` where the label has no `=` and the value is non-empty.
fn parse_labelled_line(line: &str) -> Option<RawConnectionEntry> {
    let colon = line.find(':').filter(|&idx| idx > 0)?;
    let label = strip_quotes(line[..colon].trim());
    let value = strip_quotes(line[colon + 1..].trim());
    if label.is_empty() || label.contains('=') || value.is_empty() {
        return None;
    }
    Some(RawConnectionEntry::new(label, value))
}
