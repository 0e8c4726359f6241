//! Line format of staging files: MySQL `LOAD DATA` defaults.
//!
//! Fields are separated by a tab, rows end with `\n`, NULL is written as
//! `\N`, and backslash, tab, newline, carriage return and NUL inside values
//! are backslash-escaped.

use crate::db::SqlValue;

pub const FIELD_SEPARATOR: char = '\t';
pub const NULL_MARKER: &str = "\\N";

/// Escape one value for a staging file
pub fn encode_field(value: Option<&str>, out: &mut String) {
    let Some(value) = value else {
        out.push_str(NULL_MARKER);
        return;
    };
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            other => out.push(other),
        }
    }
}

/// Encode a full row, terminated by a newline
pub fn encode_row(values: &[SqlValue]) -> String {
    let mut line = String::new();
    for (idx, value) in values.iter().enumerate() {
        if idx > 0 {
            line.push(FIELD_SEPARATOR);
        }
        encode_field(value.to_text().as_deref(), &mut line);
    }
    line.push('\n');
    line
}

/// Decode one line (without its terminator) back into field values
pub fn decode_line(line: &str) -> Vec<Option<String>> {
    line.split(FIELD_SEPARATOR).map(decode_field).collect()
}

fn decode_field(raw: &str) -> Option<String> {
    if raw == NULL_MARKER {
        return None;
    }
    let mut value = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            value.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => value.push('\t'),
            Some('n') => value.push('\n'),
            Some('r') => value.push('\r'),
            Some('0') => value.push('\0'),
            Some(other) => value.push(other),
            None => value.push('\\'),
        }
    }
    Some(value)
}
