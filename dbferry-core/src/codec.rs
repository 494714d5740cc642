//! Value codec: typed scalars to SQL literal text and back.
//!
//! The literal forms are the ones SQLite reads back to the same storage class:
//! - `NULL`
//! - integers and booleans as plain decimal (`TRUE` is `1`)
//! - floats always carry a `.` or exponent so they stay REAL
//! - text single-quoted with embedded quotes doubled
//! - blobs as `X'..'` hex literals

use crate::error::DbFerryError;
use crate::models::SqlValue;
use crate::Result;

/// Literal emitted for SQL NULL.
pub const NULL_LITERAL: &str = "NULL";

/// Encodes a value as a SQL literal.
///
/// # Example
/// ```rust
/// use dbferry_core::codec::encode_value;
/// use dbferry_core::models::SqlValue;
///
/// assert_eq!(encode_value(&SqlValue::Text("it's".into())), "'it''s'");
/// assert_eq!(encode_value(&SqlValue::Blob(vec![0xde, 0xad])), "X'DEAD'");
/// assert_eq!(encode_value(&SqlValue::Float(2.0)), "2.0");
/// ```
pub fn encode_value(value: &SqlValue) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Appends the literal form of `value` to `out`.
pub fn write_value(out: &mut String, value: &SqlValue) {
    match value {
        SqlValue::Null => out.push_str(NULL_LITERAL),
        SqlValue::Integer(i) => out.push_str(&i.to_string()),
        SqlValue::Float(f) => out.push_str(&encode_float(*f)),
        SqlValue::Boolean(b) => out.push(if *b { '1' } else { '0' }),
        SqlValue::Text(s) => {
            out.reserve(s.len().saturating_add(2));
            out.push('\'');
            for c in s.chars() {
                if c == '\'' {
                    out.push('\'');
                }
                out.push(c);
            }
            out.push('\'');
        }
        SqlValue::Blob(bytes) => {
            out.push_str("X'");
            out.push_str(&hex::encode_upper(bytes));
            out.push('\'');
        }
    }
}

fn encode_float(f: f64) -> String {
    if f.is_nan() {
        // SQLite stores NaN as NULL
        return NULL_LITERAL.to_string();
    }
    if f.is_infinite() {
        // Out-of-range literals parse as +/-Inf in SQLite
        return if f > 0.0 { "9e999" } else { "-9e999" }.to_string();
    }
    // Debug keeps a trailing ".0" and switches to exponent form for very
    // large or small magnitudes, both of which SQLite parses as REAL.
    format!("{:?}", f)
}

/// Formats a tuple literal `(v1, v2, ...)` for a row.
pub fn encode_tuple(values: &[SqlValue]) -> String {
    let mut out = String::from("(");
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_value(&mut out, value);
    }
    out.push(')');
    out
}

/// Quotes an identifier with double quotes, doubling embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Decodes a single SQL literal produced by [`encode_value`].
///
/// Accepts `NULL`, `TRUE`/`FALSE`, signed integers, floats (including the
/// `9e999` infinity form), quoted text and `X'..'` blobs. Surrounding
/// whitespace is ignored.
///
/// # Errors
/// Returns a configuration error when the text is not a recognized literal.
pub fn decode_literal(literal: &str) -> Result<SqlValue> {
    let text = literal.trim();

    if text.eq_ignore_ascii_case(NULL_LITERAL) {
        return Ok(SqlValue::Null);
    }
    if text.eq_ignore_ascii_case("TRUE") {
        return Ok(SqlValue::Boolean(true));
    }
    if text.eq_ignore_ascii_case("FALSE") {
        return Ok(SqlValue::Boolean(false));
    }

    if let Some(body) = text
        .strip_prefix("X'")
        .or_else(|| text.strip_prefix("x'"))
        .and_then(|rest| rest.strip_suffix('\''))
    {
        return hex::decode(body)
            .map(SqlValue::Blob)
            .map_err(|e| DbFerryError::configuration(format!("Invalid blob literal: {}", e)));
    }

    if let Some(body) = text
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    {
        return decode_text_body(body).map(SqlValue::Text);
    }

    if let Ok(i) = text.parse::<i64>() {
        return Ok(SqlValue::Integer(i));
    }
    if let Ok(f) = text.parse::<f64>() {
        return Ok(SqlValue::Float(f));
    }

    Err(DbFerryError::configuration(format!(
        "Unrecognized SQL literal: {}",
        excerpt(text, 40)
    )))
}

fn decode_text_body(body: &str) -> Result<String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\'' {
            if chars.peek() == Some(&'\'') {
                chars.next();
            } else {
                return Err(DbFerryError::configuration(
                    "Unescaped quote inside text literal",
                ));
            }
        }
        out.push(c);
    }
    Ok(out)
}

/// Truncates `text` to at most `max_chars` characters, appending `...` when cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
