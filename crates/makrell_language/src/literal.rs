//! Literal values and the suffix table.
//!
//! String and number nodes carry their literal text plus an optional
//! bare-word suffix. The suffix selects how the text becomes a value:
//!
//! | suffix | applies to | result |
//! |---|---|---|
//! | `k` `M` `G` `T` `P` `E` | numbers | ×10^3 … ×10^18 |
//! | `pi` `tau` `e` | numbers | multiple of the constant |
//! | `deg` | numbers | degrees to radians |
//! | `i` | numbers | imaginary |
//! | `hex` `oct` `bin` | strings | integer in that radix |
//! | `dt` | strings | ISO date/time |
//! | `regex` | strings | regular expression |

use std::f64::consts::{E, PI, TAU};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use makrell_foundation::{Error, ErrorKind, Result};

use crate::node::{Node, NodeKind};

/// A literal value.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    /// An integer.
    Int(i64),
    /// A floating-point number.
    Float(f64),
    /// A complex number.
    Complex(f64, f64),
    /// A string.
    Str(String),
    /// A date and time.
    DateTime(NaiveDateTime),
    /// A regular expression pattern, already validated.
    Regex(String),
}

fn invalid(text: &str, suffix: &str) -> Error {
    Error::new(ErrorKind::InvalidLiteral {
        text: text.to_string(),
        suffix: suffix.to_string(),
    })
}

fn magnitude(suffix: &str) -> Option<u32> {
    Some(match suffix {
        "k" => 3,
        "M" => 6,
        "G" => 9,
        "T" => 12,
        "P" => 15,
        "E" => 18,
        _ => return None,
    })
}

/// Converts numeric literal text and suffix into a value.
///
/// # Errors
/// Fails on an unknown suffix or unparsable text.
#[allow(clippy::cast_precision_loss)]
pub fn number_value(text: &str, suffix: &str) -> Result<Literal> {
    let is_integer = !text.contains(['.', 'e', 'E']);
    if is_integer {
        if let Ok(n) = text.parse::<i64>() {
            if suffix.is_empty() {
                return Ok(Literal::Int(n));
            }
            if let Some(exp) = magnitude(suffix) {
                if let Some(scaled) = n.checked_mul(10_i64.pow(exp)) {
                    return Ok(Literal::Int(scaled));
                }
            }
        }
    }
    let value: f64 = text.parse().map_err(|_| invalid(text, suffix))?;
    let result = match suffix {
        "" => value,
        "i" => return Ok(Literal::Complex(0.0, value)),
        "e" => value * E,
        "pi" => value * PI,
        "tau" => value * TAU,
        "deg" => value * PI / 180.0,
        s => match magnitude(s) {
            Some(exp) => value * 10f64.powi(i32::try_from(exp).unwrap_or(0)),
            None => return Err(invalid(text, suffix)),
        },
    };
    Ok(Literal::Float(result))
}

/// Converts string literal text (including quotes) and suffix into a value.
///
/// Unrecognized suffixes yield the plain string.
///
/// # Errors
/// Fails when the text is invalid for a radix, date/time or regex suffix.
pub fn string_value(text: &str, suffix: &str) -> Result<Literal> {
    let inner = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text);
    let radix = match suffix {
        "hex" => Some(16),
        "oct" => Some(8),
        "bin" => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        let digits = inner.replace('_', "");
        return i64::from_str_radix(&digits, radix)
            .map(Literal::Int)
            .map_err(|_| invalid(text, suffix));
    }
    match suffix {
        "dt" => parse_datetime(inner)
            .map(Literal::DateTime)
            .ok_or_else(|| invalid(text, suffix)),
        "regex" => regex::Regex::new(inner)
            .map(|_| Literal::Regex(inner.to_string()))
            .map_err(|_| invalid(text, suffix)),
        _ => Ok(Literal::Str(unescape(inner))),
    }
}

/// Converts a string or number node into its value.
///
/// # Errors
/// Fails for other node kinds and for invalid literal text.
pub fn literal_value(node: &Node) -> Result<Literal> {
    match &node.kind {
        NodeKind::String { value, suffix } => string_value(value, suffix),
        NodeKind::Number { value, suffix } => number_value(value, suffix),
        _ => Err(Error::syntax(format!("not a literal: {node}"))),
    }
    .map_err(|e| e.at(node.span))
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.naive_local())
        })
}

/// Resolves backslash escapes in string literal contents.
#[must_use]
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(c @ ('\\' | '"' | '\'')) => out.push(c),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Escapes a string so it can sit between double quotes in source.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}
