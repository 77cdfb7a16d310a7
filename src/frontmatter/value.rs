//! The restricted value model the frontmatter grammar parses into: a tagged
//! union of a scalar (string, int, or bool), a list of strings, or a
//! one-level object of scalars.

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl Scalar {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Scalar::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Render back to the subset grammar this value would have parsed from.
    /// Used by property tests that assert the encoder/parser form a closed loop.
    pub fn to_yaml(&self) -> String {
        match self {
            Scalar::Str(s) => quote_if_needed(s),
            Scalar::Int(n) => n.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

/// A value bound to a top-level frontmatter key.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    List(Vec<String>),
    Object(BTreeMap<String, Scalar>),
}

impl Value {
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(Scalar::as_str)
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Quote a string if it contains characters that would otherwise change its
/// meaning when re-parsed (leading/trailing whitespace, a colon-space, a
/// leading indicator character, or it would otherwise look like a different
/// scalar kind).
fn quote_if_needed(s: &str) -> String {
    let needs_quoting = s.is_empty()
        || s != s.trim()
        || s.contains(": ")
        || s.contains('#')
        || s.starts_with(['-', '[', '{', '&', '*', '!', '|', '>', '\'', '"'])
        || s.parse::<i64>().is_ok()
        || matches!(s, "true" | "false" | "null" | "~");

    if needs_quoting {
        format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        s.to_string()
    }
}
