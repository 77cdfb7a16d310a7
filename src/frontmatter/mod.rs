//! A restricted YAML subset parser for ticket frontmatter.
//!
//! Accepts: a top-level scalar (string, int, bool), a list of strings
//! (inline `[a, b]` or block `- item`), and a one-level object of scalars.
//! Rejects: anchors, aliases, tags, flow mappings, block scalars, floats,
//! nulls, multiline strings, and comments (`#` at the start of a line).
//!
//! This is deliberately not a general YAML parser — tickets only ever need
//! this much, and a restricted grammar is what lets the error behavior stay
//! deterministic (every rejection names a line number and a short cause).

mod value;

pub use value::{Scalar, Value};

use std::collections::BTreeMap;

use crate::error::{Result, TkError};

/// Default line limit: bounds worst-case scanning when a closing delimiter
/// never appears.
pub const DEFAULT_MAX_LINES: usize = 200;

#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Bound on the number of lines scanned looking for `---`/`---`.
    pub max_lines: usize,
    /// Require the opening and closing `---` delimiters. When false, the
    /// entire payload is treated as frontmatter and there is no tail.
    pub require_delimiters: bool,
    /// Strip leading blank lines from the tail after the closing delimiter.
    pub strip_leading_blank_tail: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            max_lines: DEFAULT_MAX_LINES,
            require_delimiters: true,
            strip_leading_blank_tail: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    pub frontmatter: BTreeMap<String, Value>,
    pub tail: String,
}

/// Parse a ticket's raw content into its frontmatter map and body tail.
pub fn parse_document(input: &str, opts: &ParseOptions) -> Result<ParsedDocument> {
    let normalized = input.replace("\r\n", "\n");
    let lines: Vec<&str> = normalized.split('\n').collect();

    let (frontmatter_lines, line_offset, tail) = if opts.require_delimiters {
        if lines.first().copied() != Some("---") {
            return Err(TkError::NoFrontmatter);
        }

        let mut closing_idx = None;
        let scan_limit = (opts.max_lines + 1).min(lines.len());
        for (i, line) in lines.iter().enumerate().take(scan_limit).skip(1) {
            if *line == "---" {
                closing_idx = Some(i);
                break;
            }
        }

        let closing_idx = closing_idx.ok_or(TkError::UnclosedFrontmatter(1))?;

        let mut tail_lines = &lines[closing_idx + 1..];
        if opts.strip_leading_blank_tail {
            while tail_lines.first().is_some_and(|l| l.trim().is_empty()) {
                tail_lines = &tail_lines[1..];
            }
        }

        (&lines[1..closing_idx], 1usize, tail_lines.join("\n"))
    } else {
        (&lines[..], 0usize, String::new())
    };

    if frontmatter_lines.len() > opts.max_lines {
        return Err(TkError::FrontmatterTooLong(opts.max_lines));
    }

    let frontmatter = parse_lines(frontmatter_lines, line_offset)?;
    Ok(ParsedDocument { frontmatter, tail })
}

#[derive(Debug, PartialEq)]
enum BlockKind {
    List,
    Object,
}

struct PendingBlock {
    key: String,
    indent: Option<usize>,
    kind: Option<BlockKind>,
    list_items: Vec<String>,
    object_items: BTreeMap<String, Scalar>,
}

fn parse_lines(lines: &[&str], line_offset: usize) -> Result<BTreeMap<String, Value>> {
    let mut map = BTreeMap::new();
    let mut pending: Option<PendingBlock> = None;

    let finalize = |pending: PendingBlock, map: &mut BTreeMap<String, Value>| {
        let value = match pending.kind {
            Some(BlockKind::Object) => Value::Object(pending.object_items),
            _ => Value::List(pending.list_items),
        };
        map.insert(pending.key, value);
    };

    for (idx, raw_line) in lines.iter().enumerate() {
        let line_no = line_offset + idx + 1;

        if raw_line.trim().is_empty() {
            continue;
        }

        if raw_line.starts_with('#') {
            return Err(TkError::ParseError(
                line_no,
                "comment lines are not supported".to_string(),
            ));
        }

        let indent = leading_indent(raw_line, line_no)?;

        if indent == 0 {
            if let Some(p) = pending.take() {
                finalize(p, &mut map);
            }

            let (key, rest) = split_key_value(raw_line, line_no)?;
            if map.contains_key(&key) {
                return Err(TkError::ParseError(
                    line_no,
                    format!("duplicate key '{key}'"),
                ));
            }

            match rest {
                Some(value_str) => {
                    let value = parse_scalar_or_list(value_str, line_no)?;
                    map.insert(key, value);
                }
                None => {
                    pending = Some(PendingBlock {
                        key,
                        indent: None,
                        kind: None,
                        list_items: Vec::new(),
                        object_items: BTreeMap::new(),
                    });
                }
            }
        } else {
            let Some(block) = pending.as_mut() else {
                return Err(TkError::ParseError(
                    line_no,
                    "indented continuation without a preceding key with an empty value"
                        .to_string(),
                ));
            };

            match block.indent {
                None => block.indent = Some(indent),
                Some(expected) if expected != indent => {
                    return Err(TkError::ParseError(
                        line_no,
                        "inconsistent indentation in list/object block".to_string(),
                    ));
                }
                _ => {}
            }

            let content = &raw_line[indent..];
            if content == "-" || content.starts_with("- ") {
                if block.kind == Some(BlockKind::Object) {
                    return Err(TkError::ParseError(
                        line_no,
                        "mixed list and object entries in the same block".to_string(),
                    ));
                }
                block.kind = Some(BlockKind::List);
                let item_str = if content == "-" { "" } else { &content[2..] };
                block.list_items.push(parse_list_item(item_str, line_no)?);
            } else {
                if block.kind == Some(BlockKind::List) {
                    return Err(TkError::ParseError(
                        line_no,
                        "mixed list and object entries in the same block".to_string(),
                    ));
                }
                block.kind = Some(BlockKind::Object);
                let (subkey, sub_rest) = split_key_value(content, line_no)?;
                let Some(sub_value_str) = sub_rest else {
                    return Err(TkError::ParseError(
                        line_no,
                        "objects are only supported one level deep".to_string(),
                    ));
                };
                if block.object_items.contains_key(&subkey) {
                    return Err(TkError::ParseError(
                        line_no,
                        format!("duplicate key '{subkey}'"),
                    ));
                }
                let scalar = match parse_scalar_or_list(sub_value_str, line_no)? {
                    Value::Scalar(s) => s,
                    _ => {
                        return Err(TkError::ParseError(
                            line_no,
                            "object values must be scalars".to_string(),
                        ));
                    }
                };
                block.object_items.insert(subkey, scalar);
            }
        }
    }

    if let Some(p) = pending.take() {
        finalize(p, &mut map);
    }

    Ok(map)
}

fn leading_indent(line: &str, line_no: usize) -> Result<usize> {
    let stripped = line.trim_start_matches(' ');
    let indent = line.len() - stripped.len();
    if stripped.starts_with('\t') || line[..indent].contains('\t') {
        return Err(TkError::ParseError(
            line_no,
            "tabs are not permitted for indentation".to_string(),
        ));
    }
    Ok(indent)
}

/// Split a `key: value` / `key:` line. Returns `(key, None)` when the value
/// is empty (a pending block) and `(key, Some(value))` otherwise.
fn split_key_value(line: &str, line_no: usize) -> Result<(String, Option<&str>)> {
    let Some(colon) = find_key_colon(line) else {
        return Err(TkError::ParseError(
            line_no,
            "expected 'key: value'".to_string(),
        ));
    };

    let key = &line[..colon];
    if key.is_empty()
        || !key
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        || !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(TkError::ParseError(
            line_no,
            format!("invalid key '{key}'"),
        ));
    }

    let rest = &line[colon + 1..];
    if rest.is_empty() {
        return Ok((key.to_string(), None));
    }
    if !rest.starts_with(' ') {
        return Err(TkError::ParseError(
            line_no,
            "expected a space after ':'".to_string(),
        ));
    }
    let value_str = rest.trim();
    if value_str.is_empty() {
        Ok((key.to_string(), None))
    } else {
        Ok((key.to_string(), Some(value_str)))
    }
}

/// Find the colon that separates a key from its value, ignoring colons that
/// appear inside a quoted value (there are none before the key itself, but
/// this keeps the scan honest for keys like `external-ref`).
fn find_key_colon(line: &str) -> Option<usize> {
    line.find(':')
}

fn parse_scalar_or_list(s: &str, line_no: usize) -> Result<Value> {
    if let Some(inner) = s.strip_prefix('[') {
        let Some(inner) = inner.strip_suffix(']') else {
            return Err(TkError::ParseError(
                line_no,
                "unterminated inline list".to_string(),
            ));
        };
        if inner.trim().is_empty() {
            return Ok(Value::List(Vec::new()));
        }
        let mut items = Vec::new();
        for token in split_inline_list(inner) {
            items.push(parse_list_item(token.trim(), line_no)?);
        }
        return Ok(Value::List(items));
    }

    reject_unsupported_markers(s, line_no)?;
    Ok(Value::Scalar(parse_scalar_token(s, line_no)?))
}

fn reject_unsupported_markers(s: &str, line_no: usize) -> Result<()> {
    let cause = if s.starts_with('{') {
        Some("flow mappings are not supported")
    } else if s.starts_with('&') {
        Some("anchors are not supported")
    } else if s.starts_with('*') {
        Some("aliases are not supported")
    } else if s.starts_with('!') {
        Some("tags are not supported")
    } else if s.starts_with('|') || s.starts_with('>') {
        Some("block scalars are not supported")
    } else {
        None
    };

    match cause {
        Some(cause) => Err(TkError::ParseError(line_no, cause.to_string())),
        None => Ok(()),
    }
}

fn parse_list_item(s: &str, line_no: usize) -> Result<String> {
    reject_unsupported_markers(s, line_no)?;
    if let Some(rest) = s.strip_prefix('"') {
        return unquote_double(rest, line_no);
    }
    if let Some(rest) = s.strip_prefix('\'') {
        return unquote_single(rest, line_no);
    }
    Ok(s.to_string())
}

fn parse_scalar_token(s: &str, line_no: usize) -> Result<Scalar> {
    if let Some(rest) = s.strip_prefix('"') {
        return Ok(Scalar::Str(unquote_double(rest, line_no)?));
    }
    if let Some(rest) = s.strip_prefix('\'') {
        return Ok(Scalar::Str(unquote_single(rest, line_no)?));
    }

    match s {
        "true" => return Ok(Scalar::Bool(true)),
        "false" => return Ok(Scalar::Bool(false)),
        "null" | "~" => {
            return Err(TkError::ParseError(
                line_no,
                "null values are not supported".to_string(),
            ));
        }
        _ => {}
    }

    if let Ok(n) = s.parse::<i64>() {
        return Ok(Scalar::Int(n));
    }

    if looks_like_float(s) {
        return Err(TkError::ParseError(
            line_no,
            "floating point values are not supported".to_string(),
        ));
    }

    Ok(Scalar::Str(s.to_string()))
}

fn looks_like_float(s: &str) -> bool {
    s.parse::<f64>().is_ok() && s.contains('.')
}

fn unquote_double(rest: &str, line_no: usize) -> Result<String> {
    let Some(body) = rest.strip_suffix('"') else {
        return Err(TkError::ParseError(
            line_no,
            "unterminated double-quoted string".to_string(),
        ));
    };

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some('0') => out.push('\0'),
                Some(other) => {
                    return Err(TkError::ParseError(
                        line_no,
                        format!("unsupported escape sequence '\\{other}'"),
                    ));
                }
                None => {
                    return Err(TkError::ParseError(
                        line_no,
                        "dangling escape at end of string".to_string(),
                    ));
                }
            }
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

fn unquote_single(rest: &str, line_no: usize) -> Result<String> {
    let Some(body) = rest.strip_suffix('\'') else {
        return Err(TkError::ParseError(
            line_no,
            "unterminated single-quoted string".to_string(),
        ));
    };
    // Single quotes support no escapes except a doubled quote for a literal `'`.
    Ok(body.replace("''", "'"))
}

fn split_inline_list(inner: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth_quote: Option<char> = None;
    let mut start = 0;
    let bytes = inner.as_bytes();
    for (i, ch) in inner.char_indices() {
        match depth_quote {
            Some(q) if ch == q => depth_quote = None,
            Some(_) => {}
            None if ch == '"' || ch == '\'' => depth_quote = Some(ch),
            None if ch == ',' => {
                items.push(&inner[start..i]);
                start = i + 1;
            }
            None => {}
        }
        let _ = bytes;
    }
    items.push(&inner[start..]);
    items
}
