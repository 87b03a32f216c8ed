//! Value Codec Module
//!
//! Encodes cache entries into self-describing text snippets and decodes them.
//!
//! # Snippet Format
//! ```text
//! # fscache snippet
//! # key: ["users", "42"]
//! # type: map
//! # expires: 2026-10-16T12:00:00.000000000Z
//! expiration 1792152000 0
//! value {}
//! # child "name": text
//! value["name"] = "a"
//! loaded 1f2e3d4c5b6a7988
//! ```
//!
//! Lines starting with `#` are annotations and never affect decoding. The
//! trailing `loaded` line carries the xxh64 of every preceding byte; a snippet
//! without a valid trailer is treated as absent. Expirations are stored as
//! Unix seconds plus subsecond nanoseconds so every `DateTime<Utc>` fits.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;
use xxhash_rust::xxh64::xxh64;

use crate::cache::{CacheEntry, Value};
use crate::error::{CacheError, Result};

/// Terminal statement proving the snippet was written completely.
const LOADED_MARKER: &str = "loaded ";

/// Deepest array/object nesting accepted on the structural channel.
///
/// serde_json refuses to parse past 127 levels, so anything deeper could be
/// written but never read back.
const MAX_STRUCTURE_DEPTH: usize = 100;

// == Encode ==
/// Renders a value and its expiration as a snippet.
///
/// `key` only feeds the annotation header.
pub fn encode<S: AsRef<str>>(
    key: &[S],
    value: &Value,
    expiration: Option<DateTime<Utc>>,
) -> Result<String> {
    let segments: Vec<&str> = key.iter().map(AsRef::as_ref).collect();

    let mut out = String::from("# fscache snippet\n");
    out.push_str(&format!("# key: {:?}\n", segments));
    out.push_str(&format!("# type: {}\n", value.type_name()));

    if let Some(expiration) = expiration {
        out.push_str(&format!(
            "# expires: {}\n",
            expiration.to_rfc3339_opts(SecondsFormat::Nanos, true)
        ));
        out.push_str(&format!(
            "expiration {} {}\n",
            expiration.timestamp(),
            expiration.timestamp_subsec_nanos()
        ));
    }

    match value {
        Value::Map(children) => {
            out.push_str("value {}\n");
            for (child_key, child) in children {
                let quoted = quote(child_key);
                out.push_str(&format!("# child {}: {}\n", quoted, child.type_name()));
                out.push_str(&format!("value[{}] = {}\n", quoted, encode_token(child)?));
            }
        }
        value => out.push_str(&format!("value = {}\n", encode_token(value)?)),
    }

    let checksum = xxh64(out.as_bytes(), 0);
    out.push_str(&format!("{}{:016x}\n", LOADED_MARKER, checksum));
    Ok(out)
}

/// Picks the representation channel for a single value.
fn encode_token(value: &Value) -> Result<String> {
    let token = match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Map(_) | Value::Object(_) => {
            if contains_non_finite(value) {
                return Err(CacheError::Codec(
                    "non-finite float inside a structured value".to_string(),
                ));
            }
            let tree =
                serde_json::to_value(value).map_err(|e| CacheError::Codec(e.to_string()))?;
            let depth = json_depth(&tree);
            if depth > MAX_STRUCTURE_DEPTH {
                return Err(CacheError::Codec(format!(
                    "structured value nested {} levels deep, limit is {}",
                    depth, MAX_STRUCTURE_DEPTH
                )));
            }
            let bytes = serde_json::to_vec(&tree).map_err(|e| CacheError::Codec(e.to_string()))?;
            format!("object({})", BASE64.encode(bytes))
        }
        Value::Text(s) => quote(s),
        Value::Int(i) => i.to_string(),
        Value::Float(f) if f.is_finite() => format!("{:?}", f),
        Value::Float(f) => format!("f64bits({:016x})", f.to_bits()),
        Value::Binary(bytes) => format!("bytes({})", BASE64.encode(bytes)),
    };
    Ok(token)
}

fn contains_non_finite(value: &Value) -> bool {
    match value {
        Value::Float(f) => !f.is_finite(),
        Value::Map(children) => children.values().any(contains_non_finite),
        _ => false,
    }
}

/// Array/object nesting of a serialized tree; scalars are depth zero.
fn json_depth(tree: &serde_json::Value) -> usize {
    match tree {
        serde_json::Value::Array(items) => 1 + items.iter().map(json_depth).max().unwrap_or(0),
        serde_json::Value::Object(fields) => {
            1 + fields.values().map(json_depth).max().unwrap_or(0)
        }
        _ => 0,
    }
}

// == Decode ==
/// Loads the snippet at `path`.
///
/// Missing files, foreign files and partial writes all yield `None`.
pub fn decode(path: &Path) -> Option<CacheEntry> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return None,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "unreadable snippet");
            return None;
        }
    };

    let Ok(snippet) = String::from_utf8(bytes) else {
        debug!(path = %path.display(), "snippet is not valid UTF-8");
        return None;
    };

    decode_str(&snippet)
}

/// Decodes snippet text already in memory.
pub fn decode_str(snippet: &str) -> Option<CacheEntry> {
    let body = verify_trailer(snippet)?;
    match parse_body(body) {
        Ok(entry) => Some(entry),
        Err(reason) => {
            debug!(%reason, "malformed snippet");
            None
        }
    }
}

/// Returns the body preceding a valid `loaded` trailer.
fn verify_trailer(snippet: &str) -> Option<&str> {
    let content = snippet.strip_suffix('\n')?;
    let split = content.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let (body, trailer) = content.split_at(split);

    let hex = trailer.strip_prefix(LOADED_MARKER)?;
    if hex.len() != 16 {
        return None;
    }
    let stored = u64::from_str_radix(hex, 16).ok()?;

    if xxh64(body.as_bytes(), 0) != stored {
        debug!("snippet checksum mismatch");
        return None;
    }
    Some(body)
}

fn parse_body(body: &str) -> std::result::Result<CacheEntry, String> {
    let mut value: Option<Value> = None;
    let mut expiration: Option<DateTime<Utc>> = None;

    for line in body.split('\n') {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(rest) = line.strip_prefix("expiration ") {
            expiration = Some(parse_expiration(rest)?);
        } else if line == "value {}" {
            value = Some(Value::Map(BTreeMap::new()));
        } else if let Some(rest) = line.strip_prefix("value = ") {
            value = Some(parse_token(rest)?);
        } else if let Some(rest) = line.strip_prefix("value[") {
            let (child_key, rest) = parse_quoted(rest)?;
            let rest = rest
                .strip_prefix("] = ")
                .ok_or_else(|| format!("bad child assignment {:?}", line))?;
            let child = parse_token(rest)?;

            match value.as_mut() {
                Some(Value::Map(children)) => {
                    children.insert(child_key, child);
                }
                _ => return Err("child assignment before container".to_string()),
            }
        } else {
            return Err(format!("unrecognized statement {:?}", line));
        }
    }

    Ok(CacheEntry::new(value.unwrap_or(Value::Null), expiration))
}

/// Parses `<unix seconds> <subsecond nanos>`.
fn parse_expiration(rest: &str) -> std::result::Result<DateTime<Utc>, String> {
    let (secs, nanos) = rest
        .split_once(' ')
        .ok_or_else(|| format!("bad expiration {:?}", rest))?;
    let secs = secs.parse::<i64>().map_err(|e| e.to_string())?;
    let nanos = nanos.parse::<u32>().map_err(|e| e.to_string())?;
    DateTime::from_timestamp(secs, nanos)
        .ok_or_else(|| format!("expiration out of range {:?}", rest))
}

/// Parses a token that must span the whole input.
fn parse_token(token: &str) -> std::result::Result<Value, String> {
    match token {
        "null" => return Ok(Value::Null),
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        _ => {}
    }

    if token.starts_with('"') {
        let (text, rest) = parse_quoted(token)?;
        if !rest.is_empty() {
            return Err(format!("trailing data after string: {:?}", rest));
        }
        return Ok(Value::Text(text));
    }

    if let Some(payload) = wrapped(token, "bytes(") {
        let bytes = BASE64.decode(payload).map_err(|e| e.to_string())?;
        return Ok(Value::Binary(bytes));
    }

    if let Some(payload) = wrapped(token, "object(") {
        let bytes = BASE64.decode(payload).map_err(|e| e.to_string())?;
        return serde_json::from_slice(&bytes).map_err(|e| e.to_string());
    }

    if let Some(payload) = wrapped(token, "f64bits(") {
        let bits = u64::from_str_radix(payload, 16).map_err(|e| e.to_string())?;
        return Ok(Value::Float(f64::from_bits(bits)));
    }

    if token.contains(['.', 'e', 'E']) {
        token
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| format!("bad float {:?}: {}", token, e))
    } else {
        token
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| format!("bad integer {:?}: {}", token, e))
    }
}

fn wrapped<'a>(token: &'a str, prefix: &str) -> Option<&'a str> {
    token.strip_prefix(prefix)?.strip_suffix(')')
}

// == Quoting ==
/// Renders `s` as a double-quoted literal with control characters escaped.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c if c.is_control() => out.push_str(&format!("\\u{{{:x}}}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Parses a leading quoted literal, returning it and the remaining input.
fn parse_quoted(input: &str) -> std::result::Result<(String, &str), String> {
    let body = input
        .strip_prefix('"')
        .ok_or_else(|| format!("expected string literal at {:?}", input))?;

    let mut out = String::new();
    let mut chars = body.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((out, &body[i + 1..])),
            '\\' => {
                let (_, escaped) = chars.next().ok_or("dangling escape")?;
                match escaped {
                    '\\' => out.push('\\'),
                    '"' => out.push('"'),
                    'n' => out.push('\n'),
                    'r' => out.push('\r'),
                    't' => out.push('\t'),
                    '0' => out.push('\0'),
                    'u' => {
                        if chars.next().map(|(_, c)| c) != Some('{') {
                            return Err("expected '{' after \\u".to_string());
                        }
                        let mut hex = String::new();
                        loop {
                            match chars.next() {
                                Some((_, '}')) => break,
                                Some((_, h)) => hex.push(h),
                                None => return Err("unterminated \\u escape".to_string()),
                            }
                        }
                        let code = u32::from_str_radix(&hex, 16).map_err(|e| e.to_string())?;
                        out.push(char::from_u32(code).ok_or("invalid code point")?);
                    }
                    other => return Err(format!("unknown escape \\{}", other)),
                }
            }
            c => out.push(c),
        }
    }
    Err("unterminated string literal".to_string())
}
