//! Attribute values stored in the attribute table.
//!
//! One `meta_value` column carries three different shapes in practice:
//!
//! | Shape | Example | Variant |
//! |-------|---------|---------|
//! | single value | `7912` | [`AttributeValue::Scalar`] |
//! | comma separated list | `7912,8016` | [`AttributeValue::List`] |
//! | serialized composite | `a:2:{i:0;s:4:"7912";i:1;i:8016;}` or `[7912,8016]` | [`AttributeValue::Composite`] |
//!
//! The shape is decided once when the raw column is read; consumers call
//! [`AttributeValue::normalize`] to get a flat list regardless of shape.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::RecordId;

/// Failure to decode a serialized composite value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot decode serialized value at byte {position}: {reason}")]
pub struct AttributeDecodeError {
    pub position: usize,
    pub reason: &'static str,
}

/// A raw attribute value classified by shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    Scalar(String),
    List(Vec<String>),
    /// Still-encoded PHP `serialize()` or JSON payload.
    Composite(String),
}

impl AttributeValue {
    /// Classify a raw column value.
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        if looks_php_serialized(trimmed) || looks_json_container(trimmed) {
            Self::Composite(trimmed.to_string())
        } else if trimmed.contains(',') {
            Self::List(
                trimmed
                    .split(',')
                    .map(|item| item.trim().to_string())
                    .collect(),
            )
        } else {
            Self::Scalar(trimmed.to_string())
        }
    }

    /// Flatten the value into a list of scalar strings.
    ///
    /// Scalars become single-element lists, composites are decoded and their
    /// leaf values collected in order. Empty strings are dropped.
    pub fn normalize(&self) -> Result<Vec<String>, AttributeDecodeError> {
        let items = match self {
            Self::Scalar(value) => vec![value.clone()],
            Self::List(values) => values.clone(),
            Self::Composite(raw) if looks_json_container(raw) => decode_json(raw)?,
            Self::Composite(raw) => PhpDecoder::new(raw).decode()?,
        };
        Ok(items.into_iter().filter(|item| !item.is_empty()).collect())
    }

    /// Record identifiers referenced by this value.
    ///
    /// Non-numeric and `0` entries are dropped.
    pub fn record_ids(&self) -> Result<Vec<RecordId>, AttributeDecodeError> {
        Ok(self
            .normalize()?
            .iter()
            .filter_map(|item| RecordId::parse_loose(item))
            .collect())
    }
}

fn looks_php_serialized(value: &str) -> bool {
    if value == "N;" {
        return true;
    }
    let bytes = value.as_bytes();
    bytes.len() >= 4
        && matches!(bytes[0], b'a' | b's' | b'i' | b'd' | b'b')
        && bytes[1] == b':'
        && (value.ends_with(';') || value.ends_with('}'))
}

fn looks_json_container(value: &str) -> bool {
    (value.starts_with('[') && value.ends_with(']'))
        || (value.starts_with('{') && value.ends_with('}'))
}

fn decode_json(raw: &str) -> Result<Vec<String>, AttributeDecodeError> {
    let parsed: serde_json::Value = serde_json::from_str(raw).map_err(|e| AttributeDecodeError {
        position: e.column().saturating_sub(1),
        reason: "invalid JSON",
    })?;
    let mut out = Vec::new();
    collect_json_leaves(&parsed, &mut out);
    Ok(out)
}

fn collect_json_leaves(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) => out.push(s.clone()),
        serde_json::Value::Number(n) => out.push(n.to_string()),
        serde_json::Value::Array(items) => items.iter().for_each(|v| collect_json_leaves(v, out)),
        serde_json::Value::Object(map) => map.values().for_each(|v| collect_json_leaves(v, out)),
        serde_json::Value::Null | serde_json::Value::Bool(_) => {}
    }
}

/// Deepest array nesting accepted from a serialized value.
const MAX_PHP_DEPTH: usize = 1024;

/// Decoder for the subset of PHP `serialize()` output found in attribute rows.
///
/// Arrays are flattened and only their values are kept; nulls and booleans
/// carry no identifiers and are skipped. Objects are rejected.
struct PhpDecoder<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> PhpDecoder<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    fn decode(mut self) -> Result<Vec<String>, AttributeDecodeError> {
        let mut out = Vec::new();
        self.value(&mut out, true, 0)?;
        if self.pos != self.input.len() {
            return Err(self.error("trailing data"));
        }
        Ok(out)
    }

    fn error(&self, reason: &'static str) -> AttributeDecodeError {
        AttributeDecodeError {
            position: self.pos,
            reason,
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), AttributeDecodeError> {
        if self.input.get(self.pos) == Some(&byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error("unexpected character"))
        }
    }

    /// Read bytes up to (not including) `end`, consuming the terminator.
    fn until(&mut self, end: u8) -> Result<&'a str, AttributeDecodeError> {
        let input = self.input;
        let start = self.pos;
        let offset = input[start..]
            .iter()
            .position(|b| *b == end)
            .ok_or_else(|| self.error("unterminated token"))?;
        self.pos = start + offset + 1;
        std::str::from_utf8(&input[start..start + offset])
            .map_err(|_| self.error("invalid UTF-8"))
    }

    fn length(&mut self) -> Result<usize, AttributeDecodeError> {
        self.until(b':')?
            .parse()
            .map_err(|_| self.error("invalid length"))
    }

    /// Decode one value. Keys are decoded with `keep = false`.
    fn value(
        &mut self,
        out: &mut Vec<String>,
        keep: bool,
        depth: usize,
    ) -> Result<(), AttributeDecodeError> {
        let tag = *self
            .input
            .get(self.pos)
            .ok_or_else(|| self.error("unexpected end of input"))?;
        self.pos += 1;

        match tag {
            b'N' => self.expect(b';'),
            b'b' => {
                self.expect(b':')?;
                self.until(b';').map(|_| ())
            }
            b'i' | b'd' => {
                self.expect(b':')?;
                let number = self.until(b';')?;
                if keep {
                    out.push(number.to_string());
                }
                Ok(())
            }
            b's' => {
                self.expect(b':')?;
                let len = self.length()?;
                self.expect(b'"')?;
                let input = self.input;
                let end = self
                    .pos
                    .checked_add(len)
                    .ok_or_else(|| self.error("string length out of range"))?;
                let bytes = input
                    .get(self.pos..end)
                    .ok_or_else(|| self.error("string length out of range"))?;
                let text =
                    std::str::from_utf8(bytes).map_err(|_| self.error("invalid UTF-8"))?;
                self.pos = end;
                self.expect(b'"')?;
                self.expect(b';')?;
                if keep {
                    out.push(text.to_string());
                }
                Ok(())
            }
            b'a' => {
                if depth >= MAX_PHP_DEPTH {
                    return Err(self.error("array nesting too deep"));
                }
                self.expect(b':')?;
                let count = self.length()?;
                self.expect(b'{')?;
                for _ in 0..count {
                    self.value(out, false, depth + 1)?;
                    self.value(out, keep, depth + 1)?;
                }
                self.expect(b'}')
            }
            b'O' | b'C' => Err(self.error("serialized objects are not supported")),
            _ => Err(self.error("unknown type tag")),
        }
    }
}
