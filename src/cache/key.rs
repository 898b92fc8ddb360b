//! Cache Key Module
//!
//! Structural, canonicalized identifiers for logical queries.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::error::{CacheError, Result};

// == Key Part ==
/// One segment of a cache key.
///
/// Maps are stored in a `BTreeMap`, so two parameter objects that differ only
/// in field order produce the same segment. Floats are not representable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum KeyPart {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<KeyPart>),
    Map(BTreeMap<String, KeyPart>),
}

impl KeyPart {
    /// Builds a map segment from field/value pairs.
    pub fn map<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, KeyPart)>,
    {
        KeyPart::Map(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl TryFrom<Value> for KeyPart {
    type Error = CacheError;

    fn try_from(value: Value) -> Result<Self> {
        Ok(match value {
            Value::Null => KeyPart::Null,
            Value::Bool(b) => KeyPart::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => KeyPart::Int(i),
                None => {
                    return Err(CacheError::Validation(format!(
                        "key segment {} is not an integer in i64 range",
                        n
                    )))
                }
            },
            Value::String(s) => KeyPart::Str(s),
            Value::Array(items) => KeyPart::List(
                items
                    .into_iter()
                    .map(KeyPart::try_from)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Value::Object(fields) => KeyPart::Map(
                fields
                    .into_iter()
                    .map(|(k, v)| KeyPart::try_from(v).map(|part| (k, part)))
                    .collect::<Result<BTreeMap<_, _>>>()?,
            ),
        })
    }
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        KeyPart::Str(value.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(value: String) -> Self {
        KeyPart::Str(value)
    }
}

impl From<i64> for KeyPart {
    fn from(value: i64) -> Self {
        KeyPart::Int(value)
    }
}

impl From<u32> for KeyPart {
    fn from(value: u32) -> Self {
        KeyPart::Int(i64::from(value))
    }
}

impl From<bool> for KeyPart {
    fn from(value: bool) -> Self {
        KeyPart::Bool(value)
    }
}

// == Cache Key ==
/// Ordered tuple of segments identifying one logical query.
///
/// Keys form a hierarchy by prefix: `["categories"]` is a prefix of
/// `["categories", {"search": "x"}]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CacheKey(Vec<KeyPart>);

impl CacheKey {
    /// Creates a key with a single root segment.
    pub fn new(root: impl Into<KeyPart>) -> Self {
        Self(vec![root.into()])
    }

    /// Appends a segment.
    pub fn push(mut self, part: impl Into<KeyPart>) -> Self {
        self.0.push(part.into());
        self
    }

    /// Appends a serializable parameter object as a canonical segment.
    ///
    /// Parameters that serialize to `null` (unit, `None`) add no segment.
    /// Fails with `Validation` when the parameters contain floats or cannot be
    /// serialized at all.
    pub fn with_params<P: Serialize>(self, params: &P) -> Result<Self> {
        let value = serde_json::to_value(params)
            .map_err(|e| CacheError::Validation(format!("unserializable key params: {}", e)))?;
        if value.is_null() {
            return Ok(self);
        }
        Ok(self.push(KeyPart::try_from(value)?))
    }

    /// Parses a key from its JSON array form.
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Array(items) => Ok(Self(
                items
                    .into_iter()
                    .map(KeyPart::try_from)
                    .collect::<Result<Vec<_>>>()?,
            )),
            other => Err(CacheError::Validation(format!(
                "cache key must be a JSON array, got {}",
                other
            ))),
        }
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if `prefix` matches the leading segments of this key.
    pub fn starts_with(&self, prefix: &CacheKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl<const N: usize> From<[&str; N]> for CacheKey {
    fn from(parts: [&str; N]) -> Self {
        Self(parts.iter().map(|p| KeyPart::from(*p)).collect())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}
