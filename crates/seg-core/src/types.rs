//! Core type definitions with validation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the segmentation engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SegmentError {
    /// `combine` was called without any candidate audiences.
    #[error("cannot combine an empty list of candidate audiences")]
    EmptyCombinationInput,

    /// A filter set's date range starts after it ends.
    #[error("date range start {start} is after end {end}")]
    InvalidDateRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// A user identifier could not be normalized to its string form.
    #[error("user id {value} cannot be normalized: {reason}")]
    TypeMismatch { value: String, reason: &'static str },

    /// A date or timestamp string could not be parsed.
    #[error("invalid date {value}: expected YYYY-MM-DD or RFC 3339")]
    InvalidDate { value: String },

    /// An enum-like option was given an unrecognized value.
    #[error("unknown {kind}: {value}")]
    UnknownValue { kind: &'static str, value: String },
}

/// A normalized user identifier.
///
/// User ids arrive as integers from some sources and as strings from others.
/// Every id is normalized to one string form before any join, so `1`, `1.0`
/// and `"1"` all compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "String")]
pub struct UserId(String);

impl UserId {
    /// Creates an id from its textual form, trimming surrounding whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self, SegmentError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(SegmentError::TypeMismatch {
                value: format!("{id:?}"),
                reason: "empty identifier",
            });
        }
        if trimmed.len() == id.len() {
            Ok(Self(id))
        } else {
            Ok(Self(trimmed.to_string()))
        }
    }

    /// Creates an id from a text cell, folding plain integral decimals (`7.0`)
    /// to their integer form.
    ///
    /// Anything else, including exponents and leading zeros, is kept as text.
    pub fn from_text(id: &str) -> Result<Self, SegmentError> {
        let trimmed = id.trim();
        if let Some((whole, fraction)) = trimmed.split_once('.') {
            let digits = whole.strip_prefix('-').unwrap_or(whole);
            let integral = !digits.is_empty()
                && digits.bytes().all(|b| b.is_ascii_digit())
                && !fraction.is_empty()
                && fraction.bytes().all(|b| b == b'0');
            if integral {
                return Self::new(whole);
            }
        }
        Self::new(trimmed)
    }

    /// Creates an id from an integer.
    #[must_use]
    pub fn from_i64(id: i64) -> Self {
        Self(id.to_string())
    }

    /// Creates an id from a float, accepting only integral values.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "range and fractional part are checked before the cast"
    )]
    pub fn from_f64(id: f64) -> Result<Self, SegmentError> {
        // 2^63 as f64; anything at or beyond it cannot be an i64.
        const LIMIT: f64 = 9_223_372_036_854_775_808.0;
        if !id.is_finite() || id.fract() != 0.0 || id.abs() >= LIMIT {
            return Err(SegmentError::TypeMismatch {
                value: id.to_string(),
                reason: "non-integral number",
            });
        }
        Ok(Self::from_i64(id as i64))
    }

    /// Normalizes a loosely typed JSON value.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, SegmentError> {
        use serde_json::Value;

        match value {
            Value::String(s) => Self::new(s.as_str()),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::from_i64(i))
                } else if let Some(u) = n.as_u64() {
                    Ok(Self(u.to_string()))
                } else {
                    Self::from_f64(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::Null => Err(SegmentError::TypeMismatch {
                value: "null".to_string(),
                reason: "missing identifier",
            }),
            other => Err(SegmentError::TypeMismatch {
                value: other.to_string(),
                reason: "unsupported identifier type",
            }),
        }
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Self::from_json(&value).map_err(serde::de::Error::custom)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
