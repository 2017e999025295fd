//! Notification records as served by the backend listing
//!
//! The backend returns a JSON array of loosely-typed records. Every field is
//! optional; `titre`/`description` are the backend's labels for title/body.
//! Records are parsed one at a time so a single bad element never costs the
//! rest of the batch.

use std::fmt;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::errors::{HeraldError, Result};

/// Title used when a record carries none
pub const DEFAULT_TITLE: &str = "Notification";

/// Opaque notification identifier. `1` and `"1"` are different ids.
///
/// Integers (including integral floats like `3.0`) key as `Int`. Any other
/// non-string value, such as `1.5` or a number past `i64::MAX`, keys on its
/// canonical JSON text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NotificationId {
    Int(i64),
    Text(String),
    Raw(String),
}

impl NotificationId {
    fn from_json(value: Value) -> Self {
        match value {
            Value::String(s) => Self::Text(s),
            Value::Number(n) => match n.as_i64().or_else(|| n.as_f64().and_then(integral_i64)) {
                Some(i) => Self::Int(i),
                None => Self::Raw(n.to_string()),
            },
            other => Self::Raw(other.to_string()),
        }
    }
}

fn integral_i64(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is out of range
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

impl<'de> Deserialize<'de> for NotificationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_json)
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Raw(raw) => write!(f, "{raw}"),
        }
    }
}

/// Raw record from the backend (`{ id?, titre?, description?, redirect_url? }`)
///
/// `title`/`body` are read too, but `titre`/`description` win when both are sent.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationRecord {
    #[serde(default)]
    pub id: Option<NotificationId>,
    #[serde(default)]
    pub titre: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub redirect_url: Option<String>,
}

/// A record with defaults applied, ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: Option<NotificationId>,
    pub title: String,
    pub body: String,
    pub redirect: Option<String>,
}

impl From<NotificationRecord> for Notification {
    fn from(record: NotificationRecord) -> Self {
        let redirect = record
            .redirect_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        Self {
            id: record.id,
            title: record
                .titre
                .or(record.title)
                .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            body: record.description.or(record.body).unwrap_or_default(),
            redirect,
        }
    }
}

impl Notification {
    /// Build one notification from a single array element
    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(HeraldError::MalformedRecord(format!(
                "expected object, got {value}"
            )));
        }
        serde_json::from_value::<NotificationRecord>(value)
            .map(Self::from)
            .map_err(|e| HeraldError::MalformedRecord(e.to_string()))
    }
}

/// Split a response body into per-record parse results.
///
/// Anything other than a JSON array is a malformed body. An empty array is
/// a valid, empty batch.
pub fn parse_batch(body: &str) -> Result<Vec<Result<Notification>>> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| HeraldError::MalformedBody(e.to_string()))?;

    match value {
        Value::Array(items) => Ok(items.into_iter().map(Notification::from_value).collect()),
        other => Err(HeraldError::MalformedBody(format!(
            "expected array, got {}",
            json_type(&other)
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
