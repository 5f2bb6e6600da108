//! The shared credential record and its refresh protocol.
//!
//! One JSON document holds the tokens of every platform:
//!
//! ```text
//! {
//!   "base": {
//!     "currentToken": { "accessToken": "...", "createdTime": "2024-05-01 09:30:00.123" },
//!     "oldToken":     { "accessToken": "...", "createdTime": "2024-04-01 09:30:00.456" }
//!   },
//!   "instagram": { ... }
//! }
//! ```
//!
//! A refresh copies `currentToken` over `oldToken`, then writes the new value
//! and the time it was written into `currentToken`. Only the targeted platform
//! entry is touched; everything else in the document, including keys this
//! crate does not know about, is carried through unchanged.

use crate::error::{Error, Result};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;


/// `createdTime` layout: UTC, millisecond precision.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// A platform with an entry in the record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Platform {
    Base,
    Instagram,
}

impl Platform {
    /// Top-level key of this platform's entry.
    pub fn key(&self) -> &'static str {
        match self {
            Platform::Base => "base",
            Platform::Instagram => "instagram",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One token generation. `oldToken` is `{}` until the first refresh.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A platform entry: the live token and the one it replaced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformTokens {
    pub current_token: TokenSnapshot,
    #[serde(default)]
    pub old_token: TokenSnapshot,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The whole shared document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialRecord(Map<String, Value>);

impl CredentialRecord {
    /// Decode a stored document. Anything but a JSON object is rejected.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| Error::MalformedRecord(format!("not valid JSON: {}", e)))?;
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(Error::MalformedRecord(format!(
                "expected a JSON object, found {}",
                json_type(&other)
            ))),
        }
    }

    pub fn to_vec(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.0)
            .map_err(|e| Error::MalformedRecord(format!("failed to serialize: {}", e)))
    }

    /// The raw document, as returned to readers.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Decode one platform's entry.
    pub fn platform(&self, platform: Platform) -> Result<PlatformTokens> {
        let entry = self.0.get(platform.key()).ok_or_else(|| {
            Error::MalformedRecord(format!("no '{}' entry", platform))
        })?;
        PlatformTokens::deserialize(entry)
            .map_err(|e| Error::MalformedRecord(format!("'{}' entry: {}", platform, e)))
    }

    /// `currentToken.accessToken` of a platform.
    pub fn current_token(&self, platform: Platform) -> Result<String> {
        self.platform(platform)?
            .current_token
            .access_token
            .ok_or_else(|| {
                Error::MalformedRecord(format!("'{}' has no currentToken.accessToken", platform))
            })
    }

    /// Apply a refresh to one platform, leaving every other entry untouched.
    ///
    /// `currentToken` is copied over `oldToken`, then its `accessToken` and
    /// `createdTime` are replaced. The edit happens on the stored JSON, so the
    /// entry keeps its key order and any fields this crate does not model.
    pub fn rotate(&mut self, platform: Platform, new_token: &str, now: DateTime<Utc>) -> Result<()> {
        let tokens = self.platform(platform)?;
        let created_time = next_created_time(tokens.current_token.created_time.as_deref(), now);

        let entry = self
            .0
            .get_mut(platform.key())
            .and_then(Value::as_object_mut)
            .ok_or_else(|| Error::MalformedRecord(format!("'{}' entry is not an object", platform)))?;
        let mut current = match entry.get("currentToken") {
            Some(Value::Object(current)) => current.clone(),
            _ => {
                return Err(Error::MalformedRecord(format!(
                    "'{}' currentToken is not an object",
                    platform
                )))
            }
        };

        entry.insert("oldToken".to_string(), Value::Object(current.clone()));
        current.insert("accessToken".to_string(), Value::String(new_token.to_string()));
        current.insert("createdTime".to_string(), Value::String(created_time));
        entry.insert("currentToken".to_string(), Value::Object(current));
        Ok(())
    }
}

impl From<Map<String, Value>> for CredentialRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Format `now` for `createdTime`, keeping it strictly after `previous`.
///
/// Two writes inside the same millisecond (or a clock that stepped backwards)
/// would otherwise produce a timestamp that is not newer than the last one.
pub fn next_created_time(previous: Option<&str>, now: DateTime<Utc>) -> String {
    let now = DateTime::<Utc>::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now);
    let stamp = match previous.and_then(parse_created_time) {
        Some(previous) if previous >= now => previous + Duration::milliseconds(1),
        _ => now,
    };
    stamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a `createdTime` value. Returns `None` for anything not in
/// `TIMESTAMP_FORMAT` (fractional digits optional).
pub fn parse_created_time(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
