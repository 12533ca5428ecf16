//! JSON codec used for request and response bodies.
//!
//! Bodies are plain serde: a type decides how its own date fields look.
//! The `DateStrategy` only drives `format_date` and `parse_date`, for dates
//! a caller renders by hand into query values or string fields.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// How dates are rendered when they appear as plain strings in a request
/// (query values, string fields) and how such strings are read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateStrategy {
    /// `2024-05-01T12:00:00Z`
    #[default]
    Rfc3339,
    UnixSeconds,
    UnixMillis,
}

/// JSON encode/decode, plus date rendering per `DateStrategy`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec {
    date_strategy: DateStrategy,
}

impl JsonCodec {
    pub const CONTENT_TYPE: &'static str = "application/json";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_date_strategy(date_strategy: DateStrategy) -> Self {
        Self { date_strategy }
    }

    pub fn date_strategy(&self) -> DateStrategy {
        self.date_strategy
    }

    pub fn content_type(&self) -> &'static str {
        Self::CONTENT_TYPE
    }

    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(value)
    }

    /// Decode a response body. An empty body is treated as JSON `null` so
    /// `()` and `Option<T>` decode from bodiless responses.
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, serde_json::Error> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return serde_json::from_slice(b"null");
        }
        serde_json::from_slice(bytes)
    }

    pub fn format_date(&self, date: &DateTime<Utc>) -> String {
        match self.date_strategy {
            DateStrategy::Rfc3339 => date.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            DateStrategy::UnixSeconds => date.timestamp().to_string(),
            DateStrategy::UnixMillis => date.timestamp_millis().to_string(),
        }
    }

    /// Parse a date rendered with this codec's strategy.
    pub fn parse_date(&self, value: &str) -> Option<DateTime<Utc>> {
        match self.date_strategy {
            DateStrategy::Rfc3339 => DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|d| d.with_timezone(&Utc)),
            DateStrategy::UnixSeconds => value
                .parse::<i64>()
                .ok()
                .and_then(|s| Utc.timestamp_opt(s, 0).single()),
            DateStrategy::UnixMillis => value
                .parse::<i64>()
                .ok()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        }
    }
}
