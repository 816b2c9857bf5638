//! Flag evaluation client seam.
//!
//! The trial engine never talks to a concrete SDK. It consumes a
//! [`FlagClient`] trait object that a simulator, a real SDK adapter or a
//! recording test double can provide.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::trial::variant_tag;

/// Evaluation context sent to the flag client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagUser {
    pub key: String,
}

impl FlagUser {
    /// Creates a user context for the given key.
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Errors reported by a flag client implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlagClientError {
    #[error("Identify failed for user '{user_key}': {reason}")]
    IdentifyFailed { user_key: String, reason: String },

    #[error("Tracking event '{event_key}' failed: {reason}")]
    TrackFailed { event_key: String, reason: String },

    #[error("Flushing events failed: {reason}")]
    FlushFailed { reason: String },
}

/// Operations the trial engine needs from a flag evaluation client.
#[async_trait]
pub trait FlagClient: Send + Sync + std::fmt::Debug {
    /// Switches the evaluation context to `user`.
    ///
    /// # Errors
    /// - `FlagClientError::IdentifyFailed` - Context could not be switched
    async fn identify(&self, user: &FlagUser) -> Result<(), FlagClientError>;

    /// Latest evaluated value of the flag under test.
    fn evaluate(&self) -> bool;

    /// Records a custom event, optionally carrying a numeric metric value.
    ///
    /// # Errors
    /// - `FlagClientError::TrackFailed` - Event was rejected
    async fn track(
        &self,
        event_key: &str,
        payload: Value,
        metric_value: Option<f64>,
    ) -> Result<(), FlagClientError>;

    /// Delivers all pending events.
    ///
    /// # Errors
    /// - `FlagClientError::FlushFailed` - Pending events could not be delivered
    async fn flush(&self) -> Result<(), FlagClientError>;
}

/// Payload of the per-trial latency metric event.
pub fn latency_payload(
    event_key: &str,
    variant: bool,
    latency_ms: u64,
    extreme_mode: bool,
    timestamp: DateTime<Utc>,
) -> Value {
    json!({
        "key": event_key,
        "data": {
            "variant": variant_tag(variant),
            "timestamp": timestamp.to_rfc3339(),
            "latencyMs": latency_ms,
            "isExtremeMode": extreme_mode,
        }
    })
}

/// Payload of the simulated error metric event.
pub fn error_payload(
    event_key: &str,
    variant: bool,
    error: &str,
    extreme_mode: bool,
    timestamp: DateTime<Utc>,
) -> Value {
    json!({
        "key": event_key,
        "data": {
            "variant": variant_tag(variant),
            "timestamp": timestamp.to_rfc3339(),
            "error": error,
            "isExtremeMode": extreme_mode,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_payload_shape() {
        let timestamp = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let payload = latency_payload("latency", true, 123, false, timestamp);

        assert_eq!(payload["key"], "latency");
        assert_eq!(payload["data"]["variant"], "B");
        assert_eq!(payload["data"]["latencyMs"], 123);
        assert_eq!(payload["data"]["isExtremeMode"], false);
        assert_eq!(payload["data"]["timestamp"], "2024-05-01T12:00:00+00:00");
    }

    #[test]
    fn test_error_payload_shape() {
        let payload = error_payload("errors", false, "Simulated test error", true, Utc::now());

        assert_eq!(payload["data"]["variant"], "A");
        assert_eq!(payload["data"]["error"], "Simulated test error");
        assert_eq!(payload["data"]["isExtremeMode"], true);
        assert!(payload["data"].get("latencyMs").is_none());
    }
}
