//! Mock flag client for testing the trial engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::client::{FlagClient, FlagClientError, FlagUser};

/// A single call observed by [`RecordingFlagClient`].
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCall {
    Identify {
        user_key: String,
    },
    Track {
        event_key: String,
        payload: Value,
        metric_value: Option<f64>,
    },
    Flush,
}

/// Flag client double that records every call.
///
/// Serves a fixed variant, or flips the variant on each identify when
/// created with [`RecordingFlagClient::alternating`].
#[derive(Debug, Clone)]
pub struct RecordingFlagClient {
    variant: Arc<AtomicBool>,
    alternate: bool,
    fail_identify: bool,
    fail_track: bool,
    calls: Arc<Mutex<Vec<ClientCall>>>,
}

impl RecordingFlagClient {
    /// Creates a client that always serves `variant`.
    pub fn new(variant: bool) -> Self {
        Self {
            variant: Arc::new(AtomicBool::new(variant)),
            alternate: false,
            fail_identify: false,
            fail_track: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Creates a client whose variant flips on every identify, starting with `true`.
    pub fn alternating() -> Self {
        Self {
            alternate: true,
            ..Self::new(false)
        }
    }

    /// Creates a client whose identify calls always fail.
    pub fn new_with_identify_failure(variant: bool) -> Self {
        Self {
            fail_identify: true,
            ..Self::new(variant)
        }
    }

    /// Creates a client whose track calls always fail.
    pub fn new_with_track_failure(variant: bool) -> Self {
        Self {
            fail_track: true,
            ..Self::new(variant)
        }
    }

    /// Changes the served variant.
    pub fn set_variant(&self, variant: bool) {
        self.variant.store(variant, Ordering::SeqCst);
    }

    /// All calls in the order they were made.
    pub fn calls(&self) -> Vec<ClientCall> {
        self.calls.lock().clone()
    }

    /// Keys passed to identify, in order.
    pub fn identified_users(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                ClientCall::Identify { user_key } => Some(user_key.clone()),
                _ => None,
            })
            .collect()
    }

    /// Payloads and metric values tracked under `event_key`.
    pub fn tracked(&self, event_key: &str) -> Vec<(Value, Option<f64>)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                ClientCall::Track {
                    event_key: key,
                    payload,
                    metric_value,
                } if key == event_key => Some((payload.clone(), *metric_value)),
                _ => None,
            })
            .collect()
    }

    /// Number of flush calls.
    pub fn flush_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, ClientCall::Flush))
            .count()
    }
}

#[async_trait]
impl FlagClient for RecordingFlagClient {
    async fn identify(&self, user: &FlagUser) -> Result<(), FlagClientError> {
        self.calls.lock().push(ClientCall::Identify {
            user_key: user.key.clone(),
        });

        if self.alternate {
            self.variant.fetch_xor(true, Ordering::SeqCst);
        }

        if self.fail_identify {
            return Err(FlagClientError::IdentifyFailed {
                user_key: user.key.clone(),
                reason: "mock identify failure".to_string(),
            });
        }
        Ok(())
    }

    fn evaluate(&self) -> bool {
        self.variant.load(Ordering::SeqCst)
    }

    async fn track(
        &self,
        event_key: &str,
        payload: Value,
        metric_value: Option<f64>,
    ) -> Result<(), FlagClientError> {
        self.calls.lock().push(ClientCall::Track {
            event_key: event_key.to_string(),
            payload,
            metric_value,
        });

        if self.fail_track {
            return Err(FlagClientError::TrackFailed {
                event_key: event_key.to_string(),
                reason: "mock track failure".to_string(),
            });
        }
        Ok(())
    }

    async fn flush(&self) -> Result<(), FlagClientError> {
        self.calls.lock().push(ClientCall::Flush);
        Ok(())
    }
}
