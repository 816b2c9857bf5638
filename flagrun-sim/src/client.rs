//! In-process flag client

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flagrun_core::{FlagClient, FlagClientError, FlagUser};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::bucketing::in_rollout;

/// Flag key evaluated when none is configured.
pub const DEFAULT_FLAG_KEY: &str = "flight-status";

/// Custom event accepted by the simulated client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedEvent {
    pub event_key: String,
    pub user_key: Option<String>,
    pub payload: Value,
    pub metric_value: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Call counters of a simulated client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulationStats {
    pub identify_calls: u64,
    pub events_tracked: u64,
    pub events_delivered: u64,
    pub flushes: u64,
}

/// Flag client that evaluates a percentage rollout locally.
///
/// Variants are assigned by hashing the identified user, events are buffered
/// until [`FlagClient::flush`] moves them to the delivered log. Call latency
/// and an offline switch let tests exercise slow or failing SDKs.
#[derive(Debug, Clone)]
pub struct SimulatedFlagClient {
    flag_key: String,
    environment_id: String,
    rollout_percent: Arc<Mutex<u8>>,
    call_latency: Duration,
    variant: Arc<AtomicBool>,
    offline: Arc<AtomicBool>,
    current_user: Arc<Mutex<Option<String>>>,
    pending: Arc<Mutex<Vec<TrackedEvent>>>,
    delivered: Arc<Mutex<Vec<TrackedEvent>>>,
    identify_calls: Arc<AtomicU64>,
    events_tracked: Arc<AtomicU64>,
    flushes: Arc<AtomicU64>,
}

impl Default for SimulatedFlagClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedFlagClient {
    /// Creates a client with a 50% rollout and no call latency.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Returns builder for customizing the simulated environment.
    pub fn builder() -> SimulatedFlagClientBuilder {
        SimulatedFlagClientBuilder::new()
    }

    /// Key of the flag being evaluated.
    pub fn flag_key(&self) -> &str {
        &self.flag_key
    }

    /// Current rollout percentage of the `true` variant.
    pub fn rollout_percent(&self) -> u8 {
        *self.rollout_percent.lock()
    }

    /// Changes the rollout. Takes effect on the next identify.
    pub fn set_rollout(&self, percent: u8) {
        *self.rollout_percent.lock() = percent.min(100);
    }

    /// Makes every subsequent call fail until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// User of the most recent successful identify.
    pub fn current_user(&self) -> Option<String> {
        self.current_user.lock().clone()
    }

    /// Number of events tracked but not yet flushed.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Snapshot of every flushed event in delivery order.
    pub fn delivered_events(&self) -> Vec<TrackedEvent> {
        self.delivered.lock().clone()
    }

    /// Call counters since construction.
    pub fn stats(&self) -> SimulationStats {
        SimulationStats {
            identify_calls: self.identify_calls.load(Ordering::Relaxed),
            events_tracked: self.events_tracked.load(Ordering::Relaxed),
            events_delivered: self.delivered.lock().len() as u64,
            flushes: self.flushes.load(Ordering::Relaxed),
        }
    }

    async fn simulate_call_latency(&self) {
        if !self.call_latency.is_zero() {
            tokio::time::sleep(self.call_latency).await;
        }
    }

    fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FlagClient for SimulatedFlagClient {
    async fn identify(&self, user: &FlagUser) -> Result<(), FlagClientError> {
        self.identify_calls.fetch_add(1, Ordering::Relaxed);
        self.simulate_call_latency().await;

        if self.is_offline() {
            return Err(FlagClientError::IdentifyFailed {
                user_key: user.key.clone(),
                reason: "client is offline".to_string(),
            });
        }

        let variant = in_rollout(
            &self.flag_key,
            &self.environment_id,
            &user.key,
            self.rollout_percent(),
        );
        self.variant.store(variant, Ordering::SeqCst);
        *self.current_user.lock() = Some(user.key.clone());

        tracing::trace!(
            "Identified {} for flag {}: variant={}",
            user.key,
            self.flag_key,
            variant
        );
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
        self.simulate_call_latency().await;

        if self.is_offline() {
            return Err(FlagClientError::TrackFailed {
                event_key: event_key.to_string(),
                reason: "client is offline".to_string(),
            });
        }

        self.events_tracked.fetch_add(1, Ordering::Relaxed);
        self.pending.lock().push(TrackedEvent {
            event_key: event_key.to_string(),
            user_key: self.current_user(),
            payload,
            metric_value,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    async fn flush(&self) -> Result<(), FlagClientError> {
        self.simulate_call_latency().await;

        if self.is_offline() {
            return Err(FlagClientError::FlushFailed {
                reason: format!("{} events left pending, client is offline", self.pending_count()),
            });
        }

        self.flushes.fetch_add(1, Ordering::Relaxed);
        let batch: Vec<TrackedEvent> = std::mem::take(&mut *self.pending.lock());
        if batch.is_empty() {
            return Ok(());
        }

        tracing::debug!("Flushed {} events for flag {}", batch.len(), self.flag_key);
        self.delivered.lock().extend(batch);
        Ok(())
    }
}

/// Builder for creating customized simulated clients.
pub struct SimulatedFlagClientBuilder {
    flag_key: String,
    environment_id: String,
    rollout_percent: u8,
    call_latency: Duration,
    offline: bool,
}

impl Default for SimulatedFlagClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedFlagClientBuilder {
    /// Creates builder with a 50% rollout of the default flag.
    pub fn new() -> Self {
        Self {
            flag_key: DEFAULT_FLAG_KEY.to_string(),
            environment_id: String::new(),
            rollout_percent: 50,
            call_latency: Duration::ZERO,
            offline: false,
        }
    }

    /// Sets the evaluated flag key.
    pub fn flag_key(mut self, flag_key: impl Into<String>) -> Self {
        self.flag_key = flag_key.into();
        self
    }

    /// Sets the environment identifier, which salts the bucketing hash.
    pub fn environment_id(mut self, environment_id: impl Into<String>) -> Self {
        self.environment_id = environment_id.into();
        self
    }

    /// Sets the share of users receiving `true`, clamped to 100.
    pub fn rollout_percent(mut self, percent: u8) -> Self {
        self.rollout_percent = percent.min(100);
        self
    }

    /// Sets the delay applied to every async client call.
    pub fn call_latency(mut self, latency: Duration) -> Self {
        self.call_latency = latency;
        self
    }

    /// Starts the client in offline mode.
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// Builds the configured client.
    pub fn build(self) -> SimulatedFlagClient {
        SimulatedFlagClient {
            flag_key: self.flag_key,
            environment_id: self.environment_id,
            rollout_percent: Arc::new(Mutex::new(self.rollout_percent)),
            call_latency: self.call_latency,
            variant: Arc::new(AtomicBool::new(false)),
            offline: Arc::new(AtomicBool::new(self.offline)),
            current_user: Arc::new(Mutex::new(None)),
            pending: Arc::new(Mutex::new(Vec::new())),
            delivered: Arc::new(Mutex::new(Vec::new())),
            identify_calls: Arc::new(AtomicU64::new(0)),
            events_tracked: Arc::new(AtomicU64::new(0)),
            flushes: Arc::new(AtomicU64::new(0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    #[test]
    fn test_builder_defaults() {
        let client = SimulatedFlagClient::new();

        assert_eq!(client.flag_key(), DEFAULT_FLAG_KEY);
        assert_eq!(client.rollout_percent(), 50);
        assert!(!client.evaluate());
        assert_eq!(client.stats(), SimulationStats::default());
    }

    #[test]
    fn test_builder_clamps_rollout() {
        let client = SimulatedFlagClient::builder().rollout_percent(150).build();
        assert_eq!(client.rollout_percent(), 100);

        client.set_rollout(255);
        assert_eq!(client.rollout_percent(), 100);
    }

    #[tokio::test]
    async fn test_full_rollout_always_true() {
        let client = SimulatedFlagClient::builder().rollout_percent(100).build();

        for i in 0..50 {
            assert_ok!(client.identify(&FlagUser::new(format!("user-{i}"))).await);
            assert!(client.evaluate());
        }
    }

    #[tokio::test]
    async fn test_zero_rollout_always_false() {
        let client = SimulatedFlagClient::builder().rollout_percent(0).build();

        for i in 0..50 {
            assert_ok!(client.identify(&FlagUser::new(format!("user-{i}"))).await);
            assert!(!client.evaluate());
        }
    }

    #[tokio::test]
    async fn test_same_user_same_variant() {
        let client = SimulatedFlagClient::builder()
            .environment_id("env-1")
            .rollout_percent(50)
            .build();
        let user = FlagUser::new("user-k3x9");

        client.identify(&user).await.unwrap();
        let first = client.evaluate();
        client.identify(&FlagUser::new("user-other")).await.unwrap();
        client.identify(&user).await.unwrap();

        assert_eq!(client.evaluate(), first);
        assert_eq!(client.current_user().as_deref(), Some("user-k3x9"));
        assert_eq!(client.stats().identify_calls, 3);
    }

    #[tokio::test]
    async fn test_flush_moves_pending_to_delivered() {
        let client = SimulatedFlagClient::new();
        client.identify(&FlagUser::new("user-a1")).await.unwrap();

        client
            .track("latency", json!({"latencyMs": 120}), Some(120.0))
            .await
            .unwrap();
        client.track("errors", json!({}), None).await.unwrap();
        assert_eq!(client.pending_count(), 2);
        assert!(client.delivered_events().is_empty());

        assert_ok!(client.flush().await);

        let delivered = client.delivered_events();
        assert_eq!(client.pending_count(), 0);
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].event_key, "latency");
        assert_eq!(delivered[0].metric_value, Some(120.0));
        assert_eq!(delivered[0].user_key.as_deref(), Some("user-a1"));
        assert_eq!(delivered[1].metric_value, None);

        let stats = client.stats();
        assert_eq!(stats.events_tracked, 2);
        assert_eq!(stats.events_delivered, 2);
        assert_eq!(stats.flushes, 1);
    }

    #[tokio::test]
    async fn test_offline_client_fails_every_call() {
        let client = SimulatedFlagClient::builder().offline(true).build();

        assert_err!(client.identify(&FlagUser::new("user-x")).await);
        assert_err!(client.track("latency", json!({}), Some(1.0)).await);
        assert_err!(client.flush().await);
        assert_eq!(client.current_user(), None);

        client.set_offline(false);
        assert_ok!(client.identify(&FlagUser::new("user-x")).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_latency_is_applied() {
        let client = SimulatedFlagClient::builder()
            .call_latency(Duration::from_millis(40))
            .build();

        let start = tokio::time::Instant::now();
        client.identify(&FlagUser::new("user-slow")).await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
