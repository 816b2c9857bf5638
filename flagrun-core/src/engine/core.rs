//! Trial engine state and iteration logic.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;

use super::TrialError;
use super::events::TrialEvent;
use crate::client::{FlagClient, FlagUser, error_payload, latency_payload};
use crate::config::{FlagrunConfig, IdentityConfig, MetricsConfig, RunConfiguration};
use crate::trial::{
    RunSnapshot, RunState, RunStatistics, Transition, TrialOutcome, TrialRng, sample_is_error,
    sample_latency, variant_name,
};

/// Reason attached to sampled trial failures.
pub const SIMULATED_ERROR_MESSAGE: &str = "Simulated test error";

/// Trial engine owned by the actor task.
///
/// Holds the run state, the optional flag client and the channels used to
/// publish snapshots and events. All mutation happens through `&mut self`
/// on the actor task, so no locking is involved.
pub struct TrialEngine {
    state: RunState,
    client: Option<Arc<dyn FlagClient>>,
    identity: IdentityConfig,
    metrics: MetricsConfig,
    rng: TrialRng,
    next_tick: Option<Instant>,
    snapshot_sender: watch::Sender<RunSnapshot>,
    event_sender: broadcast::Sender<TrialEvent>,
}

/// What happened inside a single iteration.
struct IterationReport {
    outcome: TrialOutcome,
    user_key: String,
    failure: Option<String>,
}

impl TrialEngine {
    /// Creates an idle engine.
    ///
    /// # Errors
    /// - `TrialError::InvalidConfiguration` - Initial run configuration is invalid
    pub fn new(
        config: FlagrunConfig,
        client: Option<Arc<dyn FlagClient>>,
        snapshot_sender: watch::Sender<RunSnapshot>,
        event_sender: broadcast::Sender<TrialEvent>,
    ) -> Result<Self, TrialError> {
        config.run.validate()?;

        let rng = TrialRng::from_optional_seed(config.engine.seed);
        tracing::debug!("Trial engine seeded with {}", rng.seed());

        let engine = Self {
            state: RunState::new(config.run),
            client,
            identity: config.identity,
            metrics: config.metrics,
            rng,
            next_tick: None,
            snapshot_sender,
            event_sender,
        };
        engine.publish();

        Ok(engine)
    }

    /// Returns true while a run is in progress.
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Deadline of the next scheduled iteration, if running.
    pub fn next_tick(&self) -> Option<Instant> {
        self.next_tick
    }

    /// Current snapshot of the run.
    pub fn snapshot(&self) -> RunSnapshot {
        self.state.snapshot()
    }

    /// Starts a run. Starting while running leaves the run untouched.
    pub fn start(&mut self) -> RunSnapshot {
        if self.is_running() {
            tracing::debug!("Start ignored, run already active");
            return self.snapshot();
        }

        self.transition(Transition::Started);
        self.schedule_next();

        let configuration = self.state.configuration;
        tracing::info!(
            "Run started: extreme_mode={}, interval={}ms",
            configuration.extreme_mode_enabled,
            configuration.interval_ms
        );
        self.emit(TrialEvent::RunStarted { configuration });

        self.snapshot()
    }

    /// Stops the current run and returns its final statistics.
    pub fn stop(&mut self) -> RunStatistics {
        if self.is_running() {
            self.transition(Transition::Stopped);
            self.next_tick = None;

            let stats = self.state.stats;
            tracing::info!(
                "Run stopped after {} trials ({} errors)",
                stats.completed(),
                stats.error_count
            );
            self.emit(TrialEvent::RunStopped { stats });
        }

        self.state.stats
    }

    /// Replaces the run configuration.
    ///
    /// # Errors
    /// - `TrialError::ConfigurationLocked` - A run is active
    /// - `TrialError::InvalidConfiguration` - Configuration violates its invariants
    pub fn update_configuration(
        &mut self,
        configuration: RunConfiguration,
    ) -> Result<RunSnapshot, TrialError> {
        if self.is_running() {
            return Err(TrialError::ConfigurationLocked);
        }
        configuration.validate()?;

        self.transition(Transition::ConfigurationUpdated(configuration));
        tracing::debug!("Run configuration updated: {:?}", configuration);

        Ok(self.snapshot())
    }

    /// Makes a flag client available to subsequent iterations.
    pub fn attach_client(&mut self, client: Arc<dyn FlagClient>) {
        tracing::info!("Flag client attached");
        self.client = Some(client);
    }

    /// Executes the iteration scheduled at `next_tick`.
    ///
    /// Without a flag client the tick is skipped and rescheduled. Otherwise
    /// one full iteration runs to completion before its outcome is applied.
    pub async fn run_scheduled_tick(&mut self) {
        if !self.is_running() {
            self.next_tick = None;
            return;
        }

        let Some(client) = self.client.clone() else {
            tracing::debug!("No flag client attached, skipping iteration");
            self.emit(TrialEvent::ClientUnavailable);
            self.schedule_next();
            return;
        };

        let index = self.state.stats.completed() + 1;
        let previous_variant = self.state.last_variant;
        let report = self.run_iteration(client.as_ref()).await;
        let outcome = report.outcome;

        if previous_variant != Some(outcome.variant) {
            self.emit(TrialEvent::VariantChanged {
                variant: outcome.variant,
            });
        }

        match report.failure {
            Some(reason) => {
                tracing::debug!(
                    "Trial {} failed: {} ({})",
                    index,
                    reason,
                    variant_name(outcome.variant)
                );
                self.emit(TrialEvent::TrialFailed {
                    index,
                    user_key: report.user_key,
                    variant: outcome.variant,
                    reason,
                });
            }
            None => {
                tracing::debug!(
                    "Trial {} succeeded for {} ({}, {}ms)",
                    index,
                    report.user_key,
                    variant_name(outcome.variant),
                    outcome.latency_ms
                );
                self.emit(TrialEvent::TrialSucceeded {
                    index,
                    user_key: report.user_key,
                    variant: outcome.variant,
                    latency_ms: outcome.latency_ms,
                });
            }
        }

        self.transition(Transition::TrialCompleted(outcome));

        if self.is_running() {
            self.schedule_next();
        } else {
            self.next_tick = None;
            let stats = self.state.stats;
            tracing::info!(
                "Run completed: {} trials with {} errors, average latency {}ms",
                stats.completed(),
                stats.error_count,
                stats.average_latency_ms()
            );
            self.emit(TrialEvent::RunCompleted { stats });
        }
    }

    /// Runs one trial against the flag client.
    ///
    /// Client failures are logged and fold into the trial's failure reason;
    /// they never abort the run.
    async fn run_iteration(&mut self, client: &dyn FlagClient) -> IterationReport {
        let configuration = self.state.configuration;
        let user = FlagUser::new(self.rng.user_key(&self.identity.user_key_prefix));

        let mut failure = match client.identify(&user).await {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!("Flag client identify failed: {}", e);
                Some(e.to_string())
            }
        };

        let variant = client.evaluate();
        let latency_ms = sample_latency(variant, &configuration, &mut self.rng);
        let simulated_error = sample_is_error(variant, &configuration, &mut self.rng);

        tokio::time::sleep(Duration::from_millis(latency_ms)).await;

        let latency_event = latency_payload(
            &self.metrics.latency_event_key,
            variant,
            latency_ms,
            configuration.extreme_mode_enabled,
            Utc::now(),
        );
        if let Err(e) = client
            .track(
                &self.metrics.latency_event_key,
                latency_event,
                Some(latency_ms as f64),
            )
            .await
        {
            tracing::warn!("Flag client failed to track latency: {}", e);
            failure.get_or_insert_with(|| e.to_string());
        }

        if simulated_error {
            failure.get_or_insert_with(|| SIMULATED_ERROR_MESSAGE.to_string());
        }

        if let Some(reason) = &failure {
            let error_event = error_payload(
                &self.metrics.error_event_key,
                variant,
                reason,
                configuration.extreme_mode_enabled,
                Utc::now(),
            );
            if let Err(e) = client
                .track(&self.metrics.error_event_key, error_event, None)
                .await
            {
                tracing::warn!("Flag client failed to track error: {}", e);
            }
        }

        if let Err(e) = client.flush().await {
            tracing::warn!("Flag client flush failed: {}", e);
        }

        IterationReport {
            outcome: TrialOutcome {
                variant,
                latency_ms,
                is_error: failure.is_some(),
            },
            user_key: user.key,
            failure,
        }
    }

    fn transition(&mut self, transition: Transition) {
        self.state = self.state.clone().reduce(transition);
        self.publish();
    }

    fn schedule_next(&mut self) {
        self.next_tick = Some(Instant::now() + self.state.configuration.interval());
    }

    fn publish(&self) {
        self.snapshot_sender.send_replace(self.state.snapshot());
    }

    fn emit(&self, event: TrialEvent) {
        // Sending fails only when nobody is subscribed
        let _ = self.event_sender.send(event);
    }
}
