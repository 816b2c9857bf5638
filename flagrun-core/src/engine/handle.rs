//! Handle for communicating with the trial engine actor.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};

use super::TrialError;
use super::commands::TrialEngineCommand;
use super::events::TrialEvent;
use crate::client::FlagClient;
use crate::config::RunConfiguration;
use crate::trial::{RunSnapshot, RunStatistics};

/// Handle for communicating with the trial engine actor.
///
/// This handle provides an async API for sending commands to the trial
/// engine actor. It can be cloned and shared across tasks safely.
#[derive(Clone)]
pub struct TrialEngineHandle {
    sender: mpsc::Sender<TrialEngineCommand>,
    snapshots: watch::Receiver<RunSnapshot>,
    events: broadcast::Sender<TrialEvent>,
}

impl TrialEngineHandle {
    /// Creates a new handle from the actor's channels.
    pub fn new(
        sender: mpsc::Sender<TrialEngineCommand>,
        snapshots: watch::Receiver<RunSnapshot>,
        events: broadcast::Sender<TrialEvent>,
    ) -> Self {
        Self {
            sender,
            snapshots,
            events,
        }
    }

    /// Starts a run with freshly reset statistics.
    ///
    /// Returns the snapshot right after the transition. Starting while a run
    /// is active returns the current snapshot unchanged.
    ///
    /// # Errors
    /// - `TrialError::EngineShutdown` - Engine actor is gone
    pub async fn start(&self) -> Result<RunSnapshot, TrialError> {
        let (responder, rx) = oneshot::channel();
        self.send(TrialEngineCommand::Start { responder }).await?;

        rx.await.map_err(|_| TrialError::EngineShutdown)
    }

    /// Stops the current run.
    ///
    /// Resolves once the engine is idle. An iteration already in flight
    /// completes and is counted before the stop takes effect.
    ///
    /// # Errors
    /// - `TrialError::EngineShutdown` - Engine actor is gone
    pub async fn stop(&self) -> Result<RunStatistics, TrialError> {
        let (responder, rx) = oneshot::channel();
        self.send(TrialEngineCommand::Stop { responder }).await?;

        rx.await.map_err(|_| TrialError::EngineShutdown)
    }

    /// Replaces the run configuration while idle.
    ///
    /// # Errors
    /// - `TrialError::ConfigurationLocked` - A run is active
    /// - `TrialError::InvalidConfiguration` - Configuration violates its invariants
    /// - `TrialError::EngineShutdown` - Engine actor is gone
    pub async fn update_configuration(
        &self,
        configuration: RunConfiguration,
    ) -> Result<RunSnapshot, TrialError> {
        let (responder, rx) = oneshot::channel();
        self.send(TrialEngineCommand::UpdateConfiguration {
            configuration,
            responder,
        })
        .await?;

        rx.await.map_err(|_| TrialError::EngineShutdown)?
    }

    /// Makes a flag client available to subsequent iterations.
    ///
    /// # Errors
    /// - `TrialError::EngineShutdown` - Engine actor is gone
    pub async fn attach_client(&self, client: Arc<dyn FlagClient>) -> Result<(), TrialError> {
        let (responder, rx) = oneshot::channel();
        self.send(TrialEngineCommand::AttachClient { client, responder })
            .await?;

        rx.await.map_err(|_| TrialError::EngineShutdown)
    }

    /// Gets the current run snapshot from the actor.
    ///
    /// # Errors
    /// - `TrialError::EngineShutdown` - Engine actor is gone
    pub async fn snapshot(&self) -> Result<RunSnapshot, TrialError> {
        let (responder, rx) = oneshot::channel();
        self.send(TrialEngineCommand::GetSnapshot { responder })
            .await?;

        rx.await.map_err(|_| TrialError::EngineShutdown)
    }

    /// Latest published snapshot without a round trip to the actor.
    pub fn latest(&self) -> RunSnapshot {
        *self.snapshots.borrow()
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<RunSnapshot> {
        self.snapshots.clone()
    }

    /// Receiver for trial notifications emitted from now on.
    pub fn events(&self) -> broadcast::Receiver<TrialEvent> {
        self.events.subscribe()
    }

    /// Waits until no run is active and returns the final snapshot.
    ///
    /// # Errors
    /// - `TrialError::EngineShutdown` - Engine actor exited while waiting
    pub async fn wait_until_idle(&self) -> Result<RunSnapshot, TrialError> {
        let mut snapshots = self.snapshots.clone();
        let snapshot = snapshots
            .wait_for(|snapshot| !snapshot.is_running)
            .await
            .map_err(|_| TrialError::EngineShutdown)?;

        Ok(*snapshot)
    }

    /// Shuts down the engine actor gracefully.
    ///
    /// An active run is stopped first. After this call every operation
    /// returns `TrialError::EngineShutdown`.
    ///
    /// # Errors
    /// - `TrialError::EngineShutdown` - Engine actor is already gone
    pub async fn shutdown(&self) -> Result<(), TrialError> {
        let (responder, rx) = oneshot::channel();
        self.send(TrialEngineCommand::Shutdown { responder }).await?;

        rx.await.map_err(|_| TrialError::EngineShutdown)
    }

    /// Checks if the engine actor is still accepting commands.
    pub fn is_alive(&self) -> bool {
        !self.sender.is_closed()
    }

    async fn send(&self, command: TrialEngineCommand) -> Result<(), TrialError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| TrialError::EngineShutdown)
    }
}
