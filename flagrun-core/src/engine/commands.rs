//! Command definitions for the trial engine actor model.

use std::sync::Arc;

use tokio::sync::oneshot;

use super::TrialError;
use crate::client::FlagClient;
use crate::config::RunConfiguration;
use crate::trial::{RunSnapshot, RunStatistics};

/// Commands that can be sent to the trial engine actor.
///
/// Each command carries a response channel for the actor to send back
/// results. The actor drains commands only between iterations.
pub enum TrialEngineCommand {
    /// Begin a new run, resetting statistics. No-op while running.
    Start {
        responder: oneshot::Sender<RunSnapshot>,
    },
    /// Stop the current run and report its final statistics.
    Stop {
        responder: oneshot::Sender<RunStatistics>,
    },
    /// Replace the run configuration while idle.
    UpdateConfiguration {
        configuration: RunConfiguration,
        responder: oneshot::Sender<Result<RunSnapshot, TrialError>>,
    },
    /// Make a flag client available to subsequent iterations.
    AttachClient {
        client: Arc<dyn FlagClient>,
        responder: oneshot::Sender<()>,
    },
    /// Get the current run snapshot.
    GetSnapshot {
        responder: oneshot::Sender<RunSnapshot>,
    },
    /// Shutdown the engine actor gracefully.
    Shutdown { responder: oneshot::Sender<()> },
}
