//! Trial engine built on the actor model.
//!
//! A single task owns the run state and executes trial iterations strictly
//! sequentially. Callers interact through a cloneable [`TrialEngineHandle`];
//! commands are only processed between iterations, so a stop request never
//! interrupts an iteration that is already in flight.

pub mod actor;
pub mod commands;
pub mod core;
pub mod events;
pub mod handle;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_mocks;

pub use actor::spawn_trial_engine;
pub use commands::TrialEngineCommand;
pub use self::core::TrialEngine;
pub use events::TrialEvent;
pub use handle::TrialEngineHandle;
#[cfg(any(test, feature = "test-utils"))]
pub use test_mocks::{ClientCall, RecordingFlagClient};

/// Errors returned by the trial engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrialError {
    #[error("Trial engine has shut down")]
    EngineShutdown,

    #[error("Run configuration cannot change while a run is active")]
    ConfigurationLocked,

    #[error("Invalid run configuration: {reason}")]
    InvalidConfiguration { reason: String },
}
