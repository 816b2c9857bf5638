//! Flagrun Core - Feature flag regression trial runner
//!
//! Drives a flag evaluation client through a fixed budget of randomized
//! trials, simulating downstream latency and failures per variant, and
//! accumulates the outcome distribution for live display.

pub mod client;
pub mod config;
pub mod engine;
pub mod settings;
pub mod tracing_setup;
pub mod trial;

// Re-export main types for convenient access
pub use client::{FlagClient, FlagClientError, FlagUser};
pub use config::{FlagrunConfig, RunConfiguration, TRIAL_BUDGET};
pub use engine::{TrialEngineHandle, TrialError, TrialEvent, spawn_trial_engine};
pub use settings::{Settings, SettingsError, SettingsStore};
pub use trial::{RunSnapshot, RunStatistics, TrialOutcome};

/// Message carried by the operator-triggered diagnostic error.
pub const MANUAL_TEST_ERROR_MESSAGE: &str = "Manual test error triggered";

/// Errors that can bubble up from any flagrun subsystem.
#[derive(Debug, thiserror::Error)]
pub enum FlagrunError {
    #[error("Trial engine error: {0}")]
    Trial(#[from] TrialError),

    #[error("Flag client error: {0}")]
    Client(#[from] FlagClientError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Diagnostic fault raised on operator request, never by the trial loop.
    #[error("Manual test error triggered")]
    ManualTest,
}

impl FlagrunError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            FlagrunError::Trial(e) => match e {
                TrialError::ConfigurationLocked => {
                    "Stop the running test before changing its configuration".to_string()
                }
                TrialError::InvalidConfiguration { reason } => {
                    format!("Invalid test configuration: {reason}")
                }
                TrialError::EngineShutdown => "The test runner has shut down".to_string(),
            },
            FlagrunError::Client(_) => "Flag client error occurred".to_string(),
            FlagrunError::Settings(e) => format!("Could not access settings: {e}"),
            FlagrunError::Io(_) => "File system error occurred".to_string(),
            FlagrunError::ManualTest => MANUAL_TEST_ERROR_MESSAGE.to_string(),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            FlagrunError::Trial(TrialError::InvalidConfiguration { .. })
                | FlagrunError::Trial(TrialError::ConfigurationLocked)
                | FlagrunError::Settings(SettingsError::Malformed { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, FlagrunError>;
