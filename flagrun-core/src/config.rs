//! Centralized configuration for flagrun.
//!
//! All tunable parameters and trial constants are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::ops::RangeInclusive;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::TrialError;

/// Maximum number of completed trials in a single run.
pub const TRIAL_BUDGET: u64 = 1000;

/// Latency range applied whenever extreme mode does not apply.
pub const BASELINE_LATENCY_MS: RangeInclusive<u64> = 110..=130;

/// Error probability applied whenever extreme mode does not apply.
pub const BASELINE_ERROR_RATE_PERCENT: u8 = 5;

/// Largest accepted bound of the extreme latency range.
pub const MAX_EXTREME_LATENCY_MS: u64 = 500;

/// Central configuration for all flagrun components.
///
/// Groups related configuration settings into logical sections.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct FlagrunConfig {
    pub run: RunConfiguration,
    pub identity: IdentityConfig,
    pub metrics: MetricsConfig,
    pub engine: EngineConfig,
}

/// Parameters of a single trial run.
///
/// Only editable while the engine is idle. Extreme mode parameters apply
/// exclusively to trials whose evaluated variant is `true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfiguration {
    /// Use the extreme latency range and error rate for Version B trials
    pub extreme_mode_enabled: bool,
    /// Wait before each trial iteration in milliseconds
    pub interval_ms: u64,
    /// Lower bound of the extreme latency range (inclusive)
    pub extreme_latency_min_ms: u64,
    /// Upper bound of the extreme latency range (inclusive)
    pub extreme_latency_max_ms: u64,
    /// Error probability in percent for extreme Version B trials
    pub extreme_error_rate_percent: u8,
}

impl Default for RunConfiguration {
    fn default() -> Self {
        Self {
            extreme_mode_enabled: false,
            interval_ms: 500,
            extreme_latency_min_ms: 110,
            extreme_latency_max_ms: 120,
            extreme_error_rate_percent: 95,
        }
    }
}

impl RunConfiguration {
    /// Checks the structural invariants of the configuration.
    ///
    /// # Errors
    /// - `TrialError::InvalidConfiguration` - Latency bounds are inverted,
    ///   the upper bound exceeds `MAX_EXTREME_LATENCY_MS` or the error rate
    ///   exceeds 100 percent
    pub fn validate(&self) -> Result<(), TrialError> {
        if self.extreme_latency_min_ms > self.extreme_latency_max_ms {
            return Err(TrialError::InvalidConfiguration {
                reason: format!(
                    "extreme latency min {}ms exceeds max {}ms",
                    self.extreme_latency_min_ms, self.extreme_latency_max_ms
                ),
            });
        }

        if self.extreme_latency_max_ms > MAX_EXTREME_LATENCY_MS {
            return Err(TrialError::InvalidConfiguration {
                reason: format!(
                    "extreme latency max {}ms is above {}ms",
                    self.extreme_latency_max_ms, MAX_EXTREME_LATENCY_MS
                ),
            });
        }

        if self.extreme_error_rate_percent > 100 {
            return Err(TrialError::InvalidConfiguration {
                reason: format!(
                    "extreme error rate {}% is above 100%",
                    self.extreme_error_rate_percent
                ),
            });
        }

        Ok(())
    }

    /// Wait applied before each iteration.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Whether the extreme parameter set applies to a trial with `variant`.
    pub fn applies_extreme(&self, variant: bool) -> bool {
        self.extreme_mode_enabled && variant
    }

    /// Latency range used for a trial with `variant`.
    pub fn latency_range(&self, variant: bool) -> RangeInclusive<u64> {
        if self.applies_extreme(variant) {
            self.extreme_latency_min_ms..=self.extreme_latency_max_ms
        } else {
            BASELINE_LATENCY_MS
        }
    }

    /// Error probability in percent used for a trial with `variant`.
    pub fn error_rate_percent(&self, variant: bool) -> u8 {
        if self.applies_extreme(variant) {
            self.extreme_error_rate_percent
        } else {
            BASELINE_ERROR_RATE_PERCENT
        }
    }
}

/// Identity generation for simulated users.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// Prefix of every generated user key
    pub user_key_prefix: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            user_key_prefix: "user".to_string(),
        }
    }
}

/// Event keys for the metrics recorded through the flag client.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Event key for the per-trial latency metric
    pub latency_event_key: String,
    /// Event key for the simulated error metric
    pub error_event_key: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            latency_event_key: "flight-status-latency".to_string(),
            error_event_key: "Flight Status Error".to_string(),
        }
    }
}

/// Engine actor plumbing.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Capacity of the command channel
    pub command_buffer: usize,
    /// Capacity of the trial event broadcast channel
    pub event_buffer: usize,
    /// Deterministic seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command_buffer: 100,
            event_buffer: 256,
            seed: None,
        }
    }
}

impl FlagrunConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(interval) = std::env::var("FLAGRUN_INTERVAL_MS") {
            if let Ok(ms) = interval.parse::<u64>() {
                config.run.interval_ms = ms;
            }
        }

        if let Ok(seed) = std::env::var("FLAGRUN_SEED") {
            if let Ok(seed_value) = seed.parse::<u64>() {
                config.engine.seed = Some(seed_value);
            }
        }

        config
    }

    /// Creates a configuration for deterministic tests.
    pub fn for_testing() -> Self {
        Self {
            engine: EngineConfig {
                seed: Some(42),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}
