//! Notifications broadcast by the trial engine.

use crate::config::RunConfiguration;
use crate::trial::RunStatistics;

/// One-way notifications for presentation layers.
///
/// Delivered over a broadcast channel; slow subscribers may miss events but
/// can always recover the full picture from the latest snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum TrialEvent {
    /// A run started with the given configuration.
    RunStarted { configuration: RunConfiguration },
    /// The evaluated variant differs from the previous trial's.
    VariantChanged { variant: bool },
    /// A trial completed without a simulated or client failure.
    TrialSucceeded {
        index: u64,
        user_key: String,
        variant: bool,
        latency_ms: u64,
    },
    /// A trial completed with a failure. It still counts for its variant.
    TrialFailed {
        index: u64,
        user_key: String,
        variant: bool,
        reason: String,
    },
    /// A scheduled iteration was skipped because no flag client is attached.
    ClientUnavailable,
    /// The run used up its trial budget.
    RunCompleted { stats: RunStatistics },
    /// The run was stopped by the operator.
    RunStopped { stats: RunStatistics },
}
