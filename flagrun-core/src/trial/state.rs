//! Run state machine expressed as a pure reducer.
//!
//! The engine actor is the only caller of [`RunState::reduce`]; every other
//! component observes the resulting [`RunSnapshot`].

use serde::{Deserialize, Serialize};

use super::stats::{RunStatistics, TrialOutcome};
use crate::config::RunConfiguration;

/// Whether a run is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    Idle,
    Running,
}

/// Input to the run state reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Operator started a run
    Started,
    /// One trial iteration finished
    TrialCompleted(TrialOutcome),
    /// Operator stopped the run
    Stopped,
    /// Operator edited the run configuration
    ConfigurationUpdated(RunConfiguration),
}

/// Complete state owned by the trial engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    pub phase: RunPhase,
    pub stats: RunStatistics,
    pub configuration: RunConfiguration,
    /// Variant evaluated by the most recent trial
    pub last_variant: Option<bool>,
}

impl RunState {
    /// Creates an idle state with empty statistics.
    pub fn new(configuration: RunConfiguration) -> Self {
        Self {
            phase: RunPhase::Idle,
            stats: RunStatistics::default(),
            configuration,
            last_variant: None,
        }
    }

    /// Returns true while a run is in progress.
    pub fn is_running(&self) -> bool {
        self.phase == RunPhase::Running
    }

    /// Applies a transition and returns the next state.
    ///
    /// Statistics reset on `Started`, grow only while running and freeze
    /// once the run stops. A trial that exhausts the budget moves the run
    /// back to idle. Configuration edits are ignored while running.
    #[must_use]
    pub fn reduce(self, transition: Transition) -> Self {
        match (self.phase, transition) {
            (RunPhase::Idle, Transition::Started) => Self {
                phase: RunPhase::Running,
                stats: RunStatistics::default(),
                ..self
            },
            (RunPhase::Running, Transition::TrialCompleted(outcome))
                if !self.stats.is_budget_exhausted() =>
            {
                let stats = self.stats.apply(&outcome);
                let phase = if stats.is_budget_exhausted() {
                    RunPhase::Idle
                } else {
                    RunPhase::Running
                };
                Self {
                    phase,
                    stats,
                    last_variant: Some(outcome.variant),
                    ..self
                }
            }
            (RunPhase::Running, Transition::Stopped) => Self {
                phase: RunPhase::Idle,
                ..self
            },
            (RunPhase::Idle, Transition::ConfigurationUpdated(configuration)) => Self {
                configuration,
                ..self
            },
            _ => self,
        }
    }

    /// Read-only view for presentation layers.
    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            is_running: self.is_running(),
            stats: self.stats,
            average_latency_ms: self.stats.average_latency_ms(),
            last_variant: self.last_variant,
            configuration: self.configuration,
        }
    }
}

/// Snapshot published after every state change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    pub is_running: bool,
    pub stats: RunStatistics,
    pub average_latency_ms: u64,
    pub last_variant: Option<bool>,
    pub configuration: RunConfiguration,
}

impl Default for RunSnapshot {
    fn default() -> Self {
        RunState::new(RunConfiguration::default()).snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TRIAL_BUDGET;

    fn success(variant: bool) -> Transition {
        Transition::TrialCompleted(TrialOutcome {
            variant,
            latency_ms: 120,
            is_error: false,
        })
    }

    #[test]
    fn test_start_resets_statistics() {
        let state = RunState::new(RunConfiguration::default())
            .reduce(Transition::Started)
            .reduce(success(true))
            .reduce(Transition::Stopped);
        assert_eq!(state.stats.completed(), 1);

        let restarted = state.reduce(Transition::Started);
        assert!(restarted.is_running());
        assert_eq!(restarted.stats, RunStatistics::default());
    }

    #[test]
    fn test_trials_ignored_while_idle() {
        let state = RunState::new(RunConfiguration::default()).reduce(success(false));

        assert_eq!(state.stats.completed(), 0);
        assert_eq!(state.last_variant, None);
    }

    #[test]
    fn test_budget_exhaustion_returns_to_idle() {
        let mut state = RunState::new(RunConfiguration::default()).reduce(Transition::Started);

        for i in 0..TRIAL_BUDGET {
            assert!(state.is_running(), "stopped early at trial {i}");
            state = state.reduce(success(i % 2 == 0));
        }

        assert!(!state.is_running());
        assert_eq!(state.stats.completed(), TRIAL_BUDGET);

        let frozen = state.clone().reduce(success(true));
        assert_eq!(frozen.stats.completed(), TRIAL_BUDGET);
    }

    #[test]
    fn test_configuration_locked_while_running() {
        let edited = RunConfiguration {
            extreme_mode_enabled: true,
            ..Default::default()
        };

        let running = RunState::new(RunConfiguration::default())
            .reduce(Transition::Started)
            .reduce(Transition::ConfigurationUpdated(edited));
        assert!(!running.configuration.extreme_mode_enabled);

        let idle = running
            .reduce(Transition::Stopped)
            .reduce(Transition::ConfigurationUpdated(edited));
        assert!(idle.configuration.extreme_mode_enabled);
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let state = RunState::new(RunConfiguration::default())
            .reduce(Transition::Started)
            .reduce(success(true));

        let snapshot = state.snapshot();
        assert!(snapshot.is_running);
        assert_eq!(snapshot.stats.true_count, 1);
        assert_eq!(snapshot.average_latency_ms, 120);
        assert_eq!(snapshot.last_variant, Some(true));
    }
}
