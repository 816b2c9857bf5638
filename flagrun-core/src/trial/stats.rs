//! Trial outcomes and the running statistics folded from them.

use serde::{Deserialize, Serialize};

use crate::config::TRIAL_BUDGET;

/// Result of a single completed trial iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialOutcome {
    /// Evaluated flag variant
    pub variant: bool,
    /// Simulated latency in milliseconds
    pub latency_ms: u64,
    /// Whether the simulated downstream call failed
    pub is_error: bool,
}

/// Running counters for a trial run.
///
/// Errored trials still count towards their variant and their latency
/// still feeds the average.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatistics {
    pub true_count: u64,
    pub false_count: u64,
    pub error_count: u64,
    pub total_latency_ms: u64,
}

impl RunStatistics {
    /// Folds one outcome into the counters.
    #[must_use]
    pub fn apply(self, outcome: &TrialOutcome) -> Self {
        let (true_count, false_count) = if outcome.variant {
            (self.true_count + 1, self.false_count)
        } else {
            (self.true_count, self.false_count + 1)
        };

        Self {
            true_count,
            false_count,
            error_count: self.error_count + u64::from(outcome.is_error),
            total_latency_ms: self.total_latency_ms + outcome.latency_ms,
        }
    }

    /// Combines counters accumulated over disjoint batches of outcomes.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            true_count: self.true_count + other.true_count,
            false_count: self.false_count + other.false_count,
            error_count: self.error_count + other.error_count,
            total_latency_ms: self.total_latency_ms + other.total_latency_ms,
        }
    }

    /// Number of completed trials.
    pub fn completed(&self) -> u64 {
        self.true_count + self.false_count
    }

    /// Rounded mean latency, or 0 before the first trial.
    pub fn average_latency_ms(&self) -> u64 {
        let completed = self.completed();
        if completed == 0 {
            return 0;
        }
        (self.total_latency_ms as f64 / completed as f64).round() as u64
    }

    /// Share of errored trials in percent, or 0.0 before the first trial.
    pub fn error_rate_percent(&self) -> f64 {
        let completed = self.completed();
        if completed == 0 {
            return 0.0;
        }
        self.error_count as f64 / completed as f64 * 100.0
    }

    /// Progress towards the trial budget (0.0 to 1.0).
    pub fn progress(&self) -> f64 {
        (self.completed() as f64 / TRIAL_BUDGET as f64).min(1.0)
    }

    /// Whether the run has used up its trial budget.
    pub fn is_budget_exhausted(&self) -> bool {
        self.completed() >= TRIAL_BUDGET
    }
}

impl FromIterator<TrialOutcome> for RunStatistics {
    fn from_iter<I: IntoIterator<Item = TrialOutcome>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::default(), |stats, outcome| stats.apply(&outcome))
    }
}
