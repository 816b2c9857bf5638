//! Trial model, accumulator and run state machine.

pub mod model;
pub mod rng;
pub mod state;
pub mod stats;

pub use model::{
    error_rate_label, latency_target_label, sample_is_error, sample_latency, variant_name,
    variant_tag,
};
#[cfg(any(test, feature = "test-utils"))]
pub use rng::FixedUniform;
pub use rng::{TrialRng, UniformSource};
pub use state::{RunPhase, RunSnapshot, RunState, Transition};
pub use stats::{RunStatistics, TrialOutcome};
