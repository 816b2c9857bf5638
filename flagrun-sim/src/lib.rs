//! Flagrun Sim - Simulated flag evaluation environment
//!
//! Provides a [`SimulatedFlagClient`] that implements the core
//! [`flagrun_core::FlagClient`] seam without any network access, so trial
//! runs can be driven end to end locally and in tests.

pub mod bucketing;
pub mod client;

pub use bucketing::{bucket, in_rollout};
pub use client::{
    DEFAULT_FLAG_KEY, SimulatedFlagClient, SimulatedFlagClientBuilder, SimulationStats,
    TrackedEvent,
};
