//! End to end runs of the trial engine against the simulated flag client.

use std::sync::Arc;
use std::time::Duration;

use flagrun_core::config::{FlagrunConfig, RunConfiguration, TRIAL_BUDGET};
use flagrun_core::engine::spawn_trial_engine;
use flagrun_sim::SimulatedFlagClient;
use tokio_test::assert_ok;

fn fast_config() -> FlagrunConfig {
    let mut config = FlagrunConfig::for_testing();
    config.run = RunConfiguration {
        interval_ms: 100,
        ..Default::default()
    };
    config
}

#[tokio::test(start_paused = true)]
async fn test_full_run_delivers_every_latency_metric() {
    let client = SimulatedFlagClient::builder()
        .environment_id("test-env")
        .rollout_percent(50)
        .build();
    let handle = spawn_trial_engine(fast_config(), Some(Arc::new(client.clone()))).unwrap();

    assert_ok!(handle.start().await);
    let snapshot = handle.wait_until_idle().await.unwrap();

    assert_eq!(snapshot.stats.completed(), TRIAL_BUDGET);
    assert_eq!(client.pending_count(), 0);

    let latency_events = client
        .delivered_events()
        .into_iter()
        .filter(|event| event.event_key == "flight-status-latency")
        .count() as u64;
    assert_eq!(latency_events, TRIAL_BUDGET);

    let error_events = client
        .delivered_events()
        .into_iter()
        .filter(|event| event.event_key == "Flight Status Error")
        .count() as u64;
    assert_eq!(error_events, snapshot.stats.error_count);

    // Both variants show up under a 50% rollout
    assert!(snapshot.stats.true_count > 0);
    assert!(snapshot.stats.false_count > 0);
}

#[tokio::test(start_paused = true)]
async fn test_full_rollout_only_counts_version_b() {
    let client = SimulatedFlagClient::builder().rollout_percent(100).build();
    let handle = spawn_trial_engine(fast_config(), Some(Arc::new(client))).unwrap();

    assert_ok!(handle.start().await);
    tokio::time::sleep(Duration::from_secs(5)).await;
    let stats = handle.stop().await.unwrap();

    assert!(stats.completed() > 0);
    assert_eq!(stats.false_count, 0);
    assert_eq!(stats.true_count, stats.completed());
}

#[tokio::test(start_paused = true)]
async fn test_offline_client_counts_every_trial_as_error() {
    let client = SimulatedFlagClient::builder().offline(true).build();
    let handle = spawn_trial_engine(fast_config(), Some(Arc::new(client.clone()))).unwrap();

    assert_ok!(handle.start().await);
    tokio::time::sleep(Duration::from_secs(3)).await;
    let stats = handle.stop().await.unwrap();

    assert!(stats.completed() > 0);
    assert_eq!(stats.error_count, stats.completed());
    assert!(client.delivered_events().is_empty());
}
