//! CLI command implementations

use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use flagrun_core::config::{FlagrunConfig, RunConfiguration};
use flagrun_core::engine::{TrialEngineHandle, TrialEvent, spawn_trial_engine};
use flagrun_core::trial::variant_name;
use flagrun_core::{FlagrunError, Result, Settings, SettingsStore};
use flagrun_sim::{DEFAULT_FLAG_KEY, SimulatedFlagClient};
use tokio::sync::broadcast;

use crate::dashboard;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run up to 1000 trials against the simulated flag client
    Run(RunArgs),
    /// Show or edit persisted settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Raise the diagnostic error to verify error reporting
    ThrowTestError,
}

/// Options of a single trial run
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Apply the extreme latency range and error rate to Version B
    #[arg(long)]
    pub extreme: bool,
    /// Wait before each trial in milliseconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(100..=2000))]
    pub interval_ms: Option<u64>,
    /// Lower bound of the extreme latency range in milliseconds
    #[arg(long, default_value = "110", value_parser = clap::value_parser!(u64).range(50..=500))]
    pub extreme_latency_min: u64,
    /// Upper bound of the extreme latency range in milliseconds
    #[arg(long, default_value = "120", value_parser = clap::value_parser!(u64).range(50..=500))]
    pub extreme_latency_max: u64,
    /// Error probability in percent for extreme Version B trials
    #[arg(long, default_value = "95", value_parser = clap::value_parser!(u8).range(0..=100))]
    pub extreme_error_rate: u8,
    /// Share of users served Version B by the simulated client
    #[arg(long, default_value = "50", value_parser = clap::value_parser!(u8).range(0..=100))]
    pub rollout: u8,
    /// Seed for reproducible user keys, latencies and errors
    #[arg(long)]
    pub seed: Option<u64>,
    /// Flag evaluated by the simulated client
    #[arg(long, default_value = DEFAULT_FLAG_KEY)]
    pub flag_key: String,
    /// Delay before the simulated client becomes available
    #[arg(long, default_value = "0")]
    pub client_startup_ms: u64,
}

/// Settings subcommands
#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print the effective settings as JSON
    Show,
    /// Change one or more settings
    Set {
        /// Client-side environment identifier
        #[arg(long)]
        client_side_id: Option<String>,
        /// Prefix of generated user keys
        #[arg(long)]
        user_key_prefix: Option<String>,
        /// Event key for the latency metric
        #[arg(long)]
        latency_metric_key: Option<String>,
        /// Event key for the error metric
        #[arg(long)]
        error_metric_key: Option<String>,
    },
    /// Restore default settings
    Reset,
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub async fn handle_command(command: Commands, settings_path: &Path) -> Result<()> {
    let store = SettingsStore::new(settings_path);

    match command {
        Commands::Run(args) => run_trials(args, &store).await,
        Commands::Settings { action } => handle_settings(action, &store),
        Commands::ThrowTestError => throw_test_error(),
    }
}

/// Run trials until the budget is used up or Ctrl-C is pressed
///
/// # Errors
/// - `FlagrunError::Settings` - Settings file cannot be read
/// - `FlagrunError::Trial` - Run configuration is invalid
pub async fn run_trials(args: RunArgs, store: &SettingsStore) -> Result<()> {
    let settings = store.load()?;
    let config = build_config(&args, &settings);

    let handle = spawn_trial_engine(config, None)?;
    let client = SimulatedFlagClient::builder()
        .flag_key(args.flag_key.clone())
        .environment_id(settings.client_side_id.clone())
        .rollout_percent(args.rollout)
        .build();

    attach_client_after(&handle, client.clone(), Duration::from_millis(args.client_startup_ms));

    let events = handle.events();
    tokio::spawn(log_trial_events(events));

    handle.start().await?;
    println!(
        "Running {} against flag '{}' ({}% rollout). Press Ctrl-C to stop.",
        if args.extreme { "in Extreme Mode" } else { "in Normal Mode" },
        args.flag_key,
        args.rollout
    );

    let clear_screen = std::io::stdout().is_terminal();
    let mut snapshots = handle.subscribe();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let stats = loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break handle.latest().stats;
                }
                let snapshot = *snapshots.borrow_and_update();
                if clear_screen {
                    print!("\x1B[2J\x1B[H");
                }
                print!("{}", dashboard::render(&snapshot));
                if !snapshot.is_running {
                    break snapshot.stats;
                }
            }
            _ = &mut ctrl_c => {
                println!("\nStopping after the current trial...");
                break handle.stop().await?;
            }
        }
    };

    let _ = handle.shutdown().await;

    println!("{}", dashboard::render_summary(&stats));
    let client_stats = client.stats();
    println!(
        "Delivered {} events in {} flushes",
        client_stats.events_delivered, client_stats.flushes
    );

    Ok(())
}

/// Show, change or reset persisted settings
///
/// # Errors
/// - `FlagrunError::Settings` - Settings file cannot be read or written
pub fn handle_settings(action: SettingsAction, store: &SettingsStore) -> Result<()> {
    match action {
        SettingsAction::Show => {
            let settings = store.load()?;
            print_settings(&settings, store);
        }
        SettingsAction::Set {
            client_side_id,
            user_key_prefix,
            latency_metric_key,
            error_metric_key,
        } => {
            let mut settings = store.load()?;
            if let Some(value) = client_side_id {
                settings.client_side_id = value;
            }
            if let Some(value) = user_key_prefix {
                settings.user_key_prefix = value;
            }
            if let Some(value) = latency_metric_key {
                settings.latency_metric_key = value;
            }
            if let Some(value) = error_metric_key {
                settings.error_metric_key = value;
            }
            store.save(&settings)?;
            print_settings(&settings, store);
        }
        SettingsAction::Reset => {
            store.reset()?;
            println!("Settings reset to defaults");
            print_settings(&Settings::default(), store);
        }
    }

    Ok(())
}

/// Fail with the diagnostic manual test error
///
/// # Errors
/// - `FlagrunError::ManualTest` - Always
pub fn throw_test_error() -> Result<()> {
    tracing::error!("Manual test error requested");
    Err(FlagrunError::ManualTest)
}

fn build_config(args: &RunArgs, settings: &Settings) -> FlagrunConfig {
    let mut config = FlagrunConfig::from_env();
    settings.apply_to(&mut config);

    config.run = RunConfiguration {
        extreme_mode_enabled: args.extreme,
        interval_ms: args.interval_ms.unwrap_or(config.run.interval_ms),
        extreme_latency_min_ms: args.extreme_latency_min,
        extreme_latency_max_ms: args.extreme_latency_max,
        extreme_error_rate_percent: args.extreme_error_rate,
    };
    if args.seed.is_some() {
        config.engine.seed = args.seed;
    }

    config
}

fn attach_client_after(handle: &TrialEngineHandle, client: SimulatedFlagClient, delay: Duration) {
    let handle = handle.clone();
    tokio::spawn(async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Err(e) = handle.attach_client(Arc::new(client)).await {
            tracing::warn!("Could not attach flag client: {}", e);
        }
    });
}

async fn log_trial_events(mut events: broadcast::Receiver<TrialEvent>) {
    loop {
        match events.recv().await {
            Ok(TrialEvent::VariantChanged { variant }) => {
                tracing::info!("Now serving {}", variant_name(variant));
            }
            Ok(TrialEvent::TrialFailed {
                index,
                user_key,
                reason,
                ..
            }) => {
                tracing::debug!("Trial {} for {} failed: {}", index, user_key, reason);
            }
            Ok(TrialEvent::ClientUnavailable) => {
                tracing::debug!("Waiting for flag client");
            }
            Ok(TrialEvent::RunCompleted { stats }) => {
                tracing::info!(
                    "Completed {} tests with {} errors",
                    stats.completed(),
                    stats.error_count
                );
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::trace!("Event log lagged by {} events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_settings(settings: &Settings, store: &SettingsStore) {
    println!("Settings file: {}", store.path().display());
    match serde_json::to_string_pretty(settings) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::warn!("Could not format settings: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use tempfile::TempDir;

    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[command(subcommand)]
        command: Commands,
    }

    fn parse_run(args: &[&str]) -> RunArgs {
        let argv = ["flagrun", "run"].into_iter().chain(args.iter().copied());
        match TestCli::parse_from(argv).command {
            Commands::Run(run) => run,
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_run_defaults_build_default_configuration() {
        let args = parse_run(&[]);
        let config = build_config(&args, &Settings::default());

        assert!(!config.run.extreme_mode_enabled);
        assert_eq!(config.run.extreme_latency_min_ms, 110);
        assert_eq!(config.run.extreme_latency_max_ms, 120);
        assert_eq!(config.run.extreme_error_rate_percent, 95);
        assert_eq!(args.rollout, 50);
        assert_eq!(args.flag_key, DEFAULT_FLAG_KEY);
    }

    #[test]
    fn test_run_flags_override_configuration() {
        let args = parse_run(&[
            "--extreme",
            "--interval-ms",
            "250",
            "--extreme-latency-min",
            "200",
            "--extreme-latency-max",
            "300",
            "--extreme-error-rate",
            "40",
            "--seed",
            "7",
        ]);
        let settings = Settings {
            user_key_prefix: "qa".to_string(),
            ..Default::default()
        };

        let config = build_config(&args, &settings);

        assert!(config.run.extreme_mode_enabled);
        assert_eq!(config.run.interval_ms, 250);
        assert_eq!(config.run.extreme_latency_min_ms, 200);
        assert_eq!(config.run.extreme_latency_max_ms, 300);
        assert_eq!(config.run.extreme_error_rate_percent, 40);
        assert_eq!(config.engine.seed, Some(7));
        assert_eq!(config.identity.user_key_prefix, "qa");
    }

    #[test]
    fn test_out_of_range_interval_is_rejected() {
        let result = TestCli::try_parse_from(["flagrun", "run", "--interval-ms", "50"]);
        assert!(result.is_err());

        let result = TestCli::try_parse_from(["flagrun", "run", "--extreme-error-rate", "101"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_settings_set_persists_changes() {
        let temp_dir = TempDir::new().unwrap();
        let store = SettingsStore::new(temp_dir.path().join("settings.json"));

        handle_settings(
            SettingsAction::Set {
                client_side_id: Some("env-42".to_string()),
                user_key_prefix: None,
                latency_metric_key: Some("checkout-latency".to_string()),
                error_metric_key: None,
            },
            &store,
        )
        .unwrap();

        let settings = store.load().unwrap();
        assert_eq!(settings.client_side_id, "env-42");
        assert_eq!(settings.latency_metric_key, "checkout-latency");
        assert_eq!(settings.user_key_prefix, "user");

        handle_settings(SettingsAction::Reset, &store).unwrap();
        assert_eq!(store.load().unwrap(), Settings::default());
    }

    #[test]
    fn test_throw_test_error() {
        let error = throw_test_error().unwrap_err();
        assert_eq!(error.to_string(), "Manual test error triggered");
    }
}
