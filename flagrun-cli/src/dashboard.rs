//! Terminal rendering of run snapshots

use std::fmt::Write;

use flagrun_core::TRIAL_BUDGET;
use flagrun_core::trial::{
    RunSnapshot, RunStatistics, error_rate_label, latency_target_label, variant_name,
};

const BAR_WIDTH: usize = 40;

/// Renders the full dashboard for one snapshot.
pub fn render(snapshot: &RunSnapshot) -> String {
    let stats = &snapshot.stats;
    let configuration = &snapshot.configuration;
    let mut out = String::new();

    let state = if snapshot.is_running {
        "Running"
    } else {
        "Idle"
    };
    let _ = writeln!(out, "Test Results Distribution [{state}]");
    let _ = writeln!(out, "{:-<60}", "");

    let scale = stats.true_count.max(stats.false_count);
    let _ = writeln!(
        out,
        "True (Version B)   {} {}",
        bar(stats.true_count, scale),
        stats.true_count
    );
    let _ = writeln!(
        out,
        "False (Version A)  {} {}",
        bar(stats.false_count, scale),
        stats.false_count
    );
    let _ = writeln!(out);

    let _ = writeln!(
        out,
        "Progress:        {}/{} ({:.1}%)",
        stats.completed(),
        TRIAL_BUDGET,
        stats.progress() * 100.0
    );
    let _ = writeln!(
        out,
        "Error Rate:      {} ({} total errors)",
        format_error_rate(stats),
        stats.error_count
    );
    let _ = writeln!(
        out,
        "Expected Errors: {}",
        error_rate_label(snapshot.last_variant.unwrap_or(false), configuration)
    );
    let _ = writeln!(
        out,
        "Average Latency: {}ms (target: {})",
        snapshot.average_latency_ms,
        latency_target_label(configuration)
    );

    let variant = snapshot
        .last_variant
        .map_or("Waiting for first trial", variant_name);
    let mode = if configuration.extreme_mode_enabled {
        "Extreme Mode"
    } else {
        "Normal Mode"
    };
    let _ = writeln!(out, "Current Status:  {variant} ({mode})");

    out
}

/// Short report printed after a run ends.
pub fn render_summary(stats: &RunStatistics) -> String {
    format!(
        "Completed {} tests with {} errors (error rate {}, average latency {}ms)",
        stats.completed(),
        stats.error_count,
        format_error_rate(stats),
        stats.average_latency_ms()
    )
}

/// Error rate with one decimal, "0.0%" before the first trial.
pub fn format_error_rate(stats: &RunStatistics) -> String {
    format!("{:.1}%", stats.error_rate_percent())
}

fn bar(count: u64, scale: u64) -> String {
    let filled = if scale == 0 {
        0
    } else {
        (count as f64 / scale as f64 * BAR_WIDTH as f64).round() as usize
    };
    format!("{}{}", "#".repeat(filled), ".".repeat(BAR_WIDTH - filled))
}

#[cfg(test)]
mod tests {
    use flagrun_core::RunConfiguration;

    use super::*;

    fn snapshot_with(stats: RunStatistics, configuration: RunConfiguration) -> RunSnapshot {
        RunSnapshot {
            is_running: true,
            stats,
            average_latency_ms: stats.average_latency_ms(),
            last_variant: Some(true),
            configuration,
        }
    }

    #[test]
    fn test_empty_snapshot_renders_zeroes() {
        let output = render(&RunSnapshot::default());

        assert!(output.contains("Progress:        0/1000"));
        assert!(output.contains("Error Rate:      0.0% (0 total errors)"));
        assert!(output.contains("Average Latency: 0ms (target: 110-130ms)"));
        assert!(output.contains("Waiting for first trial (Normal Mode)"));
    }

    #[test]
    fn test_running_snapshot_shows_counts_and_mode() {
        let stats = RunStatistics {
            true_count: 30,
            false_count: 10,
            error_count: 3,
            total_latency_ms: 40 * 125,
        };
        let configuration = RunConfiguration {
            extreme_mode_enabled: true,
            extreme_latency_min_ms: 200,
            extreme_latency_max_ms: 250,
            ..Default::default()
        };

        let output = render(&snapshot_with(stats, configuration));

        assert!(output.contains("[Running]"));
        assert!(output.contains("Progress:        40/1000 (4.0%)"));
        assert!(output.contains("Error Rate:      7.5% (3 total errors)"));
        assert!(output.contains("Average Latency: 125ms (target: 200-250ms)"));
        assert!(output.contains("Version B (Extreme Mode)"));
    }

    #[test]
    fn test_expected_error_rate_follows_served_variant() {
        let configuration = RunConfiguration {
            extreme_mode_enabled: true,
            extreme_error_rate_percent: 80,
            ..Default::default()
        };
        let mut snapshot = snapshot_with(RunStatistics::default(), configuration);

        let output = render(&snapshot);
        assert!(output.contains("Expected Errors: 80% (Version B - extreme)"));

        snapshot.last_variant = Some(false);
        let output = render(&snapshot);
        assert!(output.contains("Expected Errors: 5% (Standard error rate)"));

        let output = render(&RunSnapshot::default());
        assert!(output.contains("Expected Errors: 5% (Standard error rate)"));
    }

    #[test]
    fn test_bar_is_scaled_to_larger_count() {
        assert_eq!(bar(10, 10), "#".repeat(BAR_WIDTH));
        assert_eq!(bar(5, 10).matches('#').count(), BAR_WIDTH / 2);
        assert_eq!(bar(0, 0), ".".repeat(BAR_WIDTH));
    }

    #[test]
    fn test_summary_line() {
        let stats = RunStatistics {
            true_count: 500,
            false_count: 500,
            error_count: 50,
            total_latency_ms: 120_000,
        };

        assert_eq!(
            render_summary(&stats),
            "Completed 1000 tests with 50 errors (error rate 5.0%, average latency 120ms)"
        );
    }
}
