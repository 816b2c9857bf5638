//! Probabilistic latency and error model for a single trial.
//!
//! Both samplers are pure functions of the evaluated variant, the run
//! configuration and one draw from a [`UniformSource`].

use super::rng::UniformSource;
use crate::config::RunConfiguration;

/// Samples a simulated downstream latency in milliseconds.
///
/// The result is a uniform integer in the closed range returned by
/// [`RunConfiguration::latency_range`].
pub fn sample_latency(
    variant: bool,
    config: &RunConfiguration,
    source: &mut impl UniformSource,
) -> u64 {
    let range = config.latency_range(variant);
    let (min, max) = (*range.start(), *range.end());
    if min >= max {
        return min;
    }

    // Width stays in u64 even for the full range; the float cast saturates
    let width = max - min;
    let offset = (source.next_unit() * (width as f64 + 1.0)).floor() as u64;
    min + offset.min(width)
}

/// Samples whether the simulated downstream call fails.
pub fn sample_is_error(
    variant: bool,
    config: &RunConfiguration,
    source: &mut impl UniformSource,
) -> bool {
    let rate = f64::from(config.error_rate_percent(variant));
    source.next_unit() * 100.0 < rate
}

/// Human-readable error rate for the variant currently being served.
pub fn error_rate_label(variant: bool, config: &RunConfiguration) -> String {
    if config.applies_extreme(variant) {
        format!(
            "{}% (Version B - extreme)",
            config.extreme_error_rate_percent
        )
    } else {
        format!("{}% (Standard error rate)", config.error_rate_percent(false))
    }
}

/// Target latency range shown next to the measured average.
pub fn latency_target_label(config: &RunConfiguration) -> String {
    let range = if config.extreme_mode_enabled {
        config.latency_range(true)
    } else {
        config.latency_range(false)
    };
    format!("{}-{}ms", range.start(), range.end())
}

/// Display name of a variant.
pub fn variant_name(variant: bool) -> &'static str {
    if variant { "Version B" } else { "Version A" }
}

/// Single-letter variant tag used in tracked event payloads.
pub fn variant_tag(variant: bool) -> &'static str {
    if variant { "B" } else { "A" }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::config::BASELINE_LATENCY_MS;
    use crate::trial::rng::{FixedUniform, TrialRng};

    fn extreme_config(min: u64, max: u64, rate: u8) -> RunConfiguration {
        RunConfiguration {
            extreme_mode_enabled: true,
            extreme_latency_min_ms: min,
            extreme_latency_max_ms: max,
            extreme_error_rate_percent: rate,
            ..Default::default()
        }
    }

    #[test]
    fn test_latency_extremes_of_baseline_range() {
        let config = RunConfiguration::default();

        let low = sample_latency(false, &config, &mut FixedUniform::constant(0.0));
        let high = sample_latency(false, &config, &mut FixedUniform::constant(0.999_999));

        assert_eq!(low, 110);
        assert_eq!(high, 130);
    }

    #[test]
    fn test_latency_within_extreme_range_for_version_b() {
        let config = extreme_config(110, 120, 0);
        let mut rng = TrialRng::from_seed(3);

        for _ in 0..1000 {
            let latency = sample_latency(true, &config, &mut rng);
            assert!((110..=120).contains(&latency));
        }
    }

    #[test]
    fn test_version_a_ignores_extreme_range() {
        let config = extreme_config(400, 500, 100);
        let mut rng = TrialRng::from_seed(4);

        for _ in 0..1000 {
            let latency = sample_latency(false, &config, &mut rng);
            assert!(BASELINE_LATENCY_MS.contains(&latency));
        }
    }

    #[test]
    fn test_full_extreme_error_rate_always_fails_version_b() {
        let config = extreme_config(110, 120, 100);
        let mut rng = TrialRng::from_seed(5);

        for _ in 0..1000 {
            assert!(sample_is_error(true, &config, &mut rng));
        }
    }

    #[test]
    fn test_zero_extreme_error_rate_never_fails_version_b() {
        let config = extreme_config(110, 120, 0);
        let mut rng = TrialRng::from_seed(6);

        for _ in 0..1000 {
            assert!(!sample_is_error(true, &config, &mut rng));
        }
    }

    #[test]
    fn test_baseline_error_threshold() {
        let config = RunConfiguration::default();

        assert!(sample_is_error(false, &config, &mut FixedUniform::constant(0.049)));
        assert!(!sample_is_error(false, &config, &mut FixedUniform::constant(0.05)));
    }

    #[test]
    fn test_full_u64_range_does_not_overflow() {
        let config = extreme_config(0, u64::MAX, 0);

        for sample in [0.0, 0.5, 0.999_999] {
            let latency = sample_latency(true, &config, &mut FixedUniform::constant(sample));
            assert!(config.latency_range(true).contains(&latency));
        }
        assert_eq!(
            sample_latency(true, &config, &mut FixedUniform::constant(0.0)),
            0
        );
    }

    #[test]
    fn test_labels() {
        let config = extreme_config(200, 300, 95);

        assert_eq!(error_rate_label(true, &config), "95% (Version B - extreme)");
        assert_eq!(error_rate_label(false, &config), "5% (Standard error rate)");
        assert_eq!(latency_target_label(&config), "200-300ms");
        assert_eq!(
            latency_target_label(&RunConfiguration::default()),
            "110-130ms"
        );
        assert_eq!(variant_name(true), "Version B");
        assert_eq!(variant_tag(false), "A");
    }

    proptest! {
        #[test]
        fn latency_always_within_applicable_interval(
            extreme in any::<bool>(),
            variant in any::<bool>(),
            min in 50u64..=500,
            width in 0u64..=450,
            sample in 0.0f64..1.0,
        ) {
            let config = RunConfiguration {
                extreme_mode_enabled: extreme,
                extreme_latency_min_ms: min,
                extreme_latency_max_ms: min + width,
                ..Default::default()
            };

            let latency = sample_latency(variant, &config, &mut FixedUniform::constant(sample));
            prop_assert!(config.latency_range(variant).contains(&latency));
        }
    }
}
