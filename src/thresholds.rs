//! Acceptable and ideal ranges for each monitored weather variable.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Verdict;

/// Slack applied to every bound so that a value sitting on a configured edge
/// (after float round-off) lands in the more favorable bucket.
pub const BOUNDARY_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Error)]
pub enum ThresholdError {
    #[error(
        "{variable}: bounds must satisfy acceptable_low <= ideal_low <= ideal_high \
         <= acceptable_high (got {acceptable_low}, {ideal_low}, {ideal_high}, {acceptable_high})"
    )]
    OutOfOrder {
        variable: &'static str,
        acceptable_low: f64,
        ideal_low: f64,
        ideal_high: f64,
        acceptable_high: f64,
    },

    #[error("{variable}: bounds must be numbers, not NaN")]
    NotANumber { variable: &'static str },

    #[error("failed to read threshold file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse threshold file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize thresholds: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConditionThreshold {
    pub acceptable_low: f64,
    pub acceptable_high: f64,
    pub ideal_low: f64,
    pub ideal_high: f64,
}

impl ConditionThreshold {
    /// Builds a threshold, rejecting NaN bounds and bounds that are not
    /// nested as `acceptable_low <= ideal_low <= ideal_high <= acceptable_high`.
    pub fn new(
        variable: &'static str,
        acceptable_low: f64,
        acceptable_high: f64,
        ideal_low: f64,
        ideal_high: f64,
    ) -> Result<Self, ThresholdError> {
        let threshold = Self {
            acceptable_low,
            acceptable_high,
            ideal_low,
            ideal_high,
        };
        threshold.validate(variable)?;
        Ok(threshold)
    }

    fn validate(&self, variable: &'static str) -> Result<(), ThresholdError> {
        let bounds = [
            self.acceptable_low,
            self.ideal_low,
            self.ideal_high,
            self.acceptable_high,
        ];
        if bounds.iter().any(|bound| bound.is_nan()) {
            return Err(ThresholdError::NotANumber { variable });
        }
        if !bounds.windows(2).all(|pair| pair[0] <= pair[1]) {
            return Err(ThresholdError::OutOfOrder {
                variable,
                acceptable_low: self.acceptable_low,
                ideal_low: self.ideal_low,
                ideal_high: self.ideal_high,
                acceptable_high: self.acceptable_high,
            });
        }
        Ok(())
    }

    /// Classifies an observed value. Bounds are inclusive toward the better
    /// bucket: a value exactly on `acceptable_low` is Acceptable and a value
    /// exactly on `ideal_high` is Ideal. A missing value is `Unknown`.
    pub fn assess(&self, value: Option<f64>) -> Verdict {
        let Some(value) = value.filter(|v| !v.is_nan()) else {
            return Verdict::Unknown;
        };

        if value < self.acceptable_low - BOUNDARY_TOLERANCE
            || value > self.acceptable_high + BOUNDARY_TOLERANCE
        {
            Verdict::Unacceptable
        } else if value < self.ideal_low - BOUNDARY_TOLERANCE
            || value > self.ideal_high + BOUNDARY_TOLERANCE
        {
            Verdict::Acceptable
        } else {
            Verdict::Ideal
        }
    }
}

/// The full set of thresholds a forecast is scored against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdConfig {
    pub temperature: ConditionThreshold,
    pub humidity: ConditionThreshold,
    pub precipitation: ConditionThreshold,
    /// Left out of scoring entirely when not configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dewpoint: Option<ConditionThreshold>,
}

/// Bounds as written in a threshold file, before they are checked.
#[derive(Debug, Deserialize)]
struct BoundsFile {
    acceptable_low: f64,
    acceptable_high: f64,
    ideal_low: f64,
    ideal_high: f64,
}

impl BoundsFile {
    fn build(self, variable: &'static str) -> Result<ConditionThreshold, ThresholdError> {
        ConditionThreshold::new(
            variable,
            self.acceptable_low,
            self.acceptable_high,
            self.ideal_low,
            self.ideal_high,
        )
    }
}

#[derive(Debug, Deserialize)]
struct ThresholdFile {
    temperature: BoundsFile,
    humidity: BoundsFile,
    precipitation: BoundsFile,
    #[serde(default)]
    dewpoint: Option<BoundsFile>,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            temperature: ConditionThreshold {
                acceptable_low: 30.0,
                acceptable_high: 80.0,
                ideal_low: 40.0,
                ideal_high: 65.0,
            },
            humidity: ConditionThreshold {
                acceptable_low: 0.0,
                acceptable_high: 70.0,
                ideal_low: 0.0,
                ideal_high: 50.0,
            },
            precipitation: ConditionThreshold {
                acceptable_low: 0.0,
                acceptable_high: 40.0,
                ideal_low: 0.0,
                ideal_high: 10.0,
            },
            dewpoint: Some(ConditionThreshold {
                acceptable_low: 0.0,
                acceptable_high: 60.0,
                ideal_low: 0.0,
                ideal_high: 50.0,
            }),
        }
    }
}

impl ThresholdConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ThresholdError> {
        let file: ThresholdFile = toml::from_str(raw)?;
        Ok(Self {
            temperature: file.temperature.build("temperature")?,
            humidity: file.humidity.build("humidity")?,
            precipitation: file.precipitation.build("precipitation")?,
            dewpoint: file
                .dewpoint
                .map(|dewpoint| dewpoint.build("dewpoint"))
                .transpose()?,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ThresholdError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml_string(&self) -> Result<String, ThresholdError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn temperature() -> ConditionThreshold {
        ThresholdConfig::default().temperature
    }

    #[test]
    fn assess_buckets_follow_ranges() {
        let t = temperature();
        assert_eq!(t.assess(Some(20.0)), Verdict::Unacceptable);
        assert_eq!(t.assess(Some(85.0)), Verdict::Unacceptable);
        assert_eq!(t.assess(Some(35.0)), Verdict::Acceptable);
        assert_eq!(t.assess(Some(72.0)), Verdict::Acceptable);
        assert_eq!(t.assess(Some(55.0)), Verdict::Ideal);
    }

    #[test]
    fn boundaries_fall_in_the_better_bucket() {
        let t = temperature();
        assert_eq!(t.assess(Some(t.acceptable_low)), Verdict::Acceptable);
        assert_eq!(t.assess(Some(t.acceptable_high)), Verdict::Acceptable);
        assert_eq!(t.assess(Some(t.ideal_low)), Verdict::Ideal);
        assert_eq!(t.assess(Some(t.ideal_high)), Verdict::Ideal);
    }

    #[test]
    fn round_off_on_a_bound_is_tolerated() {
        let t = ConditionThreshold {
            acceptable_low: 0.0,
            acceptable_high: 1.0,
            ideal_low: 0.1,
            ideal_high: 0.3,
        };
        assert_eq!(t.assess(Some(0.1 + 0.2)), Verdict::Ideal);
    }

    #[test]
    fn missing_value_is_unknown() {
        let t = temperature();
        assert_eq!(t.assess(None), Verdict::Unknown);
        assert_eq!(t.assess(Some(f64::NAN)), Verdict::Unknown);
    }

    #[test]
    fn validate_rejects_unordered_bounds() {
        let mut t = temperature();
        t.ideal_low = 20.0;
        let err = t.validate("temperature").unwrap_err();
        assert!(matches!(err, ThresholdError::OutOfOrder { variable: "temperature", .. }));

        let mut t = ThresholdConfig::default().humidity;
        t.acceptable_high = f64::NAN;
        let err = t.validate("humidity").unwrap_err();
        assert!(matches!(err, ThresholdError::NotANumber { .. }));
    }

    #[test]
    fn upper_bounded_precipitation_starts_at_zero() {
        let t = ThresholdConfig::default().precipitation;
        assert_eq!(t.assess(Some(0.0)), Verdict::Ideal);
        assert_eq!(t.assess(Some(25.0)), Verdict::Acceptable);
        assert_eq!(t.assess(Some(50.0)), Verdict::Unacceptable);
    }

    #[test]
    fn new_rejects_unnested_bounds() {
        // ideal range wider than the acceptable one
        let err = ConditionThreshold::new("temperature", 40.0, 65.0, 30.0, 80.0).unwrap_err();
        assert!(matches!(err, ThresholdError::OutOfOrder { variable: "temperature", .. }));

        let err = ConditionThreshold::new("humidity", 0.0, 70.0, 60.0, 50.0).unwrap_err();
        assert!(matches!(err, ThresholdError::OutOfOrder { variable: "humidity", .. }));

        let err = ConditionThreshold::new("dewpoint", 0.0, f64::NAN, 0.0, 50.0).unwrap_err();
        assert!(matches!(err, ThresholdError::NotANumber { variable: "dewpoint" }));
    }

    #[test]
    fn new_accepts_degenerate_ranges() {
        let t = ConditionThreshold::new("precipitation", 0.0, 0.0, 0.0, 0.0).unwrap();
        assert_eq!(t.assess(Some(0.0)), Verdict::Ideal);
        assert_eq!(t.assess(Some(1.0)), Verdict::Unacceptable);
    }

    #[test]
    fn defaults_pass_the_checked_constructor() {
        let defaults = ThresholdConfig::default();
        let dewpoint = defaults.dewpoint.unwrap();
        let checked = [
            ("temperature", defaults.temperature),
            ("humidity", defaults.humidity),
            ("precipitation", defaults.precipitation),
            ("dewpoint", dewpoint),
        ];
        for (variable, t) in checked {
            let rebuilt = ConditionThreshold::new(
                variable,
                t.acceptable_low,
                t.acceptable_high,
                t.ideal_low,
                t.ideal_high,
            )
            .unwrap();
            assert_eq!(rebuilt, t);
        }
    }

    #[test]
    fn toml_without_dewpoint_leaves_it_unmonitored() {
        let raw = r#"
            [temperature]
            acceptable_low = 35
            acceptable_high = 75
            ideal_low = 45
            ideal_high = 60

            [humidity]
            acceptable_low = 0
            acceptable_high = 80
            ideal_low = 0
            ideal_high = 55

            [precipitation]
            acceptable_low = 0
            acceptable_high = 30
            ideal_low = 0
            ideal_high = 5
        "#;
        let config = ThresholdConfig::from_toml_str(raw).unwrap();
        assert!(config.dewpoint.is_none());
        assert_eq!(config.temperature.ideal_high, 60.0);
    }

    #[test]
    fn toml_with_bad_ordering_is_rejected() {
        let mut config = ThresholdConfig::default();
        config.humidity.ideal_high = 90.0;
        let raw = config.to_toml_string().unwrap();
        let err = ThresholdConfig::from_toml_str(&raw).unwrap_err();
        assert!(matches!(err, ThresholdError::OutOfOrder { variable: "humidity", .. }));
    }

    #[test]
    fn toml_roundtrip_keeps_defaults() {
        let raw = ThresholdConfig::default().to_toml_string().unwrap();
        let parsed = ThresholdConfig::from_toml_str(&raw).unwrap();
        assert_eq!(parsed, ThresholdConfig::default());
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thresholds.toml");
        std::fs::write(&path, ThresholdConfig::default().to_toml_string().unwrap()).unwrap();
        assert_eq!(ThresholdConfig::load(&path).unwrap(), ThresholdConfig::default());
    }

    fn nested_bounds() -> impl Strategy<Value = ConditionThreshold> {
        prop::collection::vec(-50.0f64..150.0, 4).prop_map(|mut bounds| {
            bounds.sort_by(f64::total_cmp);
            ConditionThreshold {
                acceptable_low: bounds[0],
                ideal_low: bounds[1],
                ideal_high: bounds[2],
                acceptable_high: bounds[3],
            }
        })
    }

    proptest! {
        #[test]
        fn assess_partitions_the_number_line(t in nested_bounds(), v in -100.0f64..200.0) {
            let verdict = t.assess(Some(v));
            if v >= t.ideal_low && v <= t.ideal_high {
                prop_assert_eq!(verdict, Verdict::Ideal);
            } else if (v >= t.acceptable_low && v < t.ideal_low - BOUNDARY_TOLERANCE)
                || (v > t.ideal_high + BOUNDARY_TOLERANCE && v <= t.acceptable_high)
            {
                prop_assert_eq!(verdict, Verdict::Acceptable);
            } else if v < t.acceptable_low - BOUNDARY_TOLERANCE
                || v > t.acceptable_high + BOUNDARY_TOLERANCE
            {
                prop_assert_eq!(verdict, Verdict::Unacceptable);
            }
        }

        #[test]
        fn bounds_are_never_unacceptable(t in nested_bounds()) {
            prop_assert_ne!(t.assess(Some(t.acceptable_low)), Verdict::Unacceptable);
            prop_assert_ne!(t.assess(Some(t.acceptable_high)), Verdict::Unacceptable);
            prop_assert_eq!(t.assess(Some(t.ideal_low)), Verdict::Ideal);
            prop_assert_eq!(t.assess(Some(t.ideal_high)), Verdict::Ideal);
        }
    }
}
