use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One forecast time slot for a single area, with units already normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastPeriod {
    pub sequence_number: u32,
    pub name: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub is_daytime: bool,
    pub temperature_f: f64,
    /// `None` when the provider left relative humidity out.
    pub humidity_pct: Option<f64>,
    pub precipitation_pct: f64,
    pub dewpoint_f: f64,
    pub short_description: String,
}

/// Forecast resolution offered by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Granularity {
    #[serde(rename = "12hr")]
    TwelveHour,
    #[serde(rename = "hourly")]
    Hourly,
}

impl Granularity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TwelveHour => "12hr",
            Self::Hourly => "hourly",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of one observed value against its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Unacceptable,
    Acceptable,
    Ideal,
    /// The observed value was missing, so nothing could be assessed.
    Unknown,
}

impl Verdict {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unacceptable => "Unacceptable",
            Self::Acceptable => "Acceptable",
            Self::Ideal => "Ideal",
            Self::Unknown => "Unknown",
        }
    }

    pub const fn emoji(self) -> &'static str {
        match self {
            Self::Unacceptable => "🚫",
            Self::Acceptable => "🆗",
            Self::Ideal => "✅",
            Self::Unknown => "❔",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The five outcomes of the discrete aggregation policy, worst first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScoreBucket {
    Trash,
    BetterThanTheGym,
    PrettyGood,
    Great,
    Prime,
}

impl ScoreBucket {
    pub const ALL: [Self; 5] = [
        Self::Trash,
        Self::BetterThanTheGym,
        Self::PrettyGood,
        Self::Great,
        Self::Prime,
    ];

    /// Numeric value used for sorting and shading; every value is exactly
    /// representable as an `f64`.
    pub const fn value(self) -> f64 {
        match self {
            Self::Trash => 0.0,
            Self::BetterThanTheGym => 0.25,
            Self::PrettyGood => 0.5,
            Self::Great => 0.75,
            Self::Prime => 1.0,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Trash => "Trash",
            Self::BetterThanTheGym => "Better than the gym",
            Self::PrettyGood => "Pretty good",
            Self::Great => "Great",
            Self::Prime => "PRIME",
        }
    }
}

/// Label shown for a period that could not be scored at all.
pub const NO_DATA_LABEL: &str = "No data";

/// Composite climbability rating attached to a scored period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompositeScore {
    Bucket(ScoreBucket),
    /// Continuous score produced by the legacy weighting.
    Weighted(f64),
}

impl CompositeScore {
    pub const fn value(self) -> f64 {
        match self {
            Self::Bucket(bucket) => bucket.value(),
            Self::Weighted(value) => value,
        }
    }

    /// Human readable label; weighted scores have none.
    pub const fn label(self) -> Option<&'static str> {
        match self {
            Self::Bucket(bucket) => Some(bucket.label()),
            Self::Weighted(_) => None,
        }
    }

    /// The label, or the value to two places for weighted scores.
    pub fn describe(self) -> String {
        self.label()
            .map_or_else(|| format!("{:.2}", self.value()), str::to_string)
    }

    /// A period counts as a "good hour" when its score is above zero.
    pub fn is_climbable(self) -> bool {
        self.value() > 0.0
    }
}

/// Per-variable verdicts for one period. A variable without a configured
/// threshold is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionVerdicts {
    pub temperature: Verdict,
    pub humidity: Verdict,
    pub precipitation: Verdict,
    pub dewpoint: Option<Verdict>,
}

impl ConditionVerdicts {
    pub fn as_vec(&self) -> Vec<Verdict> {
        let mut verdicts = vec![self.temperature, self.humidity, self.precipitation];
        verdicts.extend(self.dewpoint);
        verdicts
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPeriod {
    pub area: String,
    pub granularity: Granularity,
    pub period: ForecastPeriod,
    pub verdicts: ConditionVerdicts,
    /// `None` when every monitored variable was missing.
    pub score: Option<CompositeScore>,
}

impl ScoredPeriod {
    /// Bucket label, the formatted value for weighted scores, or "No data".
    pub fn label(&self) -> String {
        self.score
            .map_or_else(|| NO_DATA_LABEL.to_string(), CompositeScore::describe)
    }
}

/// Per-area roll-up used for ranking areas against each other.
#[derive(Debug, Clone)]
pub struct AreaOutlook {
    pub area: String,
    pub good_periods: usize,
    pub window: usize,
    pub best: Option<CompositeScore>,
}

/// A forecast that was left out of scoring, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedForecast {
    pub area: String,
    pub granularity: Granularity,
    pub reason: String,
}
