use clap::ValueEnum;
use thiserror::Error;

use crate::models::{
    CompositeScore, ConditionVerdicts, ForecastPeriod, Granularity, ScoreBucket, ScoredPeriod,
    Verdict,
};
use crate::thresholds::ThresholdConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScoreError {
    #[error("cannot aggregate an empty set of verdicts")]
    EmptyAggregation,
}

/// How per-variable verdicts are reduced to one score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum AggregationPolicy {
    /// Five labelled buckets from Trash to PRIME.
    #[default]
    Discrete,
    /// Continuous `(2 * ideal + acceptable) / total`, zeroed by any deal-breaker.
    Legacy,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct VerdictCounts {
    ideal: usize,
    acceptable: usize,
    unacceptable: usize,
}

impl VerdictCounts {
    fn tally(verdicts: &[Verdict]) -> Self {
        let mut counts = Self::default();
        for verdict in verdicts {
            match verdict {
                Verdict::Ideal => counts.ideal += 1,
                Verdict::Acceptable => counts.acceptable += 1,
                Verdict::Unacceptable => counts.unacceptable += 1,
                Verdict::Unknown => {}
            }
        }
        counts
    }

    const fn known(self) -> usize {
        self.ideal + self.acceptable + self.unacceptable
    }
}

/// Discrete aggregation. `Unknown` verdicts are ignored; `Ok(None)` means
/// every verdict was unknown.
pub fn aggregate(verdicts: &[Verdict]) -> Result<Option<ScoreBucket>, ScoreError> {
    if verdicts.is_empty() {
        return Err(ScoreError::EmptyAggregation);
    }

    let counts = VerdictCounts::tally(verdicts);
    let known = counts.known();
    if known == 0 {
        return Ok(None);
    }

    let bucket = if counts.unacceptable > 0 {
        ScoreBucket::Trash
    } else if counts.ideal == known {
        ScoreBucket::Prime
    } else if counts.acceptable == known {
        ScoreBucket::BetterThanTheGym
    } else if counts.ideal > counts.acceptable {
        ScoreBucket::Great
    } else {
        ScoreBucket::PrettyGood
    };

    Ok(Some(bucket))
}

/// Continuous aggregation kept for comparison with older outputs. A period
/// where every variable is ideal scores 2.0.
pub fn aggregate_legacy(verdicts: &[Verdict]) -> Result<Option<f64>, ScoreError> {
    if verdicts.is_empty() {
        return Err(ScoreError::EmptyAggregation);
    }

    let counts = VerdictCounts::tally(verdicts);
    let known = counts.known();
    if known == 0 {
        return Ok(None);
    }
    if counts.unacceptable > 0 {
        return Ok(Some(0.0));
    }

    Ok(Some(
        (2 * counts.ideal + counts.acceptable) as f64 / known as f64,
    ))
}

pub fn aggregate_with(
    policy: AggregationPolicy,
    verdicts: &[Verdict],
) -> Result<Option<CompositeScore>, ScoreError> {
    match policy {
        AggregationPolicy::Discrete => Ok(aggregate(verdicts)?.map(CompositeScore::Bucket)),
        AggregationPolicy::Legacy => Ok(aggregate_legacy(verdicts)?.map(CompositeScore::Weighted)),
    }
}

pub fn assess_period(period: &ForecastPeriod, thresholds: &ThresholdConfig) -> ConditionVerdicts {
    ConditionVerdicts {
        temperature: thresholds.temperature.assess(Some(period.temperature_f)),
        humidity: thresholds.humidity.assess(period.humidity_pct),
        precipitation: thresholds
            .precipitation
            .assess(Some(period.precipitation_pct)),
        dewpoint: thresholds
            .dewpoint
            .map(|dewpoint| dewpoint.assess(Some(period.dewpoint_f))),
    }
}

pub fn score_period(
    area: &str,
    granularity: Granularity,
    period: &ForecastPeriod,
    thresholds: &ThresholdConfig,
    policy: AggregationPolicy,
) -> Result<ScoredPeriod, ScoreError> {
    let verdicts = assess_period(period, thresholds);
    let score = aggregate_with(policy, &verdicts.as_vec())?;
    Ok(ScoredPeriod {
        area: area.to_string(),
        granularity,
        period: period.clone(),
        verdicts,
        score,
    })
}

/// Scores a whole forecast for one area.
pub fn score_forecast(
    area: &str,
    granularity: Granularity,
    periods: &[ForecastPeriod],
    thresholds: &ThresholdConfig,
    policy: AggregationPolicy,
) -> Result<Vec<ScoredPeriod>, ScoreError> {
    periods
        .iter()
        .map(|period| score_period(area, granularity, period, thresholds, policy))
        .collect()
}
