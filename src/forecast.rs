//! Forecast normalization
//!
//! Turns a weather.gov style forecast payload (`$.properties.periods`) into
//! [`ForecastPeriod`] records with unit-converted, explicitly-missing fields.

use std::fmt;

use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::ForecastPeriod;

#[derive(Debug, Error)]
pub enum ForecastError {
    /// The payload has no usable `properties.periods` array.
    #[error("malformed forecast payload: {0}")]
    MalformedPayload(String),

    /// A period is missing a field that has no safe default.
    #[error("period {number}: missing required field `{field}`")]
    MissingField { field: &'static str, number: u32 },

    #[error("period {number}: invalid timestamp {value:?}: {source}")]
    InvalidTimestamp {
        number: u32,
        value: String,
        source: chrono::ParseError,
    },

    #[error("period {number}: start time {start} is after end time {end}")]
    InvertedPeriod {
        number: u32,
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("period {number} follows period {previous}; sequence numbers must increase")]
    SequenceOutOfOrder { previous: u32, number: u32 },
}

/// A `{ "value": ... }` wrapper as used by the provider for quantitative values.
#[derive(Debug, Deserialize)]
struct QuantitativeValue {
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPeriod {
    number: u32,
    #[serde(default)]
    name: String,
    start_time: String,
    end_time: String,
    is_daytime: bool,
    temperature: f64,
    #[serde(default)]
    temperature_unit: Option<String>,
    #[serde(default)]
    dewpoint: Option<QuantitativeValue>,
    #[serde(default)]
    relative_humidity: Option<QuantitativeValue>,
    #[serde(default)]
    probability_of_precipitation: Option<QuantitativeValue>,
    #[serde(default)]
    short_forecast: String,
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Parses an RFC 3339 timestamp and keeps the local wall-clock time,
/// discarding the UTC offset.
fn parse_local_time(number: u32, value: &str) -> Result<NaiveDateTime, ForecastError> {
    DateTime::parse_from_rfc3339(value)
        .map(|time| time.naive_local())
        .map_err(|source| ForecastError::InvalidTimestamp {
            number,
            value: value.to_string(),
            source,
        })
}

fn normalize_period(raw: RawPeriod) -> Result<ForecastPeriod, ForecastError> {
    let number = raw.number;

    let dewpoint_c = raw
        .dewpoint
        .and_then(|d| d.value)
        .ok_or(ForecastError::MissingField {
            field: "dewpoint",
            number,
        })?;

    let temperature_f = match raw.temperature_unit.as_deref() {
        Some("C") => celsius_to_fahrenheit(raw.temperature),
        _ => raw.temperature,
    };

    let start_time = parse_local_time(number, &raw.start_time)?;
    let end_time = parse_local_time(number, &raw.end_time)?;
    if start_time > end_time {
        return Err(ForecastError::InvertedPeriod {
            number,
            start: start_time,
            end: end_time,
        });
    }

    Ok(ForecastPeriod {
        sequence_number: number,
        name: raw.name,
        start_time,
        end_time,
        is_daytime: raw.is_daytime,
        temperature_f,
        humidity_pct: raw.relative_humidity.and_then(|h| h.value),
        // The provider sends null when there is no forecasted chance.
        precipitation_pct: raw
            .probability_of_precipitation
            .and_then(|p| p.value)
            .unwrap_or(0.0),
        dewpoint_f: celsius_to_fahrenheit(dewpoint_c),
        short_description: raw.short_forecast,
    })
}

/// Normalizes every period in the payload, preserving input order.
pub fn normalize(payload: &Value) -> Result<Vec<ForecastPeriod>, ForecastError> {
    let periods = payload
        .get("properties")
        .ok_or_else(|| ForecastError::MalformedPayload("missing `properties`".to_string()))?
        .get("periods")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            ForecastError::MalformedPayload("`properties.periods` is not an array".to_string())
        })?;

    let mut normalized: Vec<ForecastPeriod> = Vec::with_capacity(periods.len());
    for (index, entry) in periods.iter().enumerate() {
        let raw = RawPeriod::deserialize(entry).map_err(|e| {
            ForecastError::MalformedPayload(format!("period at index {index}: {e}"))
        })?;
        let period = normalize_period(raw)?;

        if let Some(previous) = normalized.last() {
            if period.sequence_number <= previous.sequence_number {
                return Err(ForecastError::SequenceOutOfOrder {
                    previous: previous.sequence_number,
                    number: period.sequence_number,
                });
            }
        }
        normalized.push(period);
    }

    Ok(normalized)
}

/// A normalized forecast together with the time span it covers.
#[derive(Debug, Clone)]
pub struct ForecastBatch {
    pub periods: Vec<ForecastPeriod>,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
}

impl ForecastBatch {
    pub fn from_payload(payload: &Value) -> Result<Self, ForecastError> {
        let periods = normalize(payload)?;
        let start_time = periods.iter().map(|p| p.start_time).min();
        let end_time = periods.iter().map(|p| p.end_time).max();
        Ok(Self {
            periods,
            start_time,
            end_time,
        })
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ForecastError> {
        let payload: Value = serde_json::from_str(raw)
            .map_err(|e| ForecastError::MalformedPayload(format!("invalid JSON: {e}")))?;
        Self::from_payload(&payload)
    }
}

impl fmt::Display for ForecastBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => write!(
                f,
                "forecast from {start} to {end} with {} periods",
                self.periods.len()
            ),
            _ => write!(f, "empty forecast"),
        }
    }
}
