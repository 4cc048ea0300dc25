use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::forecast::{ForecastBatch, ForecastError};
use crate::models::{Granularity, ScoredPeriod, SkippedForecast};
use crate::scoring::{self, AggregationPolicy, ScoreError};
use crate::thresholds::ThresholdConfig;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path}: {source}")]
    Forecast {
        path: PathBuf,
        source: ForecastError,
    },

    #[error(transparent)]
    Score(#[from] ScoreError),
}

/// One manifest row: which payload file holds which area's forecast.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManifestEntry {
    pub area: String,
    pub granularity: Granularity,
    pub path: PathBuf,
}

/// Reads `area,granularity,path` rows. Relative paths are resolved against
/// the manifest's own directory.
pub fn read_manifest(manifest_path: &Path) -> Result<Vec<ManifestEntry>, ManifestError> {
    let base = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(manifest_path)?;

    let mut entries = Vec::new();
    for result in reader.deserialize::<ManifestEntry>() {
        let mut entry = result?;
        if entry.path.is_relative() {
            entry.path = base.join(&entry.path);
        }
        entries.push(entry);
    }

    debug!(count = entries.len(), manifest = %manifest_path.display(), "read forecast manifest");
    Ok(entries)
}

pub fn load_forecast(entry: &ManifestEntry) -> Result<ForecastBatch, ManifestError> {
    let raw = std::fs::read_to_string(&entry.path).map_err(|source| ManifestError::Io {
        path: entry.path.clone(),
        source,
    })?;
    let batch = ForecastBatch::from_json_str(&raw).map_err(|source| ManifestError::Forecast {
        path: entry.path.clone(),
        source,
    })?;

    debug!(area = %entry.area, granularity = %entry.granularity, "{batch}");
    Ok(batch)
}

/// Everything scored from one manifest, plus the entries that were skipped.
#[derive(Debug, Default)]
pub struct ManifestScores {
    pub scored: Vec<ScoredPeriod>,
    pub skipped: Vec<SkippedForecast>,
}

fn score_entry(
    entry: &ManifestEntry,
    thresholds: &ThresholdConfig,
    policy: AggregationPolicy,
) -> Result<Vec<ScoredPeriod>, ManifestError> {
    let batch = load_forecast(entry)?;
    Ok(scoring::score_forecast(
        &entry.area,
        entry.granularity,
        &batch.periods,
        thresholds,
        policy,
    )?)
}

/// Scores each entry on its own. An entry that fails to load or score is
/// recorded in `skipped` and leaves the other entries untouched.
pub fn score_entries(
    entries: &[ManifestEntry],
    thresholds: &ThresholdConfig,
    policy: AggregationPolicy,
) -> ManifestScores {
    let mut scores = ManifestScores::default();
    for entry in entries {
        match score_entry(entry, thresholds, policy) {
            Ok(periods) => {
                info!(
                    area = %entry.area,
                    granularity = %entry.granularity,
                    periods = periods.len(),
                    "scored forecast"
                );
                scores.scored.extend(periods);
            }
            Err(err) => {
                warn!(
                    area = %entry.area,
                    granularity = %entry.granularity,
                    "skipping forecast: {err}"
                );
                scores.skipped.push(SkippedForecast {
                    area: entry.area.clone(),
                    granularity: entry.granularity,
                    reason: err.to_string(),
                });
            }
        }
    }
    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompositeScore, ScoreBucket};
    use serde_json::json;

    fn write_payload(dir: &Path, name: &str, periods: serde_json::Value) -> PathBuf {
        let path = dir.join(name);
        let payload = json!({ "properties": { "periods": periods } });
        std::fs::write(&path, payload.to_string()).unwrap();
        path
    }

    #[test]
    fn resolves_relative_paths_against_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("forecasts.csv");
        std::fs::write(
            &manifest,
            "area,granularity,path\nRocktown, hourly ,rocktown-hourly.json\nStone Fort,12hr,/data/stone-fort.json\n",
        )
        .unwrap();

        let entries = read_manifest(&manifest).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].area, "Rocktown");
        assert_eq!(entries[0].granularity, Granularity::Hourly);
        assert_eq!(entries[0].path, dir.path().join("rocktown-hourly.json"));
        assert_eq!(entries[1].granularity, Granularity::TwelveHour);
        assert_eq!(entries[1].path, PathBuf::from("/data/stone-fort.json"));
    }

    #[test]
    fn unknown_granularity_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("forecasts.csv");
        std::fs::write(&manifest, "area,granularity,path\nRocktown,weekly,a.json\n").unwrap();
        assert!(matches!(read_manifest(&manifest), Err(ManifestError::Csv(_))));
    }

    #[test]
    fn loads_payload_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_payload(
            dir.path(),
            "rocktown.json",
            json!([{
                "number": 1,
                "startTime": "2024-03-02T08:00:00-05:00",
                "endTime": "2024-03-02T09:00:00-05:00",
                "isDaytime": true,
                "temperature": 50,
                "dewpoint": { "value": 0 },
                "relativeHumidity": { "value": 45 },
                "probabilityOfPrecipitation": { "value": 5 },
                "shortForecast": "Sunny"
            }]),
        );
        let entry = ManifestEntry {
            area: "Rocktown".to_string(),
            granularity: Granularity::Hourly,
            path,
        };

        let batch = load_forecast(&entry).unwrap();
        assert_eq!(batch.periods.len(), 1);
        assert_eq!(batch.periods[0].dewpoint_f, 32.0);
        assert_eq!(batch.periods[0].precipitation_pct, 5.0);
    }

    #[test]
    fn missing_payload_file_names_the_path() {
        let entry = ManifestEntry {
            area: "Nowhere".to_string(),
            granularity: Granularity::Hourly,
            path: PathBuf::from("/definitely/not/here.json"),
        };
        let err = load_forecast(&entry).unwrap_err();
        assert!(matches!(err, ManifestError::Io { .. }));
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }

    #[test]
    fn bad_payload_is_wrapped_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, r#"{"properties": {}}"#).unwrap();
        let entry = ManifestEntry {
            area: "Broken".to_string(),
            granularity: Granularity::TwelveHour,
            path,
        };
        let err = load_forecast(&entry).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::Forecast {
                source: ForecastError::MalformedPayload(_),
                ..
            }
        ));
    }

    fn hourly_period(number: u32, temperature: f64) -> serde_json::Value {
        json!({
            "number": number,
            "startTime": format!("2024-03-02T{:02}:00:00-05:00", 7 + number),
            "endTime": format!("2024-03-02T{:02}:00:00-05:00", 8 + number),
            "isDaytime": true,
            "temperature": temperature,
            "dewpoint": { "value": 2 },
            "relativeHumidity": { "value": 40 },
            "probabilityOfPrecipitation": { "value": 0 },
            "shortForecast": "Sunny"
        })
    }

    #[test]
    fn failing_entry_does_not_disturb_other_areas() {
        let dir = tempfile::tempdir().unwrap();
        write_payload(
            dir.path(),
            "rocktown.json",
            json!([hourly_period(1, 55.0), hourly_period(2, 20.0)]),
        );
        let mut no_dewpoint = hourly_period(1, 55.0);
        no_dewpoint.as_object_mut().unwrap().remove("dewpoint");
        write_payload(dir.path(), "obed.json", json!([no_dewpoint]));

        let manifest = dir.path().join("forecasts.csv");
        std::fs::write(
            &manifest,
            "area,granularity,path\nObed,hourly,obed.json\nRocktown,hourly,rocktown.json\n",
        )
        .unwrap();
        let entries = read_manifest(&manifest).unwrap();
        let thresholds = ThresholdConfig::default();

        let alone = score_entries(&entries[1..], &thresholds, AggregationPolicy::Discrete);
        let together = score_entries(&entries, &thresholds, AggregationPolicy::Discrete);

        assert!(alone.skipped.is_empty());
        assert_eq!(together.scored, alone.scored);
        assert_eq!(together.scored.len(), 2);
        assert!(together.scored.iter().all(|s| s.area == "Rocktown"));
        assert_eq!(
            together.scored[0].score,
            Some(CompositeScore::Bucket(ScoreBucket::Prime))
        );
        assert_eq!(
            together.scored[1].score,
            Some(CompositeScore::Bucket(ScoreBucket::Trash))
        );

        assert_eq!(together.skipped.len(), 1);
        let skipped = &together.skipped[0];
        assert_eq!(skipped.area, "Obed");
        assert_eq!(skipped.granularity, Granularity::Hourly);
        assert!(skipped.reason.contains("obed.json"));
        assert!(skipped.reason.contains("dewpoint"));
    }

    #[test]
    fn missing_file_is_skipped_not_fatal() {
        let entries = vec![ManifestEntry {
            area: "Nowhere".to_string(),
            granularity: Granularity::TwelveHour,
            path: PathBuf::from("/definitely/not/here.json"),
        }];
        let scores = score_entries(
            &entries,
            &ThresholdConfig::default(),
            AggregationPolicy::Legacy,
        );
        assert!(scores.scored.is_empty());
        assert_eq!(scores.skipped.len(), 1);
        assert!(scores.skipped[0].reason.contains("/definitely/not/here.json"));
    }
}
