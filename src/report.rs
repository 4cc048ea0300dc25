use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt::Write;
use std::io;

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use crate::models::{AreaOutlook, Granularity, ScoreBucket, ScoredPeriod, SkippedForecast};

/// Length of the look-ahead used when ranking areas.
pub const NEXT_DAY_HOURS: u32 = 24;

pub fn next_day() -> Duration {
    Duration::hours(i64::from(NEXT_DAY_HOURS))
}

/// The nearest period for each area, preferring the hourly forecast.
pub fn current_conditions(scored: &[ScoredPeriod]) -> Vec<&ScoredPeriod> {
    let mut current: BTreeMap<&str, &ScoredPeriod> = BTreeMap::new();

    for period in scored {
        let entry = current.entry(period.area.as_str()).or_insert(period);
        let better_granularity = period.granularity == Granularity::Hourly
            && entry.granularity != Granularity::Hourly;
        let earlier = period.granularity == entry.granularity
            && period.period.sequence_number < entry.period.sequence_number;
        if better_granularity || earlier {
            *entry = period;
        }
    }

    current.into_values().collect()
}

/// Ranks areas by how many periods starting within `window` of their first
/// period are climbable. Hourly forecasts are used when an area has one;
/// otherwise its 12-hour forecast is.
pub fn area_outlooks(scored: &[ScoredPeriod], window: Duration) -> Vec<AreaOutlook> {
    let has_hourly: HashSet<&str> = scored
        .iter()
        .filter(|s| s.granularity == Granularity::Hourly)
        .map(|s| s.area.as_str())
        .collect();
    let wanted = |period: &ScoredPeriod| {
        let granularity = if has_hourly.contains(period.area.as_str()) {
            Granularity::Hourly
        } else {
            Granularity::TwelveHour
        };
        period.granularity == granularity
    };

    let mut first_start: HashMap<&str, NaiveDateTime> = HashMap::new();
    for period in scored.iter().filter(|s| wanted(*s)) {
        first_start
            .entry(period.area.as_str())
            .and_modify(|start| *start = (*start).min(period.period.start_time))
            .or_insert(period.period.start_time);
    }

    let mut outlooks: HashMap<&str, AreaOutlook> = HashMap::new();
    for period in scored.iter().filter(|s| wanted(*s)) {
        let Some(&first) = first_start.get(period.area.as_str()) else {
            continue;
        };
        if period.period.start_time >= first + window {
            continue;
        }

        let entry = outlooks
            .entry(period.area.as_str())
            .or_insert_with(|| AreaOutlook {
                area: period.area.clone(),
                good_periods: 0,
                window: 0,
                best: None,
            });
        entry.window += 1;
        if let Some(score) = period.score {
            if score.is_climbable() {
                entry.good_periods += 1;
            }
            if entry.best.map_or(true, |best| score.value() > best.value()) {
                entry.best = Some(score);
            }
        }
    }

    let mut values: Vec<AreaOutlook> = outlooks.into_values().collect();
    values.sort_by(|a, b| {
        b.good_periods
            .cmp(&a.good_periods)
            .then_with(|| a.area.cmp(&b.area))
    });
    values
}

/// Counts periods per score label, most frequent first.
pub fn summarize_by_label(scored: &[ScoredPeriod]) -> Vec<(String, usize)> {
    let mut map: HashMap<String, usize> = HashMap::new();
    for period in scored {
        *map.entry(period.label()).or_insert(0) += 1;
    }

    let mut summaries: Vec<(String, usize)> = map.into_iter().collect();
    summaries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    summaries
}

/// Area × period grid of score labels for one granularity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutlookGrid {
    pub columns: Vec<String>,
    pub rows: Vec<(String, Vec<String>)>,
}

fn column_name(period: &ScoredPeriod) -> String {
    if period.period.name.is_empty() {
        period.period.start_time.format("%a %H:%M").to_string()
    } else {
        period.period.name.clone()
    }
}

pub fn outlook_grid(
    scored: &[ScoredPeriod],
    granularity: Granularity,
    daytime_only: bool,
    max_periods: u32,
) -> OutlookGrid {
    let selected: Vec<&ScoredPeriod> = scored
        .iter()
        .filter(|s| s.granularity == granularity)
        .filter(|s| !daytime_only || s.period.is_daytime)
        .filter(|s| s.period.sequence_number <= max_periods)
        .collect();

    let mut columns: BTreeSet<(NaiveDateTime, String)> = BTreeSet::new();
    let mut cells: BTreeMap<&str, HashMap<String, String>> = BTreeMap::new();
    for period in &selected {
        let column = column_name(period);
        columns.insert((period.period.start_time, column.clone()));
        cells
            .entry(period.area.as_str())
            .or_default()
            .insert(column, period.label());
    }

    let mut ordered: Vec<String> = Vec::new();
    for (_, name) in columns {
        if !ordered.contains(&name) {
            ordered.push(name);
        }
    }

    let rows = cells
        .into_iter()
        .map(|(area, by_column)| {
            let values = ordered
                .iter()
                .map(|column| by_column.get(column).cloned().unwrap_or_default())
                .collect();
            (area.to_string(), values)
        })
        .collect();

    OutlookGrid {
        columns: ordered,
        rows,
    }
}

fn write_grid(output: &mut String, grid: &OutlookGrid) {
    if grid.rows.is_empty() {
        let _ = writeln!(output, "No periods to show.");
        return;
    }

    let _ = writeln!(output, "| Area | {} |", grid.columns.join(" | "));
    let _ = writeln!(
        output,
        "|---|{}",
        grid.columns.iter().map(|_| "---|").collect::<String>()
    );
    for (area, values) in &grid.rows {
        let _ = writeln!(output, "| {} | {} |", area, values.join(" | "));
    }
}

pub fn describe_current(period: &ScoredPeriod) -> String {
    let humidity = period
        .period
        .humidity_pct
        .map_or_else(|| "n/a".to_string(), |h| format!("{h:.0}%"));
    let mut line = format!(
        "{:.0}°F {}, {} humidity {}, {:.0}% precipitation {}",
        period.period.temperature_f,
        period.verdicts.temperature.emoji(),
        humidity,
        period.verdicts.humidity.emoji(),
        period.period.precipitation_pct,
        period.verdicts.precipitation.emoji(),
    );
    if let Some(dewpoint) = period.verdicts.dewpoint {
        let _ = write!(
            line,
            ", {:.0}°F dewpoint {}",
            period.period.dewpoint_f,
            dewpoint.emoji()
        );
    }
    line
}

pub fn build_report(
    scored: &[ScoredPeriod],
    skipped: &[SkippedForecast],
    daytime_only: bool,
) -> String {
    let current = current_conditions(scored);
    let outlooks = area_outlooks(scored, next_day());
    let summaries = summarize_by_label(scored);

    let mut output = String::new();

    let _ = writeln!(output, "# Climbing Conditions Report");
    let _ = writeln!(
        output,
        "Scores: {}",
        ScoreBucket::ALL
            .iter()
            .rev()
            .map(|bucket| format!("{} = {}", bucket.value(), bucket.label()))
            .collect::<Vec<_>>()
            .join(", ")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Current Conditions");

    if current.is_empty() {
        let _ = writeln!(output, "No forecasts loaded.");
    } else {
        for period in &current {
            let _ = writeln!(output, "### {}", period.area);
            let _ = writeln!(
                output,
                "{} ({})",
                period.period.short_description,
                period.label()
            );
            let _ = writeln!(output, "- {}", describe_current(period));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Next {NEXT_DAY_HOURS} Hours");

    if outlooks.is_empty() {
        let _ = writeln!(output, "No scored periods in this window.");
    } else {
        for outlook in &outlooks {
            let _ = writeln!(
                output,
                "- {}: {} of {} periods at least decent",
                outlook.area, outlook.good_periods, outlook.window
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## 12-Hour Outlook");
    write_grid(
        &mut output,
        &outlook_grid(scored, Granularity::TwelveHour, daytime_only, u32::MAX),
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Hourly Outlook");
    write_grid(
        &mut output,
        &outlook_grid(scored, Granularity::Hourly, daytime_only, NEXT_DAY_HOURS),
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Score Mix");
    if summaries.is_empty() {
        let _ = writeln!(output, "No scored periods.");
    } else {
        for (label, count) in &summaries {
            let _ = writeln!(output, "- {label}: {count} periods");
        }
    }

    if !skipped.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Skipped Forecasts");
        for forecast in skipped {
            let _ = writeln!(
                output,
                "- {} ({}): {}",
                forecast.area, forecast.granularity, forecast.reason
            );
        }
    }

    output
}

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    area: &'a str,
    granularity: Granularity,
    number: u32,
    name: &'a str,
    start_time: String,
    end_time: String,
    is_daytime: bool,
    temperature_f: f64,
    humidity_pct: Option<f64>,
    precipitation_pct: f64,
    dewpoint_f: f64,
    temperature_verdict: &'static str,
    humidity_verdict: &'static str,
    precipitation_verdict: &'static str,
    dewpoint_verdict: Option<&'static str>,
    score: Option<f64>,
    label: String,
    short_forecast: &'a str,
}

/// Writes one CSV row per scored period, in tidy form for pivoting.
pub fn write_csv<W: io::Write>(scored: &[ScoredPeriod], writer: W) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(writer);
    for period in scored {
        writer.serialize(ExportRow {
            area: &period.area,
            granularity: period.granularity,
            number: period.period.sequence_number,
            name: &period.period.name,
            start_time: period.period.start_time.format("%Y-%m-%dT%H:%M").to_string(),
            end_time: period.period.end_time.format("%Y-%m-%dT%H:%M").to_string(),
            is_daytime: period.period.is_daytime,
            temperature_f: period.period.temperature_f,
            humidity_pct: period.period.humidity_pct,
            precipitation_pct: period.period.precipitation_pct,
            dewpoint_f: period.period.dewpoint_f,
            temperature_verdict: period.verdicts.temperature.as_str(),
            humidity_verdict: period.verdicts.humidity.as_str(),
            precipitation_verdict: period.verdicts.precipitation.as_str(),
            dewpoint_verdict: period.verdicts.dewpoint.map(|v| v.as_str()),
            score: period.score.map(|s| s.value()),
            label: period.label(),
            short_forecast: &period.period.short_description,
        })?;
    }
    writer.flush()?;
    Ok(())
}
