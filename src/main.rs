use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod forecast;
mod manifest;
mod models;
mod report;
mod scoring;
mod thresholds;

use manifest::ManifestScores;
use scoring::AggregationPolicy;
use thresholds::ThresholdConfig;

const THRESHOLDS_ENV: &str = "PRIME_CONDIES_THRESHOLDS";

#[derive(Parser)]
#[command(name = "prime-condies")]
#[command(about = "Score weather forecasts for climbing conditions", long_about = None)]
struct Cli {
    /// Verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ScoringArgs {
    /// CSV manifest with `area,granularity,path` rows
    #[arg(long)]
    manifest: PathBuf,
    /// Threshold TOML file (falls back to $PRIME_CONDIES_THRESHOLDS, then built-in defaults)
    #[arg(long)]
    thresholds: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = AggregationPolicy::Discrete)]
    policy: AggregationPolicy,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default thresholds as TOML
    Thresholds {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show current conditions and rank areas by good hours
    Score {
        #[command(flatten)]
        scoring: ScoringArgs,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        scoring: ScoringArgs,
        /// Only include daytime periods in the outlook grids
        #[arg(long)]
        daytime_only: bool,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Export every scored period as CSV
    Export {
        #[command(flatten)]
        scoring: ScoringArgs,
        #[arg(long, default_value = "scored.csv")]
        out: PathBuf,
    },
}

fn log_filter_from_verbosity(verbose: u8) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        })
    })
}

fn load_thresholds(path: Option<&Path>) -> anyhow::Result<ThresholdConfig> {
    let path = path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(THRESHOLDS_ENV).map(PathBuf::from));

    match path {
        Some(path) => ThresholdConfig::load(&path)
            .with_context(|| format!("failed to load thresholds from {}", path.display())),
        None => Ok(ThresholdConfig::default()),
    }
}

fn score_manifest(args: &ScoringArgs) -> anyhow::Result<ManifestScores> {
    let config = load_thresholds(args.thresholds.as_deref())?;
    let entries = manifest::read_manifest(&args.manifest)
        .with_context(|| format!("failed to read manifest {}", args.manifest.display()))?;
    Ok(manifest::score_entries(&entries, &config, args.policy))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(log_filter_from_verbosity(cli.verbose))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Thresholds { out } => {
            let rendered = ThresholdConfig::default().to_toml_string()?;
            match out {
                Some(path) => {
                    std::fs::write(&path, rendered)?;
                    println!("Default thresholds written to {}.", path.display());
                }
                None => print!("{rendered}"),
            }
        }
        Commands::Score { scoring, limit } => {
            let ManifestScores { scored, skipped } = score_manifest(&scoring)?;
            for forecast in &skipped {
                println!(
                    "Skipped {} ({}): {}",
                    forecast.area, forecast.granularity, forecast.reason
                );
            }

            if scored.is_empty() {
                println!("No forecast periods could be scored.");
                return Ok(());
            }

            println!("Current conditions:");
            for period in report::current_conditions(&scored) {
                println!(
                    "- {} ({}): {} | {}",
                    period.area,
                    period.label(),
                    period.period.short_description,
                    report::describe_current(period)
                );
            }

            println!();
            println!(
                "Areas by good periods in the next {} hours:",
                report::NEXT_DAY_HOURS
            );
            for outlook in report::area_outlooks(&scored, report::next_day())
                .iter()
                .take(limit)
            {
                let best = outlook.best.map_or_else(
                    || models::NO_DATA_LABEL.to_string(),
                    models::CompositeScore::describe,
                );
                println!(
                    "- {}: {} of {} periods at least decent (best: {})",
                    outlook.area, outlook.good_periods, outlook.window, best
                );
            }
        }
        Commands::Report {
            scoring,
            daytime_only,
            out,
        } => {
            let scores = score_manifest(&scoring)?;
            let markdown = report::build_report(&scores.scored, &scores.skipped, daytime_only);
            std::fs::write(&out, markdown)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export { scoring, out } => {
            let scores = score_manifest(&scoring)?;
            let file = std::fs::File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            report::write_csv(&scores.scored, file)?;
            println!(
                "Exported {} periods to {} ({} forecasts skipped).",
                scores.scored.len(),
                out.display(),
                scores.skipped.len()
            );
        }
    }

    Ok(())
}
