use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};

use vitalrs::correlation::ScoreSeries;
use vitalrs::export::text::render_scores_table;
use vitalrs::export::{DateRange, ExportFormat, ExportManager};
use vitalrs::import::ImportManager;
use vitalrs::models::{DailyScore, RiskLevel};
use vitalrs::{
    init_logging, AppConfig, AthleteTimeline, CorrelationAnalyzer, LogLevel,
    OvertrainingRiskAssessor, ScoringPipeline, TrainingPhaseDetector,
};

/// vitalrs - recovery, sleep and strain scores from wearable data
///
/// Reads daily samples and workouts from CSV or JSON files, scores every day
/// against rolling personal baselines and tracks fitness and fatigue.
#[derive(Parser)]
#[command(name = "vitalrs")]
#[command(version)]
#[command(about = "Physiological scoring for wearable data", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Inputs shared by every scoring command
#[derive(clap::Args)]
struct InputArgs {
    /// Sample/workout files or directories (CSV, JSON)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// User the data belongs to
    #[arg(short, long, default_value = "athlete")]
    user: String,

    /// Personal sleep need in hours
    #[arg(long)]
    sleep_target: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Score every day in the imported data
    Score {
        #[command(flatten)]
        input: InputArgs,

        /// First day to show (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Last day to show (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Output format (table, csv, json, text)
        #[arg(short = 'f', long, default_value = "table")]
        format: String,

        /// Output file (required for csv, json and text)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Assess overtraining risk over the most recent days
    Risk {
        #[command(flatten)]
        input: InputArgs,

        /// Window length in days
        #[arg(short, long, default_value = "7")]
        window: usize,
    },

    /// Detect the current training phase
    Phase {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Correlate two daily series (recovery, sleep, strain, tss, ctl, atl, tsb, hrv)
    Correlate {
        #[command(flatten)]
        input: InputArgs,

        #[arg(short, long)]
        x: ScoreSeries,

        #[arg(short, long)]
        y: ScoreSeries,

        /// Days between the x value and the y value it is paired with
        #[arg(short, long, default_value = "0")]
        lag: u32,
    },

    /// Show or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,

    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path)?,
        None => AppConfig::load_or_default(),
    };

    let mut log_config = config.logging.clone();
    log_config.level = LogLevel::from_verbosity(log_config.level, cli.verbose);
    init_logging(&log_config)?;

    match cli.command {
        Commands::Score {
            input,
            from,
            to,
            format,
            output,
        } => {
            let (_, scores) = load_and_score(&input, &config)?;
            let range = DateRange::new(from, to);

            if format.eq_ignore_ascii_case("table") {
                let shown: Vec<DailyScore> =
                    range.filter_scores(&scores).into_iter().cloned().collect();
                println!("{}", render_scores_table(&shown));
                if shown.iter().any(|s| s.strain_confidence.is_reduced()) {
                    println!("{}", "* strain estimated from RPE or TSS".dimmed());
                }
            } else {
                let format: ExportFormat = format.parse()?;
                let output = output.context("--output is required for csv, json and text")?;
                ExportManager::with_config(config.pmc.clone())
                    .export_scores(&scores, format, &range, &output)?;
                println!(
                    "{}",
                    format!("✓ Scores written to {}", output.display()).green()
                );
            }
        }

        Commands::Risk { input, window } => {
            let (_, scores) = load_and_score(&input, &config)?;
            let assessor = OvertrainingRiskAssessor::with_config(config.risk.clone());

            match assessor.assess(&scores, window) {
                Ok(risk) => {
                    let level = format!("{}", risk.risk_level);
                    let level = match risk.risk_level {
                        RiskLevel::Low => level.green(),
                        RiskLevel::Moderate => level.yellow(),
                        RiskLevel::High => level.red(),
                        RiskLevel::Critical => level.red().bold(),
                    };
                    println!("{} {:.0} ({})", "Overtraining risk:".bold(), risk.risk_score, level);
                    for factor in &risk.factors {
                        println!(
                            "  • {} ({:.0}%): {}",
                            factor.name,
                            factor.severity * 100.0,
                            factor.description
                        );
                    }
                    println!("{}", risk.recommendation);
                }
                Err(e) if e.is_unavailable() => {
                    println!("{} {}", "Risk unavailable:".yellow(), e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Phase { input } => {
            let (timeline, scores) = load_and_score(&input, &config)?;
            let workouts = match timeline.span() {
                Some((start, end)) => timeline.workouts_between(start, end),
                None => Vec::new(),
            };
            let detector = TrainingPhaseDetector::with_config(config.phase.clone());

            match detector.detect(&workouts, &scores) {
                Ok(phase) => {
                    println!(
                        "{} {} (confidence {:.0}%)",
                        "Training phase:".bold(),
                        phase.phase.to_string().cyan(),
                        phase.confidence * 100.0
                    );
                    println!(
                        "  Weekly TSS {:.0}, low intensity {:.0}%, high intensity {:.0}%",
                        phase.weekly_tss, phase.low_intensity_percent, phase.high_intensity_percent
                    );
                    println!("{}", phase.recommendation);
                }
                Err(e) if e.is_unavailable() => {
                    println!("{} {}", "Phase unavailable:".yellow(), e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Correlate { input, x, y, lag } => {
            let (_, scores) = load_and_score(&input, &config)?;
            let result = CorrelationAnalyzer::new().correlate_scores(&scores, x, y, lag)?;

            println!("{} {} vs {} (lag {} days)", "Correlation:".bold(), x, y, lag);
            println!("  r = {:.3}, R² = {:.3}, n = {}", result.coefficient, result.r_squared, result.sample_size);
            println!("  {:?} {:?}", result.significance, result.trend);
            if let Some(p) = result.p_value {
                println!("  p = {:.4}", p);
            }
            if let Some(line) = result.trend_line {
                println!("  y = {:.3}x + {:.3}", line.slope, line.intercept);
            }
        }

        Commands::Config { action } => {
            let path = cli.config.clone().unwrap_or_else(AppConfig::default_config_path);
            match action {
                ConfigAction::Show => {
                    println!("{}", toml::to_string_pretty(&config)?);
                }
                ConfigAction::Init { force } => {
                    if path.exists() && !force {
                        anyhow::bail!(
                            "{} already exists (use --force to overwrite)",
                            path.display()
                        );
                    }
                    AppConfig::default().save_to_file(&path)?;
                    println!("{}", format!("✓ Wrote {}", path.display()).green());
                }
            }
        }
    }

    Ok(())
}

/// Import, validate and score the inputs over their full span
fn load_and_score(input: &InputArgs, config: &AppConfig) -> Result<(AthleteTimeline, Vec<DailyScore>)> {
    let manager = ImportManager::with_validation(config.validation.clone());
    let mut data = vitalrs::import::ImportedData::default();
    for path in &input.inputs {
        data.append(import_path(&manager, path)?);
    }

    let report = manager.validate(&mut data);
    for issue in &report.issues {
        eprintln!("{} {}", "warning:".yellow(), issue);
    }
    if report.rejected_workouts > 0 {
        eprintln!(
            "{} {} workouts rejected",
            "warning:".yellow(),
            report.rejected_workouts
        );
    }

    let mut timeline = AthleteTimeline::from_imported(input.user.clone(), data);
    if let Some(hours) = input.sleep_target {
        anyhow::ensure!(hours > 0.0, "--sleep-target must be positive");
        timeline = timeline.with_sleep_target(Duration::seconds((hours * 3600.0).round() as i64));
    }

    let (start, end) = timeline
        .span()
        .context("No samples or workouts found in the inputs")?;
    let scores = ScoringPipeline::from_config(config).run(&timeline, start, end, None)?;

    Ok((timeline, scores))
}

fn import_path(manager: &ImportManager, path: &Path) -> Result<vitalrs::import::ImportedData> {
    manager
        .import_path(path)
        .with_context(|| format!("Failed to import {}", path.display()))
}
