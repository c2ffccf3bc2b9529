use crate::error::{ImportExportError, Result};
use crate::models::{DailyScore, PhaseResult, RiskAssessment};
use crate::pmc::{PmcConfig, PmcTrends, TrainingLoadTracker, TsbInterpretation};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

pub mod csv;
pub mod json;
pub mod text;

/// Export format types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Csv,
    Json,
    Text,
}

impl FromStr for ExportFormat {
    type Err = ImportExportError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "text" | "txt" | "table" => Ok(ExportFormat::Text),
            _ => Err(ImportExportError::UnsupportedFormat {
                format: s.to_string(),
            }),
        }
    }
}

/// Date range filter for exports
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        DateRange { start, end }
    }

    /// Check if a date falls within this range
    pub fn contains(&self, date: &NaiveDate) -> bool {
        let after_start = self.start.map_or(true, |start| date >= &start);
        let before_end = self.end.map_or(true, |end| date <= &end);
        after_start && before_end
    }

    pub fn filter_scores<'a>(&self, scores: &'a [DailyScore]) -> Vec<&'a DailyScore> {
        scores.iter().filter(|s| self.contains(&s.date)).collect()
    }
}

/// Weekly rollup of daily scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySummary {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub year: i32,
    pub week_number: u32,
    pub days: u16,
    pub total_tss: f64,
    pub avg_recovery: Option<f64>,
    pub avg_sleep: Option<f64>,
    pub avg_strain: Option<f64>,
    /// Load state on the last scored day of the week
    pub end_ctl: f64,
    pub end_atl: f64,
    pub end_tsb: f64,
}

/// Load section of a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadAnalysisReport {
    pub current_ctl: f64,
    pub current_atl: f64,
    pub current_tsb: f64,
    pub form_status: String,
    /// CTL change per week over the configured ramp period
    pub ctl_ramp_rate: Option<f64>,
    pub atl_spike: bool,
    /// Only present once the period covers the configured minimum history
    pub trends: Option<PmcTrends>,
    pub recommendations: Vec<String>,
}

/// Everything exported for a period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub date_range: DateRange,
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub days: usize,
    pub avg_recovery: Option<f64>,
    pub avg_sleep: Option<f64>,
    pub avg_strain: Option<f64>,
    pub total_tss: f64,
    pub load_analysis: Option<LoadAnalysisReport>,
    pub weekly_summaries: Vec<WeeklySummary>,
    pub risk: Option<RiskAssessment>,
    pub phase: Option<PhaseResult>,
    pub scores: Vec<DailyScore>,
}

/// Main export manager
pub struct ExportManager {
    tracker: TrainingLoadTracker,
}

impl Default for ExportManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportManager {
    pub fn new() -> Self {
        Self::with_config(PmcConfig::default())
    }

    pub fn with_config(config: PmcConfig) -> Self {
        ExportManager {
            tracker: TrainingLoadTracker::with_config(config),
        }
    }

    /// Write daily scores in the requested format
    pub fn export_scores<P: AsRef<Path>>(
        &self,
        scores: &[DailyScore],
        format: ExportFormat,
        date_range: &DateRange,
        output_path: P,
    ) -> Result<()> {
        let filtered: Vec<DailyScore> =
            date_range.filter_scores(scores).into_iter().cloned().collect();

        match format {
            ExportFormat::Csv => csv::export_daily_scores(&filtered, output_path.as_ref())?,
            ExportFormat::Json => json::export_json(&filtered, output_path.as_ref())?,
            ExportFormat::Text => {
                let report = self.generate_report(&filtered, date_range, None, None);
                text::export_report(&report, output_path.as_ref())?
            }
        }

        info!(
            path = %output_path.as_ref().display(),
            days = filtered.len(),
            format = ?format,
            "Scores exported"
        );
        Ok(())
    }

    /// Write a full report (scores plus analytics)
    pub fn export_report<P: AsRef<Path>>(
        &self,
        report: &ScoreReport,
        format: ExportFormat,
        output_path: P,
    ) -> Result<()> {
        match format {
            ExportFormat::Json => json::export_json(report, output_path.as_ref()),
            ExportFormat::Text => text::export_report(report, output_path.as_ref()),
            ExportFormat::Csv => csv::export_weekly_summaries(&report.weekly_summaries, output_path.as_ref()),
        }
    }

    pub fn generate_report(
        &self,
        scores: &[DailyScore],
        date_range: &DateRange,
        risk: Option<RiskAssessment>,
        phase: Option<PhaseResult>,
    ) -> ScoreReport {
        let scores: Vec<DailyScore> = date_range.filter_scores(scores).into_iter().cloned().collect();

        let series = self
            .tracker
            .annotate(scores.iter().map(|s| (s.date, s.load, s.daily_tss)));
        let load_analysis = series.last().map(|latest| LoadAnalysisReport {
            current_ctl: latest.ctl(),
            current_atl: latest.atl(),
            current_tsb: latest.tsb(),
            form_status: TsbInterpretation::from_tsb(latest.tsb()).description().to_string(),
            ctl_ramp_rate: latest.ctl_ramp_rate,
            atl_spike: latest.atl_spike,
            trends: self.tracker.analyze_trends(&series).ok(),
            recommendations: self.tracker.generate_recommendations(latest),
        });

        ScoreReport {
            date_range: date_range.clone(),
            generated_at: chrono::Utc::now(),
            days: scores.len(),
            avg_recovery: average(scores.iter().filter_map(|s| s.recovery.map(f64::from))),
            avg_sleep: average(scores.iter().filter_map(|s| s.sleep.map(f64::from))),
            avg_strain: average(scores.iter().filter_map(|s| s.strain)),
            total_tss: scores.iter().map(|s| s.daily_tss).sum(),
            load_analysis,
            weekly_summaries: self.generate_weekly_summaries(&scores),
            risk,
            phase,
            scores,
        }
    }

    /// Group scores by ISO week
    pub fn generate_weekly_summaries(&self, scores: &[DailyScore]) -> Vec<WeeklySummary> {
        let mut weekly_data: BTreeMap<(i32, u32), Vec<&DailyScore>> = BTreeMap::new();
        for score in scores {
            let week = score.date.iso_week();
            weekly_data
                .entry((week.year(), week.week()))
                .or_default()
                .push(score);
        }

        weekly_data
            .into_iter()
            .filter_map(|((year, week_number), mut days)| {
                days.sort_by_key(|s| s.date);
                let last = days.last()?;
                let week_start =
                    NaiveDate::from_isoywd_opt(year, week_number, chrono::Weekday::Mon)?;
                let week_end = NaiveDate::from_isoywd_opt(year, week_number, chrono::Weekday::Sun)?;

                Some(WeeklySummary {
                    week_start,
                    week_end,
                    year,
                    week_number,
                    days: days.len() as u16,
                    total_tss: days.iter().map(|s| s.daily_tss).sum(),
                    avg_recovery: average(days.iter().filter_map(|s| s.recovery.map(f64::from))),
                    avg_sleep: average(days.iter().filter_map(|s| s.sleep.map(f64::from))),
                    avg_strain: average(days.iter().filter_map(|s| s.strain)),
                    end_ctl: last.ctl(),
                    end_atl: last.atl(),
                    end_tsb: last.tsb(),
                })
            })
            .collect()
    }
}

fn average<I: Iterator<Item = f64>>(values: I) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}
