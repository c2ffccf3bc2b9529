use super::WeeklySummary;
use crate::error::{ImportExportError, Result};
use crate::models::DailyScore;
use serde::Serialize;
use std::path::Path;

/// Flat CSV row for a daily score, suitable for spreadsheet plotting
#[derive(Debug, Serialize)]
struct DailyScoreRow {
    date: String,
    recovery: Option<u8>,
    sleep: Option<u8>,
    strain: Option<f64>,
    daily_tss: f64,
    ctl: f64,
    atl: f64,
    tsb: f64,
    hrv_deviation_pct: Option<f64>,
    sleep_debt_hours: Option<f64>,
    strain_confidence: String,
}

impl From<&DailyScore> for DailyScoreRow {
    fn from(score: &DailyScore) -> Self {
        DailyScoreRow {
            date: score.date.format("%Y-%m-%d").to_string(),
            recovery: score.recovery,
            sleep: score.sleep,
            strain: score.strain,
            daily_tss: round2(score.daily_tss),
            ctl: round2(score.ctl()),
            atl: round2(score.atl()),
            tsb: round2(score.tsb()),
            hrv_deviation_pct: score.hrv_deviation_pct.map(round2),
            sleep_debt_hours: score.sleep_debt_hours.map(round2),
            strain_confidence: if score.strain_confidence.is_reduced() {
                "reduced".to_string()
            } else {
                "full".to_string()
            },
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn write_rows<T, I, P>(rows: I, output_path: P) -> Result<()>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
    P: AsRef<Path>,
{
    let path = output_path.as_ref();
    let failed = |e: ::csv::Error| ImportExportError::ExportFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let mut writer = ::csv::Writer::from_path(path).map_err(failed)?;
    for row in rows {
        writer.serialize(row).map_err(failed)?;
    }
    writer.flush()?;
    Ok(())
}

/// Export daily scores, one row per day
pub fn export_daily_scores<P: AsRef<Path>>(scores: &[DailyScore], output_path: P) -> Result<()> {
    write_rows(scores.iter().map(DailyScoreRow::from), output_path)
}

/// Export weekly summaries to CSV format
pub fn export_weekly_summaries<P: AsRef<Path>>(
    weekly_summaries: &[WeeklySummary],
    output_path: P,
) -> Result<()> {
    write_rows(weekly_summaries.iter(), output_path)
}
