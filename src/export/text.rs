use super::ScoreReport;
use crate::error::Result;
use crate::models::DailyScore;
use std::io::Write;
use std::path::Path;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct ScoreRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Recovery")]
    recovery: String,
    #[tabled(rename = "Sleep")]
    sleep: String,
    #[tabled(rename = "Strain")]
    strain: String,
    #[tabled(rename = "TSS")]
    tss: String,
    #[tabled(rename = "CTL")]
    ctl: String,
    #[tabled(rename = "ATL")]
    atl: String,
    #[tabled(rename = "TSB")]
    tsb: String,
}

fn or_dash<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

impl From<&DailyScore> for ScoreRow {
    fn from(score: &DailyScore) -> Self {
        let strain = score.strain.map(|s| {
            if score.strain_confidence.is_reduced() {
                format!("{:.1}*", s)
            } else {
                format!("{:.1}", s)
            }
        });

        ScoreRow {
            date: score.date.format("%Y-%m-%d").to_string(),
            recovery: or_dash(score.recovery),
            sleep: or_dash(score.sleep),
            strain: or_dash(strain),
            tss: format!("{:.0}", score.daily_tss),
            ctl: format!("{:.1}", score.ctl()),
            atl: format!("{:.1}", score.atl()),
            tsb: format!("{:+.1}", score.tsb()),
        }
    }
}

/// Render daily scores as a terminal table
///
/// Strain computed from estimated load is marked with `*`.
pub fn render_scores_table(scores: &[DailyScore]) -> String {
    let rows: Vec<ScoreRow> = scores.iter().map(ScoreRow::from).collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Write a report in human-readable text format
pub fn write_report<W: Write>(report: &ScoreReport, out: &mut W) -> std::io::Result<()> {
    writeln!(out, "==================================================")?;
    writeln!(out, "DAILY SCORES REPORT")?;
    writeln!(out, "==================================================")?;
    writeln!(out)?;

    writeln!(out, "Generated: {}", report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
    match (report.date_range.start, report.date_range.end) {
        (Some(start), Some(end)) => writeln!(out, "Period: {} to {}", start, end)?,
        (Some(start), None) => writeln!(out, "Period: From {}", start)?,
        (None, Some(end)) => writeln!(out, "Period: Up to {}", end)?,
        (None, None) => {}
    }
    writeln!(out)?;

    writeln!(out, "SUMMARY")?;
    writeln!(out, "-------")?;
    writeln!(out, "Days scored: {}", report.days)?;
    writeln!(out, "Average recovery: {}", or_dash(report.avg_recovery.map(|v| format!("{:.0}", v))))?;
    writeln!(out, "Average sleep: {}", or_dash(report.avg_sleep.map(|v| format!("{:.0}", v))))?;
    writeln!(out, "Average strain: {}", or_dash(report.avg_strain.map(|v| format!("{:.1}", v))))?;
    writeln!(out, "Total TSS: {:.0}", report.total_tss)?;
    writeln!(out)?;

    if let Some(load) = &report.load_analysis {
        writeln!(out, "TRAINING LOAD")?;
        writeln!(out, "-------------")?;
        writeln!(out, "Chronic Training Load (CTL): {:.1}", load.current_ctl)?;
        writeln!(out, "Acute Training Load (ATL): {:.1}", load.current_atl)?;
        writeln!(out, "Training Stress Balance (TSB): {:.1}", load.current_tsb)?;
        writeln!(out, "Form Status: {}", load.form_status)?;
        if let Some(ramp) = load.ctl_ramp_rate {
            writeln!(out, "CTL Ramp Rate: {:+.1} TSS/week", ramp)?;
        }
        if let Some(trends) = &load.trends {
            writeln!(
                out,
                "Trends: CTL {:?}, ATL {:?}, TSB {:?}, {} ATL spikes",
                trends.ctl_trend, trends.atl_trend, trends.tsb_trend, trends.atl_spike_count
            )?;
        }
        for recommendation in &load.recommendations {
            writeln!(out, "• {}", recommendation)?;
        }
        writeln!(out)?;
    }

    if let Some(risk) = &report.risk {
        writeln!(out, "OVERTRAINING RISK")?;
        writeln!(out, "-----------------")?;
        writeln!(out, "Risk: {:.0} ({})", risk.risk_score, risk.risk_level)?;
        for factor in &risk.factors {
            writeln!(out, "• {}: {}", factor.name, factor.description)?;
        }
        writeln!(out, "{}", risk.recommendation)?;
        writeln!(out)?;
    }

    if let Some(phase) = &report.phase {
        writeln!(out, "TRAINING PHASE")?;
        writeln!(out, "--------------")?;
        writeln!(
            out,
            "Phase: {} (confidence {:.0}%)",
            phase.phase,
            phase.confidence * 100.0
        )?;
        writeln!(
            out,
            "Weekly TSS: {:.0}, low intensity {:.0}%, high intensity {:.0}%",
            phase.weekly_tss, phase.low_intensity_percent, phase.high_intensity_percent
        )?;
        writeln!(out, "{}", phase.recommendation)?;
        writeln!(out)?;
    }

    if !report.weekly_summaries.is_empty() {
        writeln!(out, "WEEKLY SUMMARIES")?;
        writeln!(out, "----------------")?;
        writeln!(
            out,
            "{:<10} {:>6} {:>8} {:>9} {:>7} {:>7} {:>7}",
            "Week", "Days", "TSS", "Recovery", "Strain", "CTL", "TSB"
        )?;
        for week in &report.weekly_summaries {
            writeln!(
                out,
                "{:<10} {:>6} {:>8.0} {:>9} {:>7} {:>7.1} {:>7.1}",
                format!("{}/{:02}", week.year, week.week_number),
                week.days,
                week.total_tss,
                or_dash(week.avg_recovery.map(|v| format!("{:.0}", v))),
                or_dash(week.avg_strain.map(|v| format!("{:.1}", v))),
                week.end_ctl,
                week.end_tsb
            )?;
        }
        writeln!(out)?;
    }

    if !report.scores.is_empty() {
        writeln!(out, "DAILY SCORES")?;
        writeln!(out, "{}", render_scores_table(&report.scores))?;
        writeln!(out)?;
    }

    writeln!(out, "End of Report")?;
    Ok(())
}

/// Export a report to a text file
pub fn export_report<P: AsRef<Path>>(report: &ScoreReport, output_path: P) -> Result<()> {
    let mut file = std::fs::File::create(output_path)?;
    write_report(report, &mut file)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::tests::score;
    use crate::export::{DateRange, ExportManager};
    use crate::models::{Confidence, RiskAssessment, RiskLevel};
    use chrono::NaiveDate;
    use tempfile::NamedTempFile;

    #[test]
    fn test_render_table_marks_estimates() {
        let date = NaiveDate::from_ymd_opt(2024, 9, 2).unwrap();
        let mut estimated = score(date, Some(40), 90.0);
        estimated.strain_confidence = Confidence::Reduced(vec!["TSS only".to_string()]);

        let table = render_scores_table(&[estimated, score(date.succ_opt().unwrap(), None, 0.0)]);
        assert!(table.contains("Recovery"));
        assert!(table.contains("10.5*"));
        assert!(table.contains("-5.0"));
    }

    #[test]
    fn test_export_report_text() {
        let start = NaiveDate::from_ymd_opt(2024, 9, 2).unwrap();
        let range = DateRange::new(Some(start), None);
        let scores = vec![score(start, Some(62), 70.0)];
        let risk = RiskAssessment {
            risk_score: 41.0,
            risk_level: RiskLevel::Moderate,
            factors: vec![],
            recommendation: "Keep an eye on recovery".to_string(),
        };
        let report = ExportManager::new().generate_report(&scores, &range, Some(risk), None);

        let temp_file = NamedTempFile::new().unwrap();
        export_report(&report, temp_file.path()).unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.contains("DAILY SCORES REPORT"));
        assert!(content.contains("Period: From 2024-09-02"));
        assert!(content.contains("Average recovery: 62"));
        assert!(content.contains("Training Stress Balance (TSB): -5.0"));
        assert!(content.contains("Risk: 41 (Moderate)"));
        assert!(!content.contains("TRAINING PHASE"));
        assert!(content.contains("End of Report"));
    }
}
