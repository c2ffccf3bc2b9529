//! Daily recovery score
//!
//! Converts the current day's deviations from personal baselines into a
//! composite 0-100 readiness score.
//!
//! # Components
//!
//! | Component | Base weight | Input |
//! |-----------|-------------|-------|
//! | HRV | 30% | drop below the HRV baseline |
//! | Resting HR | 20% | elevation above the RHR baseline |
//! | Sleep | 30% | the night's sleep score |
//! | Respiratory | 10% | deviation from the respiratory baseline |
//! | Form | 10% | Training Stress Balance |
//!
//! A component whose current value or baseline is missing is excluded and the
//! remaining weights are rescaled (see [`crate::scoring`]). With nothing
//! available the score is a neutral 50.
//!
//! # HRV penalty curve
//!
//! HRV is the most recovery-sensitive signal, so small drops cost little and
//! large drops cost a lot:
//!
//! - 0-10% drop: 100 → 85
//! - 10-20% drop: 85 → 60
//! - 20-35% drop: 60 → 30
//! - 35-70% drop: 30 → 0

use crate::baseline::{Baseline, RecoveryBaselines};
use crate::models::{DailySample, TrainingLoad};
use crate::scoring::{compose, piecewise_linear, Component, Composite};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

pub const HRV_COMPONENT: &str = "hrv";
pub const RHR_COMPONENT: &str = "resting_hr";
pub const SLEEP_COMPONENT: &str = "sleep";
pub const RESPIRATORY_COMPONENT: &str = "respiratory";
pub const FORM_COMPONENT: &str = "form";

/// Base component weights; they are normalised, so any positive scale works
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryWeights {
    pub hrv: f64,
    pub rhr: f64,
    pub sleep: f64,
    pub respiratory: f64,
    pub form: f64,
}

impl Default for RecoveryWeights {
    fn default() -> Self {
        RecoveryWeights {
            hrv: 0.30,
            rhr: 0.20,
            sleep: 0.30,
            respiratory: 0.10,
            form: 0.10,
        }
    }
}

impl RecoveryWeights {
    pub fn all_positive(&self) -> bool {
        [self.hrv, self.rhr, self.sleep, self.respiratory, self.form]
            .iter()
            .all(|w| *w > 0.0)
    }
}

/// Recovery scoring configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    pub weights: RecoveryWeights,
}

/// HRV status relative to the personal baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HrvStatus {
    /// More than 30% below baseline
    Poor,
    /// 15-30% below baseline
    Unbalanced,
    /// Within 15% of baseline or above it
    Balanced,
    /// No reading or no baseline
    NoReading,
}

impl HrvStatus {
    /// Status from the percentage drop below baseline (positive = below)
    pub fn from_drop_pct(drop_pct: Option<f64>) -> Self {
        match drop_pct {
            None => HrvStatus::NoReading,
            Some(d) if d <= 15.0 => HrvStatus::Balanced,
            Some(d) if d <= 30.0 => HrvStatus::Unbalanced,
            Some(_) => HrvStatus::Poor,
        }
    }
}

impl fmt::Display for HrvStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HrvStatus::Poor => write!(f, "Poor"),
            HrvStatus::Unbalanced => write!(f, "Unbalanced"),
            HrvStatus::Balanced => write!(f, "Balanced"),
            HrvStatus::NoReading => write!(f, "No Reading"),
        }
    }
}

/// Readiness band for a recovery score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryCategory {
    /// 67-100: ready for hard training
    Green,
    /// 34-66: moderate training
    Yellow,
    /// 0-33: rest or active recovery
    Red,
}

impl RecoveryCategory {
    pub fn from_score(score: u8) -> Self {
        if score >= 67 {
            RecoveryCategory::Green
        } else if score >= 34 {
            RecoveryCategory::Yellow
        } else {
            RecoveryCategory::Red
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            RecoveryCategory::Green => "Well recovered - good day for high-intensity work",
            RecoveryCategory::Yellow => "Partially recovered - keep intensity moderate",
            RecoveryCategory::Red => "Under-recovered - prioritize rest or easy movement",
        }
    }
}

/// Full recovery breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryAssessment {
    pub score: u8,
    pub category: RecoveryCategory,
    pub hrv_status: HrvStatus,
    /// Percentage HRV sits below baseline
    pub hrv_drop_pct: Option<f64>,
    pub composite: Composite,
}

/// Recovery scorer
#[derive(Debug, Clone, Default)]
pub struct RecoveryScorer {
    config: RecoveryConfig,
}

impl RecoveryScorer {
    pub fn new() -> Self {
        RecoveryScorer::default()
    }

    pub fn with_config(config: RecoveryConfig) -> Self {
        RecoveryScorer { config }
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Composite 0-100 recovery score
    pub fn score(
        &self,
        today: &DailySample,
        baselines: &RecoveryBaselines,
        sleep_score: Option<f64>,
        training_load: Option<TrainingLoad>,
    ) -> u8 {
        self.assess(today, baselines, sleep_score, training_load)
            .score
    }

    /// Recovery score with component breakdown
    pub fn assess(
        &self,
        today: &DailySample,
        baselines: &RecoveryBaselines,
        sleep_score: Option<f64>,
        training_load: Option<TrainingLoad>,
    ) -> RecoveryAssessment {
        let weights = &self.config.weights;

        let hrv_drop = Self::hrv_drop_pct(today, baselines.hrv.as_ref());
        let rhr_elevation = Self::relative_change(today.rhr_bpm, baselines.rhr.as_ref());
        let resp_deviation = match (today.respiratory_rate, baselines.respiratory.as_ref()) {
            (Some(rate), Some(baseline)) => Some((rate - baseline.median).abs()),
            _ => None,
        };

        let components = vec![
            Component::new(HRV_COMPONENT, weights.hrv, hrv_drop.map(Self::hrv_subscore)),
            Component::new(RHR_COMPONENT, weights.rhr, rhr_elevation.map(Self::rhr_subscore)),
            Component::new(
                SLEEP_COMPONENT,
                weights.sleep,
                sleep_score.filter(|s| s.is_finite()).map(|s| s.clamp(0.0, 100.0)),
            ),
            Component::new(
                RESPIRATORY_COMPONENT,
                weights.respiratory,
                resp_deviation.map(Self::respiratory_subscore),
            ),
            Component::new(
                FORM_COMPONENT,
                weights.form,
                training_load.map(|load| Self::form_subscore(load.tsb())),
            ),
        ];

        let composite = compose(&components);

        debug!(
            date = %today.date,
            score = composite.score,
            dropped = ?composite.dropped,
            "Recovery scored"
        );

        RecoveryAssessment {
            score: composite.score,
            category: RecoveryCategory::from_score(composite.score),
            hrv_status: HrvStatus::from_drop_pct(hrv_drop),
            hrv_drop_pct: hrv_drop,
            composite,
        }
    }

    /// Percentage HRV sits below its baseline (negative when above)
    pub fn hrv_drop_pct(today: &DailySample, baseline: Option<&Baseline>) -> Option<f64> {
        Self::relative_change(today.hrv_ms, baseline).map(|change| -change)
    }

    fn relative_change(value: Option<f64>, baseline: Option<&Baseline>) -> Option<f64> {
        match (value, baseline) {
            (Some(v), Some(b)) => b.deviation_pct(v),
            _ => None,
        }
    }

    /// Non-linear HRV penalty keyed to percentage drop from baseline
    pub fn hrv_subscore(drop_pct: f64) -> f64 {
        piecewise_linear(
            drop_pct,
            &[
                (0.0, 100.0),
                (10.0, 85.0),
                (20.0, 60.0),
                (35.0, 30.0),
                (70.0, 0.0),
            ],
        )
    }

    /// RHR elevation penalty, scaled to RHR's narrower day-to-day variance
    pub fn rhr_subscore(elevation_pct: f64) -> f64 {
        piecewise_linear(
            elevation_pct,
            &[
                (0.0, 100.0),
                (3.0, 85.0),
                (7.0, 60.0),
                (12.0, 30.0),
                (25.0, 0.0),
            ],
        )
    }

    /// Respiratory-rate penalty on absolute deviation in breaths/min
    pub fn respiratory_subscore(deviation: f64) -> f64 {
        piecewise_linear(
            deviation,
            &[(0.5, 100.0), (1.5, 70.0), (3.0, 30.0), (5.0, 0.0)],
        )
    }

    /// Form sub-score from Training Stress Balance
    pub fn form_subscore(tsb: f64) -> f64 {
        piecewise_linear(
            tsb,
            &[(-50.0, 0.0), (-30.0, 30.0), (-10.0, 70.0), (5.0, 100.0)],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metric;
    use chrono::NaiveDate;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn baseline(metric: Metric, median: f64) -> Baseline {
        Baseline {
            metric,
            window_days: 30,
            median,
            mean: median,
            std_dev: 1.0,
            outlier_bound_sigma: 3.0,
            sample_count: 30,
            rejected_count: 0,
            last_computed_date: date(),
        }
    }

    fn full_baselines() -> RecoveryBaselines {
        RecoveryBaselines {
            hrv: Some(baseline(Metric::Hrv, 60.0)),
            rhr: Some(baseline(Metric::RestingHeartRate, 50.0)),
            respiratory: Some(baseline(Metric::RespiratoryRate, 14.0)),
        }
    }

    fn sample(hrv: f64, rhr: f64, resp: f64) -> DailySample {
        DailySample {
            hrv_ms: Some(hrv),
            rhr_bpm: Some(rhr),
            respiratory_rate: Some(resp),
            ..DailySample::new(date())
        }
    }

    #[test]
    fn test_hrv_curve_knots() {
        assert_eq!(RecoveryScorer::hrv_subscore(-10.0), 100.0);
        assert_eq!(RecoveryScorer::hrv_subscore(0.0), 100.0);
        assert_eq!(RecoveryScorer::hrv_subscore(10.0), 85.0);
        assert_eq!(RecoveryScorer::hrv_subscore(20.0), 60.0);
        assert_eq!(RecoveryScorer::hrv_subscore(35.0), 30.0);
        assert_eq!(RecoveryScorer::hrv_subscore(90.0), 0.0);
        assert!((RecoveryScorer::hrv_subscore(15.0) - 72.5).abs() < 1e-9);
    }

    #[test]
    fn test_rhr_curve_is_monotonic() {
        let mut previous = f64::MAX;
        for step in 0..60 {
            let score = RecoveryScorer::rhr_subscore(step as f64 * 0.5);
            assert!(score <= previous);
            previous = score;
        }
    }

    #[test]
    fn test_form_subscore() {
        assert_eq!(RecoveryScorer::form_subscore(20.0), 100.0);
        assert_eq!(RecoveryScorer::form_subscore(-10.0), 70.0);
        assert_eq!(RecoveryScorer::form_subscore(-60.0), 0.0);
    }

    #[test]
    fn test_at_baseline_is_high() {
        let scorer = RecoveryScorer::new();
        let score = scorer.score(
            &sample(60.0, 50.0, 14.0),
            &full_baselines(),
            Some(90.0),
            Some(TrainingLoad::new(50.0, 45.0)),
        );
        // 0.3*100 + 0.2*100 + 0.3*90 + 0.1*100 + 0.1*100
        assert_eq!(score, 97);
    }

    #[test]
    fn test_suppressed_hrv_lowers_score() {
        let scorer = RecoveryScorer::new();
        let good = scorer.score(&sample(60.0, 50.0, 14.0), &full_baselines(), Some(80.0), None);
        let bad = scorer.score(&sample(40.0, 56.0, 16.0), &full_baselines(), Some(80.0), None);
        assert!(bad < good);

        let assessment =
            scorer.assess(&sample(40.0, 56.0, 16.0), &full_baselines(), Some(80.0), None);
        assert_eq!(assessment.hrv_status, HrvStatus::Unbalanced);
        assert!(assessment.composite.dropped.contains(&FORM_COMPONENT.to_string()));
    }

    #[test]
    fn test_missing_everything_is_neutral() {
        let scorer = RecoveryScorer::new();
        let score = scorer.score(
            &DailySample::new(date()),
            &RecoveryBaselines::default(),
            None,
            None,
        );
        assert_eq!(score, 50);
    }

    #[test]
    fn test_missing_baseline_drops_component() {
        let scorer = RecoveryScorer::new();
        let baselines = RecoveryBaselines {
            hrv: None,
            ..full_baselines()
        };
        let assessment = scorer.assess(&sample(20.0, 50.0, 14.0), &baselines, None, None);

        assert!(assessment
            .composite
            .dropped
            .contains(&HRV_COMPONENT.to_string()));
        assert_eq!(assessment.hrv_status, HrvStatus::NoReading);
        // RHR and respiratory at baseline carry the score alone
        assert_eq!(assessment.score, 100);
    }

    #[test]
    fn test_category_bands() {
        assert_eq!(RecoveryCategory::from_score(80), RecoveryCategory::Green);
        assert_eq!(RecoveryCategory::from_score(50), RecoveryCategory::Yellow);
        assert_eq!(RecoveryCategory::from_score(20), RecoveryCategory::Red);
    }
}
