//! Overtraining risk from recent DailyScore history
//!
//! Each factor maps a window statistic to a severity in [0, 1]. The risk score
//! is the weighted mean severity over the factors whose inputs are present,
//! scaled to [0, 100].

use crate::error::CalculationError;
use crate::models::{DailyScore, RiskAssessment, RiskFactor, RiskLevel};
use chrono::Days;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const CALCULATION: &str = "overtraining risk";

pub const LOW_RECOVERY: &str = "low_recovery";
pub const HRV_SUPPRESSION: &str = "hrv_suppression";
pub const NEGATIVE_FORM: &str = "negative_form";
pub const SLEEP_DEBT: &str = "sleep_debt";
pub const ACUTE_LOAD_SPIKE: &str = "acute_load_spike";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    pub low_recovery: f64,
    pub hrv_suppression: f64,
    pub negative_form: f64,
    pub sleep_debt: f64,
    pub acute_load_spike: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        RiskWeights {
            low_recovery: 0.30,
            hrv_suppression: 0.25,
            negative_form: 0.25,
            sleep_debt: 0.10,
            acute_load_spike: 0.10,
        }
    }
}

impl RiskWeights {
    pub fn all_positive(&self) -> bool {
        [
            self.low_recovery,
            self.hrv_suppression,
            self.negative_form,
            self.sleep_debt,
            self.acute_load_spike,
        ]
        .iter()
        .all(|w| *w > 0.0)
    }
}

/// Severity ramps: each factor is 0 at `*_onset` and 1 at `*_onset + *_span`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub weights: RiskWeights,

    /// Minimum days of history in the window (default: 7)
    pub min_history_days: usize,

    /// Factors reported in the assessment (default: 3)
    pub max_reported_factors: usize,

    /// Average recovery below which risk starts
    pub recovery_onset: f64,
    pub recovery_span: f64,

    /// Average HRV drop (%) above which risk starts
    pub hrv_drop_onset: f64,
    pub hrv_drop_span: f64,

    /// Negative TSB beyond which risk starts
    pub tsb_onset: f64,
    pub tsb_span: f64,

    /// Cumulative sleep debt (hours) at full severity
    pub sleep_debt_span_hours: f64,

    /// ATL:CTL ratio above which risk starts
    pub acute_ratio_onset: f64,
    pub acute_ratio_span: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            weights: RiskWeights::default(),
            min_history_days: 7,
            max_reported_factors: 3,
            recovery_onset: 75.0,
            recovery_span: 35.0,
            hrv_drop_onset: 5.0,
            hrv_drop_span: 15.0,
            tsb_onset: 5.0,
            tsb_span: 25.0,
            sleep_debt_span_hours: 7.0,
            acute_ratio_onset: 1.3,
            acute_ratio_span: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
struct WeightedFactor {
    factor: RiskFactor,
    weight: f64,
}

#[derive(Debug, Clone, Default)]
pub struct OvertrainingRiskAssessor {
    config: RiskConfig,
}

impl OvertrainingRiskAssessor {
    pub fn new() -> Self {
        OvertrainingRiskAssessor::default()
    }

    pub fn with_config(config: RiskConfig) -> Self {
        OvertrainingRiskAssessor { config }
    }

    /// Assess the `window` days ending at the latest score
    ///
    /// Returns `InsufficientData` when the window holds fewer than the
    /// minimum number of days.
    pub fn assess(
        &self,
        recent_scores: &[DailyScore],
        window: usize,
    ) -> Result<RiskAssessment, CalculationError> {
        let min = self.config.min_history_days;
        if window < min {
            return Err(CalculationError::InvalidParameter {
                calculation: CALCULATION.to_string(),
                parameter: "window".to_string(),
                value: window.to_string(),
            });
        }

        let mut scores: Vec<&DailyScore> = recent_scores.iter().collect();
        scores.sort_by_key(|s| s.date);
        let latest = match scores.last() {
            Some(latest) => *latest,
            None => return Err(CalculationError::insufficient(CALCULATION, min, 0)),
        };
        let window_start = latest
            .date
            .checked_sub_days(Days::new(window as u64 - 1))
            .unwrap_or(latest.date);
        let scores: Vec<&DailyScore> = scores
            .into_iter()
            .filter(|s| s.date >= window_start)
            .collect();

        if scores.len() < min {
            debug!(available = scores.len(), required = min, "Risk assessment unavailable");
            return Err(CalculationError::insufficient(CALCULATION, min, scores.len()));
        }

        let factors = self.factors(&scores, latest);
        let total_weight: f64 = factors.iter().map(|f| f.weight).sum();
        let risk_score = if total_weight > 0.0 {
            let weighted: f64 = factors.iter().map(|f| f.weight * f.factor.severity).sum();
            (100.0 * weighted / total_weight).clamp(0.0, 100.0)
        } else {
            0.0
        };
        let risk_level = RiskLevel::from_score(risk_score);

        let mut ranked: Vec<RiskFactor> = factors
            .into_iter()
            .map(|f| f.factor)
            .filter(|f| f.severity > 0.0)
            .collect();
        ranked.sort_by(|a, b| b.severity.total_cmp(&a.severity));
        ranked.truncate(self.config.max_reported_factors);

        let recommendation = Self::recommendation(risk_level, ranked.first());

        if risk_level >= RiskLevel::High {
            warn!(risk_score, level = %risk_level, "Elevated overtraining risk");
        } else {
            debug!(risk_score, level = %risk_level, "Overtraining risk assessed");
        }

        Ok(RiskAssessment {
            risk_score,
            risk_level,
            factors: ranked,
            recommendation,
        })
    }

    fn factors(&self, scores: &[&DailyScore], latest: &DailyScore) -> Vec<WeightedFactor> {
        let cfg = &self.config;
        let w = &cfg.weights;
        let mut factors = Vec::new();

        if let Some(avg) = mean(scores.iter().filter_map(|s| s.recovery.map(f64::from))) {
            factors.push(WeightedFactor {
                weight: w.low_recovery,
                factor: RiskFactor {
                    name: LOW_RECOVERY.to_string(),
                    severity: ramp(cfg.recovery_onset - avg, cfg.recovery_span),
                    description: format!("Average recovery {:.0}% over {} days", avg, scores.len()),
                },
            });
        }

        if let Some(avg) = mean(scores.iter().filter_map(|s| s.hrv_deviation_pct)) {
            factors.push(WeightedFactor {
                weight: w.hrv_suppression,
                factor: RiskFactor {
                    name: HRV_SUPPRESSION.to_string(),
                    severity: ramp(avg - cfg.hrv_drop_onset, cfg.hrv_drop_span),
                    description: format!("HRV averaging {:.1}% below baseline", avg),
                },
            });
        }

        let tsb = latest.tsb();
        factors.push(WeightedFactor {
            weight: w.negative_form,
            factor: RiskFactor {
                name: NEGATIVE_FORM.to_string(),
                severity: ramp(-tsb - cfg.tsb_onset, cfg.tsb_span),
                description: format!("Training stress balance at {:.1}", tsb),
            },
        });

        let debts: Vec<f64> = scores.iter().filter_map(|s| s.sleep_debt_hours).collect();
        if !debts.is_empty() {
            let debt: f64 = debts.iter().map(|d| d.max(0.0)).sum();
            factors.push(WeightedFactor {
                weight: w.sleep_debt,
                factor: RiskFactor {
                    name: SLEEP_DEBT.to_string(),
                    severity: ramp(debt, cfg.sleep_debt_span_hours),
                    description: format!("{:.1} hours of accumulated sleep debt", debt),
                },
            });
        }

        if let Some(ratio) = latest.load.acute_chronic_ratio() {
            factors.push(WeightedFactor {
                weight: w.acute_load_spike,
                factor: RiskFactor {
                    name: ACUTE_LOAD_SPIKE.to_string(),
                    severity: ramp(ratio - cfg.acute_ratio_onset, cfg.acute_ratio_span),
                    description: format!("Acute load {:.0}% of chronic load", ratio * 100.0),
                },
            });
        }

        factors
    }

    fn recommendation(level: RiskLevel, top: Option<&RiskFactor>) -> String {
        let base = match level {
            RiskLevel::Low => "Risk is low. Continue the current plan",
            RiskLevel::Moderate => "Monitor closely and keep hard sessions to a minimum",
            RiskLevel::High => "Reduce training load and add recovery days",
            RiskLevel::Critical => "Stop intense training and prioritize rest",
        };
        match (level, top) {
            (RiskLevel::Low, _) | (_, None) => base.to_string(),
            (_, Some(factor)) => {
                let focus = match factor.name.as_str() {
                    LOW_RECOVERY => "recovery has been consistently low",
                    HRV_SUPPRESSION => "HRV is suppressed",
                    NEGATIVE_FORM => "fatigue exceeds fitness",
                    SLEEP_DEBT => "sleep debt is accumulating",
                    _ => "acute load jumped above chronic load",
                };
                format!("{}; {}", base, focus)
            }
        }
    }
}

/// Linear ramp from 0 at `excess = 0` to 1 at `excess = span`
fn ramp(excess: f64, span: f64) -> f64 {
    if span <= 0.0 || !excess.is_finite() {
        return if excess > 0.0 { 1.0 } else { 0.0 };
    }
    (excess / span).clamp(0.0, 1.0)
}

fn mean<I: Iterator<Item = f64>>(values: I) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}
