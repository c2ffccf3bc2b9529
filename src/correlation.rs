//! Pearson correlation and least-squares trend between paired series

use crate::error::CalculationError;
use crate::models::{CorrelationResult, DailyScore, Significance, Trend, TrendLine};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

const CALCULATION: &str = "correlation";

/// A per-day series that can be read off DailyScore history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSeries {
    Recovery,
    Sleep,
    Strain,
    DailyTss,
    Ctl,
    Atl,
    Tsb,
    HrvDeviation,
}

impl ScoreSeries {
    pub fn value(&self, score: &DailyScore) -> Option<f64> {
        match self {
            ScoreSeries::Recovery => score.recovery.map(f64::from),
            ScoreSeries::Sleep => score.sleep.map(f64::from),
            ScoreSeries::Strain => score.strain,
            ScoreSeries::DailyTss => Some(score.daily_tss),
            ScoreSeries::Ctl => Some(score.ctl()),
            ScoreSeries::Atl => Some(score.atl()),
            ScoreSeries::Tsb => Some(score.tsb()),
            ScoreSeries::HrvDeviation => score.hrv_deviation_pct,
        }
    }

    pub fn extract(&self, scores: &[DailyScore]) -> BTreeMap<NaiveDate, f64> {
        scores
            .iter()
            .filter_map(|s| self.value(s).map(|v| (s.date, v)))
            .collect()
    }
}

impl fmt::Display for ScoreSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScoreSeries::Recovery => "recovery",
            ScoreSeries::Sleep => "sleep",
            ScoreSeries::Strain => "strain",
            ScoreSeries::DailyTss => "tss",
            ScoreSeries::Ctl => "ctl",
            ScoreSeries::Atl => "atl",
            ScoreSeries::Tsb => "tsb",
            ScoreSeries::HrvDeviation => "hrv-deviation",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ScoreSeries {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "recovery" => Ok(ScoreSeries::Recovery),
            "sleep" => Ok(ScoreSeries::Sleep),
            "strain" => Ok(ScoreSeries::Strain),
            "tss" | "daily-tss" => Ok(ScoreSeries::DailyTss),
            "ctl" => Ok(ScoreSeries::Ctl),
            "atl" => Ok(ScoreSeries::Atl),
            "tsb" => Ok(ScoreSeries::Tsb),
            "hrv" | "hrv-deviation" => Ok(ScoreSeries::HrvDeviation),
            _ => Err(format!("Unknown series: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CorrelationAnalyzer;

impl CorrelationAnalyzer {
    pub fn new() -> Self {
        CorrelationAnalyzer
    }

    /// Pearson correlation, R², OLS trend line and p-value
    ///
    /// With no variance in `xs` the coefficient is 0 and the trend line is
    /// undefined.
    pub fn analyze(&self, xs: &[f64], ys: &[f64]) -> Result<CorrelationResult, CalculationError> {
        if xs.len() != ys.len() {
            return Err(CalculationError::LengthMismatch {
                calculation: CALCULATION.to_string(),
                left: xs.len(),
                right: ys.len(),
            });
        }
        if xs.len() < 2 {
            return Err(CalculationError::insufficient(CALCULATION, 2, xs.len()));
        }
        if let Some(bad) = xs.iter().chain(ys).find(|v| !v.is_finite()) {
            return Err(CalculationError::InvalidParameter {
                calculation: CALCULATION.to_string(),
                parameter: "value".to_string(),
                value: bad.to_string(),
            });
        }

        let n = xs.len() as f64;
        let mean_x = xs.iter().sum::<f64>() / n;
        let mean_y = ys.iter().sum::<f64>() / n;

        let (sxx, syy, sxy) = xs.iter().zip(ys).fold((0.0, 0.0, 0.0), |(sxx, syy, sxy), (x, y)| {
            let dx = x - mean_x;
            let dy = y - mean_y;
            (sxx + dx * dx, syy + dy * dy, sxy + dx * dy)
        });

        let denominator = (sxx * syy).sqrt();
        let coefficient = if denominator < f64::EPSILON {
            0.0
        } else {
            (sxy / denominator).clamp(-1.0, 1.0)
        };

        let trend_line = (sxx >= f64::EPSILON).then(|| {
            let slope = sxy / sxx;
            TrendLine {
                slope,
                intercept: mean_y - slope * mean_x,
            }
        });

        let p_value = if denominator < f64::EPSILON {
            None
        } else {
            Self::p_value(coefficient, xs.len())
        };

        debug!(
            n = xs.len(),
            coefficient,
            p_value = ?p_value,
            "Correlation computed"
        );

        Ok(CorrelationResult {
            coefficient,
            r_squared: coefficient * coefficient,
            sample_size: xs.len(),
            significance: Significance::from_coefficient(coefficient),
            trend: if coefficient < 0.0 {
                Trend::Negative
            } else {
                Trend::Positive
            },
            trend_line,
            p_value,
        })
    }

    /// Two-sided Student-t p-value for H0: r = 0, df = n - 2
    pub fn p_value(r: f64, n: usize) -> Option<f64> {
        if n <= 2 {
            return None;
        }
        let df = (n - 2) as f64;
        let residual = 1.0 - r * r;
        if residual <= 1e-12 {
            return Some(0.0);
        }

        let t = r * (df / residual).sqrt();
        let dist = StudentsT::new(0.0, 1.0, df).ok()?;
        Some((2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0))
    }

    /// Pair values where `ys` falls `lag_days` after `xs`
    pub fn pair_by_date(
        xs: &BTreeMap<NaiveDate, f64>,
        ys: &BTreeMap<NaiveDate, f64>,
        lag_days: u32,
    ) -> (Vec<f64>, Vec<f64>) {
        xs.iter()
            .filter_map(|(date, x)| {
                let target = date.checked_add_days(Days::new(lag_days as u64))?;
                ys.get(&target).map(|y| (*x, *y))
            })
            .unzip()
    }

    /// Correlate two DailyScore series, optionally lagged
    pub fn correlate_scores(
        &self,
        scores: &[DailyScore],
        x: ScoreSeries,
        y: ScoreSeries,
        lag_days: u32,
    ) -> Result<CorrelationResult, CalculationError> {
        let (xs, ys) = Self::pair_by_date(&x.extract(scores), &y.extract(scores), lag_days);
        self.analyze(&xs, &ys)
    }

    /// Recovery on a day against an external performance measure `lag_days` later
    pub fn recovery_vs_performance(
        &self,
        scores: &[DailyScore],
        performance: &BTreeMap<NaiveDate, f64>,
        lag_days: u32,
    ) -> Result<CorrelationResult, CalculationError> {
        let recovery = ScoreSeries::Recovery.extract(scores);
        let (xs, ys) = Self::pair_by_date(&recovery, performance, lag_days);
        self.analyze(&xs, &ys)
    }
}
