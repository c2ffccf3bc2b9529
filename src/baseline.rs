//! Rolling personal baselines
//!
//! A baseline is the median of a metric over a trailing window of daily samples,
//! after rejecting values more than `outlier_sigma` population standard
//! deviations from the window mean. The window always ends the day before
//! `as_of`, so a day's own value never leaks into the baseline it is compared
//! against.

use crate::models::{DailySample, Metric};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median, Statistics};
use tracing::debug;

/// Baseline calculation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    /// Trailing window length in days (default: 30)
    pub window_days: u16,

    /// Minimum post-filter samples for a valid baseline (default: 7)
    pub min_samples: usize,

    /// Outlier rejection bound in standard deviations (default: 3.0)
    pub outlier_sigma: f64,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        BaselineConfig {
            window_days: 30,
            min_samples: 7,
            outlier_sigma: 3.0,
        }
    }
}

/// Personal baseline for one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub metric: Metric,
    pub window_days: u16,
    /// Median of the filtered window
    pub median: f64,
    /// Mean of the filtered window
    pub mean: f64,
    /// Population standard deviation of the filtered window
    pub std_dev: f64,
    pub outlier_bound_sigma: f64,
    /// Samples remaining after outlier rejection
    pub sample_count: usize,
    pub rejected_count: usize,
    pub last_computed_date: NaiveDate,
}

impl Baseline {
    /// Percentage deviation of `value` from the median (positive = above)
    pub fn deviation_pct(&self, value: f64) -> Option<f64> {
        if self.median.abs() < f64::EPSILON {
            return None;
        }
        Some((value - self.median) / self.median * 100.0)
    }

    /// Standard score of `value` against the window
    pub fn z_score(&self, value: f64) -> Option<f64> {
        if self.std_dev < f64::EPSILON {
            return None;
        }
        Some((value - self.mean) / self.std_dev)
    }
}

/// Baselines consumed by recovery scoring
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecoveryBaselines {
    pub hrv: Option<Baseline>,
    pub rhr: Option<Baseline>,
    pub respiratory: Option<Baseline>,
}

/// Rolling baseline engine
#[derive(Debug, Clone, Default)]
pub struct BaselineEngine {
    config: BaselineConfig,
}

impl BaselineEngine {
    pub fn new() -> Self {
        BaselineEngine {
            config: BaselineConfig::default(),
        }
    }

    pub fn with_config(config: BaselineConfig) -> Self {
        BaselineEngine { config }
    }

    pub fn config(&self) -> &BaselineConfig {
        &self.config
    }

    /// First date (inclusive) of the window that trails `as_of`
    pub fn window_start(&self, as_of: NaiveDate) -> NaiveDate {
        as_of
            .checked_sub_days(Days::new(self.config.window_days as u64))
            .unwrap_or(NaiveDate::MIN)
    }

    /// Values of `metric` inside `[as_of - window_days, as_of)`
    pub fn window_values<'a, I>(&self, metric: Metric, samples: I, as_of: NaiveDate) -> Vec<f64>
    where
        I: IntoIterator<Item = &'a DailySample>,
    {
        let start = self.window_start(as_of);
        samples
            .into_iter()
            .filter(|s| s.date >= start && s.date < as_of)
            .filter_map(|s| metric.value(s))
            .filter(|v| v.is_finite())
            .collect()
    }

    /// Compute the baseline for one metric, or `None` when the window holds
    /// fewer than the minimum number of valid samples
    pub fn compute_baseline<'a, I>(
        &self,
        metric: Metric,
        samples: I,
        as_of: NaiveDate,
    ) -> Option<Baseline>
    where
        I: IntoIterator<Item = &'a DailySample>,
    {
        let values = self.window_values(metric, samples, as_of);
        if values.len() < self.config.min_samples {
            debug!(
                metric = %metric,
                available = values.len(),
                required = self.config.min_samples,
                "Baseline unavailable"
            );
            return None;
        }

        let filtered = self.reject_outliers(&values);
        let rejected_count = values.len() - filtered.len();
        if filtered.len() < self.config.min_samples {
            debug!(metric = %metric, rejected = rejected_count, "Baseline invalid after outlier rejection");
            return None;
        }

        let mean = filtered.iter().mean();
        let std_dev = filtered.iter().population_std_dev();
        let median = Data::new(filtered.clone()).median();

        debug!(
            metric = %metric,
            median,
            samples = filtered.len(),
            rejected = rejected_count,
            "Baseline computed"
        );

        Some(Baseline {
            metric,
            window_days: self.config.window_days,
            median,
            mean,
            std_dev,
            outlier_bound_sigma: self.config.outlier_sigma,
            sample_count: filtered.len(),
            rejected_count,
            last_computed_date: as_of,
        })
    }

    /// Compute the HRV, RHR and respiratory baselines together
    pub fn compute_recovery_baselines(
        &self,
        samples: &[DailySample],
        as_of: NaiveDate,
    ) -> RecoveryBaselines {
        RecoveryBaselines {
            hrv: self.compute_baseline(Metric::Hrv, samples, as_of),
            rhr: self.compute_baseline(Metric::RestingHeartRate, samples, as_of),
            respiratory: self.compute_baseline(Metric::RespiratoryRate, samples, as_of),
        }
    }

    /// Drop values further than `outlier_sigma` standard deviations from the mean
    fn reject_outliers(&self, values: &[f64]) -> Vec<f64> {
        let mean = values.iter().mean();
        let std_dev = values.iter().population_std_dev();

        if !std_dev.is_finite() || std_dev < f64::EPSILON {
            return values.to_vec();
        }

        let bound = self.config.outlier_sigma * std_dev;
        values
            .iter()
            .copied()
            .filter(|v| (v - mean).abs() <= bound)
            .collect()
    }
}
