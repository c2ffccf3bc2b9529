use crate::error::CalculationError;
use crate::models::{TrainingLoad, WorkoutRecord};
use chrono::{Days, NaiveDate};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Chronic load time constant in days
pub const CTL_TIME_CONSTANT: f64 = 42.0;

/// Acute load time constant in days
pub const ATL_TIME_CONSTANT: f64 = 7.0;

/// Training load errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PmcError {
    #[error("Insufficient data for trend analysis: need {required} days, have {available}")]
    InsufficientData { required: usize, available: usize },
    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),
    #[error("Out of order update: {date} is not after {last}")]
    OutOfOrder { date: NaiveDate, last: NaiveDate },
}

impl From<PmcError> for CalculationError {
    fn from(err: PmcError) -> Self {
        match err {
            PmcError::OutOfOrder { date, last } => CalculationError::OutOfOrder { date, last },
            PmcError::InvalidDateRange(range) => CalculationError::InvalidParameter {
                calculation: "training load".to_string(),
                parameter: "date range".to_string(),
                value: range,
            },
            PmcError::InsufficientData { required, available } => {
                CalculationError::insufficient("training load trends", required, available)
            }
        }
    }
}

/// Daily TSS record aggregated from workouts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTss {
    pub date: NaiveDate,

    /// Total TSS for the day (sum of all workouts)
    pub total_tss: Decimal,

    pub workout_count: u16,

    /// Individual workout TSS values
    pub workout_tss_values: Vec<Decimal>,
}

impl DailyTss {
    pub fn total_f64(&self) -> f64 {
        self.total_tss.to_f64().unwrap_or(0.0)
    }
}

/// Training load for a specific date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PmcMetrics {
    pub date: NaiveDate,

    /// CTL/ATL after applying the day's TSS
    pub load: TrainingLoad,

    pub daily_tss: f64,

    /// CTL change per week
    pub ctl_ramp_rate: Option<f64>,

    /// ATL well above its recent average
    pub atl_spike: bool,
}

impl PmcMetrics {
    pub fn ctl(&self) -> f64 {
        self.load.ctl()
    }

    pub fn atl(&self) -> f64 {
        self.load.atl()
    }

    pub fn tsb(&self) -> f64 {
        self.load.tsb()
    }
}

/// Tracker settings. The 42/7 day time constants are fixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PmcConfig {
    /// Minimum days required for trend analysis
    pub min_data_days: u16,

    /// ATL spike threshold (multiple of the trailing week's average ATL)
    pub atl_spike_threshold: f64,

    /// Ramp rate calculation period in days
    pub ramp_rate_days: u16,
}

impl Default for PmcConfig {
    fn default() -> Self {
        PmcConfig {
            min_data_days: 14,
            atl_spike_threshold: 1.5,
            ramp_rate_days: 7,
        }
    }
}

/// Training Stress Balance interpretation ranges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TsbInterpretation {
    VeryFresh,    // +25 and above
    Fresh,        // +5 to +25
    Neutral,      // -10 to +5
    Fatigued,     // -30 to -10
    VeryFatigued, // Below -30
}

impl TsbInterpretation {
    pub fn from_tsb(tsb: f64) -> Self {
        if tsb >= 25.0 {
            TsbInterpretation::VeryFresh
        } else if tsb >= 5.0 {
            TsbInterpretation::Fresh
        } else if tsb >= -10.0 {
            TsbInterpretation::Neutral
        } else if tsb >= -30.0 {
            TsbInterpretation::Fatigued
        } else {
            TsbInterpretation::VeryFatigued
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            TsbInterpretation::VeryFresh => "Very fresh (may be losing fitness)",
            TsbInterpretation::Fresh => "Fresh and ready for hard training/racing",
            TsbInterpretation::Neutral => "Neutral (normal training)",
            TsbInterpretation::Fatigued => "Fatigued (monitor closely)",
            TsbInterpretation::VeryFatigued => "Very fatigued (rest needed)",
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            TsbInterpretation::VeryFresh => {
                "Consider increasing training load or plan peak performance"
            }
            TsbInterpretation::Fresh => "Good time for high-intensity sessions or racing",
            TsbInterpretation::Neutral => "Continue normal training progression",
            TsbInterpretation::Fatigued => "Reduce intensity, focus on recovery sessions",
            TsbInterpretation::VeryFatigued => {
                "Prioritize rest and recovery before resuming training"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PmcTrends {
    pub ctl_trend: TrendDirection,
    pub atl_trend: TrendDirection,
    pub tsb_trend: TrendDirection,

    /// Average CTL ramp rate (TSS/week)
    pub avg_ctl_ramp_rate: f64,

    pub atl_spike_count: u16,
    pub days_since_last_spike: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Increasing,
    Stable,
    Decreasing,
}

/// Exponentially weighted training load (Banister impulse-response)
///
/// ```text
/// CTL_today = CTL_yesterday × e^(-1/42) + TSS_today × (1 - e^(-1/42))
/// ATL_today = ATL_yesterday × e^(-1/7)  + TSS_today × (1 - e^(-1/7))
/// TSB_today = CTL_today - ATL_today
/// ```
#[derive(Debug, Clone, Default)]
pub struct TrainingLoadTracker {
    config: PmcConfig,
}

impl TrainingLoadTracker {
    pub fn new() -> Self {
        TrainingLoadTracker {
            config: PmcConfig::default(),
        }
    }

    pub fn with_config(config: PmcConfig) -> Self {
        TrainingLoadTracker { config }
    }

    pub fn ctl_decay() -> f64 {
        (-1.0 / CTL_TIME_CONSTANT).exp()
    }

    pub fn atl_decay() -> f64 {
        (-1.0 / ATL_TIME_CONSTANT).exp()
    }

    /// Apply one day's TSS. With no previous state the day seeds CTL = ATL = TSS.
    pub fn update(daily_tss: f64, previous: Option<TrainingLoad>) -> TrainingLoad {
        let tss = if daily_tss.is_finite() {
            daily_tss.max(0.0)
        } else {
            0.0
        };

        match previous {
            None => TrainingLoad::new(tss, tss),
            Some(prev) => {
                let ctl_decay = Self::ctl_decay();
                let atl_decay = Self::atl_decay();
                TrainingLoad::new(
                    prev.ctl() * ctl_decay + tss * (1.0 - ctl_decay),
                    prev.atl() * atl_decay + tss * (1.0 - atl_decay),
                )
            }
        }
    }

    /// Fold an ordered sequence of daily TSS values
    pub fn fold<I>(tss: I, initial: Option<TrainingLoad>) -> Option<TrainingLoad>
    where
        I: IntoIterator<Item = f64>,
    {
        tss.into_iter()
            .fold(initial, |load, t| Some(Self::update(t, load)))
    }

    /// Aggregate daily TSS from a collection of workouts
    pub fn aggregate_daily_tss(&self, workouts: &[WorkoutRecord]) -> BTreeMap<NaiveDate, DailyTss> {
        let mut daily_tss: BTreeMap<NaiveDate, DailyTss> = BTreeMap::new();

        for workout in workouts {
            let tss = workout.training_stress_score.max(Decimal::ZERO);

            daily_tss
                .entry(workout.date)
                .and_modify(|day| {
                    day.total_tss += tss;
                    day.workout_count += 1;
                    day.workout_tss_values.push(tss);
                })
                .or_insert(DailyTss {
                    date: workout.date,
                    total_tss: tss,
                    workout_count: 1,
                    workout_tss_values: vec![tss],
                });
        }

        daily_tss
    }

    /// Replay the load chain over `[start, end]`, one entry per calendar day
    ///
    /// Days without workouts apply zero TSS so load still decays across gaps.
    /// `initial` is the load of the day before `start`.
    pub fn replay(
        &self,
        daily_tss: &BTreeMap<NaiveDate, DailyTss>,
        start: NaiveDate,
        end: NaiveDate,
        initial: Option<TrainingLoad>,
    ) -> Result<Vec<PmcMetrics>, PmcError> {
        if start > end {
            return Err(PmcError::InvalidDateRange(format!(
                "start {} is after end {}",
                start, end
            )));
        }

        let mut series: Vec<PmcMetrics> = Vec::new();
        let mut ctl_history = Vec::new();
        let mut load = initial;

        for date in start.iter_days().take_while(|d| *d <= end) {
            let tss = daily_tss.get(&date).map_or(0.0, DailyTss::total_f64);
            let today = Self::update(tss, load);
            ctl_history.push(today.ctl());

            let ctl_ramp_rate = self.ramp_rate(&ctl_history);
            let atl_spike = self.detect_atl_spike(today.atl(), &series);

            series.push(PmcMetrics {
                date,
                load: today,
                daily_tss: tss,
                ctl_ramp_rate,
                atl_spike,
            });
            load = Some(today);
        }

        debug!(
            start = %start,
            end = %end,
            days = series.len(),
            "Training load replayed"
        );

        Ok(series)
    }

    /// Ramp rate and ATL spike flags for an already computed load series
    ///
    /// `days` must be consecutive calendar days in order.
    pub fn annotate<I>(&self, days: I) -> Vec<PmcMetrics>
    where
        I: IntoIterator<Item = (NaiveDate, TrainingLoad, f64)>,
    {
        let mut series: Vec<PmcMetrics> = Vec::new();
        let mut ctl_history = Vec::new();

        for (date, load, daily_tss) in days {
            ctl_history.push(load.ctl());
            let ctl_ramp_rate = self.ramp_rate(&ctl_history);
            let atl_spike = self.detect_atl_spike(load.atl(), &series);
            series.push(PmcMetrics {
                date,
                load,
                daily_tss,
                ctl_ramp_rate,
                atl_spike,
            });
        }
        series
    }

    /// Recompute everything from `from` onwards after a correction
    ///
    /// `previous` is the stored series; its entry for the day before `from`
    /// seeds the replay, and entries before `from` are kept untouched.
    pub fn replay_from(
        &self,
        previous: &[PmcMetrics],
        from: NaiveDate,
        daily_tss: &BTreeMap<NaiveDate, DailyTss>,
        end: NaiveDate,
    ) -> Result<Vec<PmcMetrics>, PmcError> {
        let seed_date = from.checked_sub_days(Days::new(1));
        let seed = previous
            .iter()
            .find(|m| Some(m.date) == seed_date)
            .map(|m| m.load);

        let mut series: Vec<PmcMetrics> = previous
            .iter()
            .filter(|m| m.date < from)
            .cloned()
            .collect();
        if end < from {
            return Ok(series);
        }
        series.extend(self.replay(daily_tss, from, end, seed)?);

        // ramp rate and spikes need the kept prefix in scope
        let ramp_days = self.config.ramp_rate_days as usize;
        let ctl_history: Vec<f64> = series.iter().map(PmcMetrics::ctl).collect();
        let kept = series.iter().filter(|m| m.date < from).count();
        for i in kept..series.len() {
            series[i].ctl_ramp_rate = if i + 1 >= ramp_days {
                self.ramp_rate(&ctl_history[..=i])
            } else {
                None
            };
            let atl = series[i].atl();
            series[i].atl_spike = self.detect_atl_spike(atl, &series[..i]);
        }

        Ok(series)
    }

    /// CTL change per week over the configured period
    fn ramp_rate(&self, ctl_history: &[f64]) -> Option<f64> {
        let days = self.config.ramp_rate_days as usize;
        if days == 0 || ctl_history.len() < days {
            return None;
        }

        let recent = ctl_history[ctl_history.len() - 1];
        let past = ctl_history[ctl_history.len() - days];
        let weeks = days as f64 / 7.0;
        Some((recent - past) / weeks)
    }

    /// ATL above the trailing week's average by the spike threshold
    fn detect_atl_spike(&self, current_atl: f64, history: &[PmcMetrics]) -> bool {
        if history.len() < 7 {
            return false;
        }

        let recent_avg: f64 = history.iter().rev().take(7).map(PmcMetrics::atl).sum::<f64>() / 7.0;
        current_atl > recent_avg * self.config.atl_spike_threshold
    }

    pub fn analyze_trends(&self, series: &[PmcMetrics]) -> Result<PmcTrends, PmcError> {
        let required = (self.config.min_data_days as usize).max(1);
        if series.len() < required {
            return Err(PmcError::InsufficientData {
                required,
                available: series.len(),
            });
        }

        let (first, last) = match (series.first(), series.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                return Err(PmcError::InsufficientData {
                    required,
                    available: 0,
                })
            }
        };

        let ramp_rates: Vec<f64> = series.iter().filter_map(|m| m.ctl_ramp_rate).collect();
        let avg_ctl_ramp_rate = if ramp_rates.is_empty() {
            0.0
        } else {
            ramp_rates.iter().sum::<f64>() / ramp_rates.len() as f64
        };

        Ok(PmcTrends {
            ctl_trend: Self::determine_trend(first.ctl(), last.ctl()),
            atl_trend: Self::determine_trend(first.atl(), last.atl()),
            tsb_trend: Self::determine_trend(first.tsb(), last.tsb()),
            avg_ctl_ramp_rate,
            atl_spike_count: series.iter().filter(|m| m.atl_spike).count() as u16,
            days_since_last_spike: series
                .iter()
                .rev()
                .position(|m| m.atl_spike)
                .map(|pos| pos as u16),
        })
    }

    /// 5% relative change threshold
    fn determine_trend(start: f64, end: f64) -> TrendDirection {
        let percent_change = (end - start) / start.abs().max(1.0);

        if percent_change > 0.05 {
            TrendDirection::Increasing
        } else if percent_change < -0.05 {
            TrendDirection::Decreasing
        } else {
            TrendDirection::Stable
        }
    }

    pub fn generate_recommendations(&self, metrics: &PmcMetrics) -> Vec<String> {
        let mut recommendations = Vec::new();

        let tsb_interpretation = TsbInterpretation::from_tsb(metrics.tsb());
        recommendations.push(tsb_interpretation.recommendation().to_string());

        if let Some(ramp_rate) = metrics.ctl_ramp_rate {
            if ramp_rate > 8.0 {
                recommendations
                    .push("CTL ramp rate is aggressive - monitor for overreaching".to_string());
            } else if ramp_rate < -5.0 {
                recommendations.push(
                    "CTL is declining rapidly - consider increasing training load".to_string(),
                );
            }
        }

        if metrics.atl_spike {
            recommendations.push("ATL spike detected - plan recovery in coming days".to_string());
        }

        match tsb_interpretation {
            TsbInterpretation::VeryFresh => {
                recommendations.push("Consider a training block or planned event".to_string());
            }
            TsbInterpretation::VeryFatigued => {
                recommendations
                    .push("Prioritize sleep, nutrition, and active recovery".to_string());
            }
            _ => {}
        }

        recommendations
    }
}

/// Single-writer load chain for one athlete
///
/// Accepts days strictly in increasing order and decays across skipped days.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LoadChain {
    last: Option<(NaiveDate, TrainingLoad)>,
}

impl LoadChain {
    pub fn new() -> Self {
        LoadChain::default()
    }

    /// Resume from a stored state
    pub fn resume(date: NaiveDate, load: TrainingLoad) -> Self {
        LoadChain {
            last: Some((date, load)),
        }
    }

    pub fn current(&self) -> Option<(NaiveDate, TrainingLoad)> {
        self.last
    }

    pub fn advance(&mut self, date: NaiveDate, daily_tss: f64) -> Result<TrainingLoad, PmcError> {
        let load = match self.last {
            None => TrainingLoadTracker::update(daily_tss, None),
            Some((last, _)) if date <= last => {
                return Err(PmcError::OutOfOrder { date, last });
            }
            Some((last, load)) => {
                let gap = (date - last).num_days() - 1;
                let decayed = (0..gap).fold(load, |l, _| TrainingLoadTracker::update(0.0, Some(l)));
                TrainingLoadTracker::update(daily_tss, Some(decayed))
            }
        };
        self.last = Some((date, load));
        Ok(load)
    }
}
