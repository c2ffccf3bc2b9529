//! Nightly sleep score
//!
//! Five weighted components, rebalanced over whatever the night's data
//! supports:
//!
//! - Performance (30%): time asleep against the personal sleep need
//! - Stage quality (32%): combined deep + REM share
//! - Efficiency (22%): time asleep / time in bed
//! - Disturbances (14%): wake interruptions, bracketed
//! - Timing (2%): onset consistency against the habitual bedtime

use crate::models::DailySample;
use crate::scoring::{compose, piecewise_linear, Component, Composite};
use chrono::{Days, Duration, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

pub const PERFORMANCE_COMPONENT: &str = "performance";
pub const STAGE_COMPONENT: &str = "stage_quality";
pub const EFFICIENCY_COMPONENT: &str = "efficiency";
pub const DISTURBANCE_COMPONENT: &str = "disturbances";
pub const TIMING_COMPONENT: &str = "timing";

const MINUTES_PER_DAY: f64 = 1440.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SleepWeights {
    pub performance: f64,
    pub stage_quality: f64,
    pub efficiency: f64,
    pub disturbances: f64,
    pub timing: f64,
}

impl Default for SleepWeights {
    fn default() -> Self {
        SleepWeights {
            performance: 0.30,
            stage_quality: 0.32,
            efficiency: 0.22,
            disturbances: 0.14,
            timing: 0.02,
        }
    }
}

impl SleepWeights {
    pub fn all_positive(&self) -> bool {
        [
            self.performance,
            self.stage_quality,
            self.efficiency,
            self.disturbances,
            self.timing,
        ]
        .iter()
        .all(|w| *w > 0.0)
    }
}

/// Sleep scoring configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SleepConfig {
    pub weights: SleepWeights,

    /// Sleep need used when no personal target is given, hours
    pub default_target_hours: f64,

    /// Nights required before a habitual onset is trusted
    pub min_nights_for_timing: usize,
}

impl Default for SleepConfig {
    fn default() -> Self {
        SleepConfig {
            weights: SleepWeights::default(),
            default_target_hours: 8.0,
            min_nights_for_timing: 3,
        }
    }
}

/// Personal context for a night's score
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SleepContext {
    /// Personal sleep need
    pub target: Option<Duration>,
    /// Usual sleep onset over recent nights
    pub habitual_onset: Option<NaiveTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepAssessment {
    pub score: u8,
    /// Hours short of the target (negative on surplus)
    pub sleep_debt_hours: Option<f64>,
    pub composite: Composite,
}

/// Sleep scorer
#[derive(Debug, Clone, Default)]
pub struct SleepScorer {
    config: SleepConfig,
}

impl SleepScorer {
    pub fn new() -> Self {
        SleepScorer::default()
    }

    pub fn with_config(config: SleepConfig) -> Self {
        SleepScorer { config }
    }

    pub fn config(&self) -> &SleepConfig {
        &self.config
    }

    /// Composite 0-100 sleep score
    pub fn score(&self, night: &DailySample, personal_target: Option<Duration>) -> u8 {
        self.assess(
            night,
            SleepContext {
                target: personal_target,
                habitual_onset: None,
            },
        )
        .score
    }

    /// True when the sample carries anything sleep-related to score
    pub fn has_sleep_data(night: &DailySample) -> bool {
        night.sleep_duration_sec.is_some() || night.sleep_stages.is_some()
    }

    pub fn assess(&self, night: &DailySample, context: SleepContext) -> SleepAssessment {
        let weights = &self.config.weights;
        let target_hours = self.target_hours(context.target);

        let actual_hours = night.sleep_hours();
        let performance = actual_hours.map(|h| Self::performance_subscore(h, target_hours));
        let stage = night
            .sleep_stages
            .map(|stages| Self::stage_quality_subscore(stages.restorative()));
        let efficiency = Self::efficiency_pct(night).map(Self::efficiency_subscore);
        let disturbances = night.sleep_disturbances.map(Self::disturbance_subscore);
        let timing = match (night.sleep_onset, context.habitual_onset) {
            (Some(onset), Some(habitual)) => {
                Some(Self::timing_subscore(circular_minutes_apart(onset, habitual)))
            }
            _ => None,
        };

        let components = vec![
            Component::new(PERFORMANCE_COMPONENT, weights.performance, performance),
            Component::new(STAGE_COMPONENT, weights.stage_quality, stage),
            Component::new(EFFICIENCY_COMPONENT, weights.efficiency, efficiency),
            Component::new(DISTURBANCE_COMPONENT, weights.disturbances, disturbances),
            Component::new(TIMING_COMPONENT, weights.timing, timing),
        ];
        let composite = compose(&components);

        debug!(
            date = %night.date,
            score = composite.score,
            dropped = ?composite.dropped,
            "Sleep scored"
        );

        SleepAssessment {
            score: composite.score,
            sleep_debt_hours: actual_hours.map(|h| target_hours - h),
            composite,
        }
    }

    pub fn target_hours(&self, target: Option<Duration>) -> f64 {
        target
            .map(|t| t.num_seconds() as f64 / 3600.0)
            .filter(|h| *h > 0.0)
            .unwrap_or(self.config.default_target_hours)
    }

    /// Usual sleep onset over the nights before `as_of`
    ///
    /// The circular median: the onset with the least total clock distance to
    /// the others, so one late night does not drag the habit. Ties (an even
    /// count) resolve to their midpoint on the clock.
    pub fn habitual_onset<'a, I>(
        &self,
        samples: I,
        as_of: NaiveDate,
        window_days: u16,
    ) -> Option<NaiveTime>
    where
        I: IntoIterator<Item = &'a DailySample>,
    {
        let start = as_of.checked_sub_days(Days::new(window_days as u64))?;
        let onsets: Vec<f64> = samples
            .into_iter()
            .filter(|s| s.date >= start && s.date < as_of)
            .filter_map(|s| s.sleep_onset)
            .map(minutes_of_day)
            .collect();

        if onsets.len() < self.config.min_nights_for_timing {
            return None;
        }

        let cost = |candidate: f64| -> f64 {
            onsets
                .iter()
                .map(|m| {
                    let diff = (candidate - m).abs();
                    diff.min(MINUTES_PER_DAY - diff)
                })
                .sum()
        };
        let best = onsets.iter().map(|m| cost(*m)).fold(f64::INFINITY, f64::min);
        let medians: Vec<f64> = onsets
            .iter()
            .copied()
            .filter(|m| cost(*m) - best < 1e-9)
            .collect();

        let minutes = circular_mean(&medians)?.round() as u32 % 1440;
        NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0)
    }

    /// Time asleep against need; full marks at or above target
    pub fn performance_subscore(actual_hours: f64, target_hours: f64) -> f64 {
        if target_hours <= 0.0 {
            return 100.0;
        }
        (actual_hours / target_hours).min(1.0).max(0.0) * 100.0
    }

    /// Deep + REM share: <30% → 0-50, 30-40% → 50-100, ≥40% → 100
    pub fn stage_quality_subscore(restorative_pct: f64) -> f64 {
        piecewise_linear(restorative_pct, &[(0.0, 0.0), (30.0, 50.0), (40.0, 100.0)])
    }

    pub fn efficiency_pct(night: &DailySample) -> Option<f64> {
        match (night.sleep_duration_sec, night.time_in_bed_sec) {
            (Some(asleep), Some(in_bed)) if in_bed > 0 => {
                Some((asleep as f64 / in_bed as f64 * 100.0).min(100.0))
            }
            _ => None,
        }
    }

    pub fn efficiency_subscore(efficiency_pct: f64) -> f64 {
        piecewise_linear(efficiency_pct, &[(50.0, 0.0), (75.0, 50.0), (90.0, 100.0)])
    }

    /// Bracketed so one extra wake-up does not swing the score
    pub fn disturbance_subscore(count: u16) -> f64 {
        match count {
            0..=2 => 100.0,
            3..=5 => 75.0,
            6..=8 => 50.0,
            9..=11 => 25.0,
            _ => 0.0,
        }
    }

    pub fn timing_subscore(minutes_off: f64) -> f64 {
        piecewise_linear(minutes_off, &[(30.0, 100.0), (120.0, 0.0)])
    }
}

/// Mean of minutes-of-day on the clock circle
fn circular_mean(minutes: &[f64]) -> Option<f64> {
    let (sin_sum, cos_sum) = minutes.iter().fold((0.0, 0.0), |(s, c), m| {
        let angle = m / MINUTES_PER_DAY * 2.0 * PI;
        (s + angle.sin(), c + angle.cos())
    });
    if sin_sum.abs() < 1e-9 && cos_sum.abs() < 1e-9 {
        return None;
    }

    let mut angle = sin_sum.atan2(cos_sum);
    if angle < 0.0 {
        angle += 2.0 * PI;
    }
    Some(angle / (2.0 * PI) * MINUTES_PER_DAY)
}

fn minutes_of_day(time: NaiveTime) -> f64 {
    (time.hour() * 60 + time.minute()) as f64
}

/// Distance between two clock times in minutes, wrapping at midnight
pub fn circular_minutes_apart(a: NaiveTime, b: NaiveTime) -> f64 {
    let diff = (minutes_of_day(a) - minutes_of_day(b)).abs();
    diff.min(MINUTES_PER_DAY - diff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SleepStagePercentages;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 10).unwrap()
    }

    fn night(hours: f64, restorative: f64) -> DailySample {
        DailySample {
            sleep_duration_sec: Some((hours * 3600.0) as u32),
            time_in_bed_sec: Some((hours * 3600.0 / 0.93) as u32),
            sleep_stages: Some(SleepStagePercentages {
                deep: restorative / 2.0,
                rem: restorative / 2.0,
                core: 95.0 - restorative,
                awake: 5.0,
            }),
            sleep_disturbances: Some(1),
            ..DailySample::new(date())
        }
    }

    #[test]
    fn test_stage_quality_bands() {
        assert_eq!(SleepScorer::stage_quality_subscore(0.0), 0.0);
        assert!(SleepScorer::stage_quality_subscore(29.9) < 50.0);
        assert_eq!(SleepScorer::stage_quality_subscore(30.0), 50.0);
        assert_eq!(SleepScorer::stage_quality_subscore(35.0), 75.0);
        assert_eq!(SleepScorer::stage_quality_subscore(40.0), 100.0);
        assert_eq!(SleepScorer::stage_quality_subscore(55.0), 100.0);
    }

    #[test]
    fn test_disturbance_brackets_decrease() {
        let scores: Vec<f64> = (0..15).map(SleepScorer::disturbance_subscore).collect();
        assert!(scores.windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(SleepScorer::disturbance_subscore(2), 100.0);
        assert_eq!(SleepScorer::disturbance_subscore(4), 75.0);
    }

    #[test]
    fn test_good_night_scores_high() {
        let scorer = SleepScorer::new();
        let score = scorer.score(&night(8.0, 45.0), None);
        assert!(score >= 95, "score {} should be >= 95", score);
    }

    #[test]
    fn test_short_night_scores_lower() {
        let scorer = SleepScorer::new();
        let full = scorer.score(&night(8.0, 40.0), None);
        let short = scorer.score(&night(5.0, 40.0), None);
        assert!(short < full);
    }

    #[test]
    fn test_personal_target() {
        let scorer = SleepScorer::new();
        let night = night(7.0, 40.0);
        let default_target = scorer.score(&night, None);
        let personal = scorer.score(&night, Some(Duration::hours(7)));
        assert!(personal > default_target);

        let assessment = scorer.assess(&night, SleepContext::default());
        assert!((assessment.sleep_debt_hours.unwrap() - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_missing_stages_rebalanced() {
        let scorer = SleepScorer::new();
        let mut sample = night(8.0, 40.0);
        sample.sleep_stages = None;

        let assessment = scorer.assess(&sample, SleepContext::default());
        assert!(assessment
            .composite
            .dropped
            .contains(&STAGE_COMPONENT.to_string()));
        let total: f64 = assessment
            .composite
            .used
            .iter()
            .map(|w| w.effective_weight)
            .sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_sleep_data_is_neutral() {
        let scorer = SleepScorer::new();
        assert_eq!(scorer.score(&DailySample::new(date()), None), 50);
        assert!(!SleepScorer::has_sleep_data(&DailySample::new(date())));
    }

    #[test]
    fn test_circular_distance() {
        let late = NaiveTime::from_hms_opt(23, 30, 0).unwrap();
        let early = NaiveTime::from_hms_opt(0, 15, 0).unwrap();
        assert_eq!(circular_minutes_apart(late, early), 45.0);
    }

    #[test]
    fn test_habitual_onset_wraps_midnight() {
        let scorer = SleepScorer::new();
        let onsets = [(23, 40), (0, 20), (23, 50), (0, 10)];
        let samples: Vec<DailySample> = onsets
            .iter()
            .enumerate()
            .map(|(i, (h, m))| DailySample {
                sleep_onset: NaiveTime::from_hms_opt(*h, *m, 0),
                ..DailySample::new(date().checked_sub_days(Days::new(i as u64 + 1)).unwrap())
            })
            .collect();

        let habitual = scorer.habitual_onset(&samples, date(), 14).unwrap();
        let midnight = NaiveTime::from_hms_opt(0, 0, 0).unwrap();
        assert!(circular_minutes_apart(habitual, midnight) <= 1.0);
    }

    #[test]
    fn test_habitual_onset_ignores_one_late_night() {
        let scorer = SleepScorer::new();
        let onsets = [(22, 0), (22, 10), (2, 0), (22, 20), (22, 30)];
        let samples: Vec<DailySample> = onsets
            .iter()
            .enumerate()
            .map(|(i, (h, m))| DailySample {
                sleep_onset: NaiveTime::from_hms_opt(*h, *m, 0),
                ..DailySample::new(date().checked_sub_days(Days::new(i as u64 + 1)).unwrap())
            })
            .collect();

        let habitual = scorer.habitual_onset(&samples, date(), 14).unwrap();
        assert_eq!(habitual, NaiveTime::from_hms_opt(22, 20, 0).unwrap());
    }

    #[test]
    fn test_late_bedtime_costs_timing() {
        let scorer = SleepScorer::new();
        let mut sample = night(8.0, 40.0);
        sample.sleep_onset = NaiveTime::from_hms_opt(2, 30, 0);

        let context = SleepContext {
            target: None,
            habitual_onset: NaiveTime::from_hms_opt(22, 30, 0),
        };
        let assessment = scorer.assess(&sample, context);
        let timing = assessment
            .composite
            .used
            .iter()
            .find(|w| w.name == TIMING_COMPONENT)
            .unwrap();
        assert_eq!(timing.score, 0.0);
    }
}
