//! Macro training phase from weekly volume and intensity distribution

use crate::error::CalculationError;
use crate::models::{DailyScore, PhaseResult, TrainingLoad, TrainingPhase, WorkoutRecord};
use crate::pmc::{PmcMetrics, TrainingLoadTracker};
use crate::zones::{HeartRateZones, IntensityClass, IntensityZones};
use chrono::{Days, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

const CALCULATION: &str = "phase detection";

/// A dated training load state
pub trait LoadPoint {
    fn date(&self) -> NaiveDate;
    fn load(&self) -> TrainingLoad;
}

impl LoadPoint for DailyScore {
    fn date(&self) -> NaiveDate {
        self.date
    }

    fn load(&self) -> TrainingLoad {
        self.load
    }
}

impl LoadPoint for PmcMetrics {
    fn date(&self) -> NaiveDate {
        self.date
    }

    fn load(&self) -> TrainingLoad {
        self.load
    }
}

impl LoadPoint for (NaiveDate, TrainingLoad) {
    fn date(&self) -> NaiveDate {
        self.0
    }

    fn load(&self) -> TrainingLoad {
        self.1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseConfig {
    pub zones: IntensityZones,
    pub resting_hr: f64,
    pub max_hr: f64,

    /// Days of history required (default: 28)
    pub min_history_days: u32,
    /// Weeks with workouts among the last four (default: 3)
    pub min_active_weeks: usize,

    /// Average weekly TSS below which the athlete is in transition
    pub transition_weekly_tss: f64,
    pub transition_volume_ratio: f64,
    pub transition_tsb: f64,
    pub recovery_volume_ratio: f64,
    pub peak_volume_ratio: (f64, f64),
    pub peak_high_intensity_pct: f64,
    /// CTL gain per week above which load is building
    pub build_ramp_rate: f64,
    pub build_high_intensity_pct: f64,
    pub base_low_intensity_pct: f64,
}

impl Default for PhaseConfig {
    fn default() -> Self {
        PhaseConfig {
            zones: IntensityZones::default(),
            resting_hr: 60.0,
            max_hr: 190.0,
            min_history_days: 28,
            min_active_weeks: 3,
            transition_weekly_tss: 100.0,
            transition_volume_ratio: 0.30,
            transition_tsb: 10.0,
            recovery_volume_ratio: 0.60,
            peak_volume_ratio: (0.60, 0.85),
            peak_high_intensity_pct: 20.0,
            build_ramp_rate: 2.0,
            build_high_intensity_pct: 15.0,
            base_low_intensity_pct: 75.0,
        }
    }
}

/// Inputs the phase rules look at, exposed for reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSignals {
    /// TSS per week, most recent first
    pub weekly_tss: [f64; 4],
    pub prior_average_tss: f64,
    pub volume_ratio: f64,
    pub low_intensity_percent: f64,
    pub moderate_intensity_percent: f64,
    pub high_intensity_percent: f64,
    pub tsb: f64,
    pub ramp_rate: f64,
    pub history_days: u32,
    pub active_weeks: usize,
    pub intensity_variety: usize,
}

#[derive(Debug, Clone, Default)]
pub struct TrainingPhaseDetector {
    config: PhaseConfig,
}

impl TrainingPhaseDetector {
    pub fn new() -> Self {
        TrainingPhaseDetector::default()
    }

    pub fn with_config(config: PhaseConfig) -> Self {
        TrainingPhaseDetector { config }
    }

    pub fn detect<L: LoadPoint>(
        &self,
        recent_workouts: &[WorkoutRecord],
        load_history: &[L],
    ) -> Result<PhaseResult, CalculationError> {
        let signals = self.signals(recent_workouts, load_history)?;
        let phase = self.classify(&signals);
        let confidence = Self::confidence(&signals);

        debug!(
            phase = %phase,
            confidence,
            weekly_tss = signals.weekly_tss[0],
            ratio = signals.volume_ratio,
            "Training phase detected"
        );

        Ok(PhaseResult {
            phase,
            confidence,
            weekly_tss: signals.weekly_tss[0],
            low_intensity_percent: signals.low_intensity_percent,
            high_intensity_percent: signals.high_intensity_percent,
            recommendation: Self::recommendation(phase).to_string(),
        })
    }

    pub fn signals<L: LoadPoint>(
        &self,
        workouts: &[WorkoutRecord],
        load_history: &[L],
    ) -> Result<PhaseSignals, CalculationError> {
        let cfg = &self.config;
        let dates = workouts
            .iter()
            .map(|w| w.date)
            .chain(load_history.iter().map(LoadPoint::date));
        let (earliest, as_of) = match dates.fold(None, |acc: Option<(NaiveDate, NaiveDate)>, d| {
            Some(acc.map_or((d, d), |(lo, hi)| (lo.min(d), hi.max(d))))
        }) {
            Some(range) => range,
            None => {
                return Err(CalculationError::insufficient(
                    CALCULATION,
                    cfg.min_history_days as usize,
                    0,
                ))
            }
        };

        let history_days = (as_of - earliest).num_days() as u32 + 1;
        if history_days < cfg.min_history_days {
            return Err(CalculationError::insufficient(
                CALCULATION,
                cfg.min_history_days as usize,
                history_days as usize,
            ));
        }

        // week 0 is the 7 days ending at as_of
        let week_of = |date: NaiveDate| -> Option<usize> {
            let back = (as_of - date).num_days();
            (0..28).contains(&back).then_some((back / 7) as usize)
        };

        let mut weekly_tss = [0.0; 4];
        let mut active = [false; 4];
        let mut class_seconds: BTreeMap<IntensityClass, f64> = BTreeMap::new();
        let hr_zones = cfg.zones.for_athlete(cfg.resting_hr, cfg.max_hr).ok();

        for workout in workouts {
            let Some(week) = week_of(workout.date) else {
                continue;
            };
            weekly_tss[week] += workout.training_stress_score.to_f64().unwrap_or(0.0).max(0.0);
            active[week] = true;
            for (class, secs) in Self::classify_workout(workout, hr_zones.as_ref()) {
                *class_seconds.entry(class).or_insert(0.0) += secs;
            }
        }

        let active_weeks = active.iter().filter(|a| **a).count();
        if active_weeks < cfg.min_active_weeks {
            return Err(CalculationError::InsufficientData {
                calculation: format!("{} (active weeks)", CALCULATION),
                required: cfg.min_active_weeks,
                available: active_weeks,
            });
        }

        let total_secs: f64 = class_seconds.values().sum();
        let pct = |class| {
            if total_secs > 0.0 {
                class_seconds.get(&class).copied().unwrap_or(0.0) / total_secs * 100.0
            } else {
                0.0
            }
        };
        let intensity_variety = class_seconds.values().filter(|s| **s > 0.0).count();

        let prior_average_tss = weekly_tss[1..].iter().sum::<f64>() / 3.0;
        let volume_ratio = if prior_average_tss > 0.0 {
            weekly_tss[0] / prior_average_tss
        } else {
            1.0
        };

        let (tsb, ramp_rate) = self.form_and_ramp(workouts, load_history, as_of);

        Ok(PhaseSignals {
            weekly_tss,
            prior_average_tss,
            volume_ratio,
            low_intensity_percent: pct(IntensityClass::Low),
            moderate_intensity_percent: pct(IntensityClass::Moderate),
            high_intensity_percent: pct(IntensityClass::High),
            tsb,
            ramp_rate,
            history_days,
            active_weeks,
            intensity_variety,
        })
    }

    /// Seconds per intensity class, from the best signal the workout carries
    pub fn classify_workout(
        workout: &WorkoutRecord,
        hr_zones: Option<&HeartRateZones>,
    ) -> Vec<(IntensityClass, f64)> {
        let duration = workout.duration_sec as f64;

        if let (Some(zones), Some(samples)) = (hr_zones, workout.hr_samples.as_ref()) {
            let by_class = zones.time_in_zones(samples).by_class();
            if by_class.iter().any(|(_, secs)| *secs > 0) {
                return by_class
                    .iter()
                    .map(|(class, secs)| (*class, *secs as f64))
                    .collect();
            }
        }

        let class = match (hr_zones, workout.avg_hr, workout.rpe) {
            (Some(zones), Some(hr), _) => zones.class_for_hr(hr),
            (_, _, Some(rpe)) => IntensityClass::from_rpe(rpe),
            _ => {
                let hours = workout.duration_hours();
                let tss = workout.training_stress_score.to_f64().unwrap_or(0.0).max(0.0);
                let intensity_factor = if hours > 0.0 {
                    (tss / (hours * 100.0)).sqrt()
                } else {
                    0.0
                };
                if intensity_factor < 0.75 {
                    IntensityClass::Low
                } else if intensity_factor < 0.90 {
                    IntensityClass::Moderate
                } else {
                    IntensityClass::High
                }
            }
        };
        vec![(class, duration)]
    }

    /// Latest TSB and CTL change over the last week
    ///
    /// Without a load history the chain is replayed from the workouts.
    fn form_and_ramp<L: LoadPoint>(
        &self,
        workouts: &[WorkoutRecord],
        load_history: &[L],
        as_of: NaiveDate,
    ) -> (f64, f64) {
        let week_ago = as_of.checked_sub_days(Days::new(7)).unwrap_or(as_of);

        if !load_history.is_empty() {
            let mut points: Vec<(NaiveDate, TrainingLoad)> =
                load_history.iter().map(|p| (p.date(), p.load())).collect();
            points.sort_by_key(|(d, _)| *d);
            let latest = points.last().map(|(_, l)| *l).unwrap_or_default();
            let earlier = points
                .iter()
                .rev()
                .find(|(d, _)| *d <= week_ago)
                .map(|(_, l)| *l);
            let ramp = earlier.map_or(0.0, |e| latest.ctl() - e.ctl());
            return (latest.tsb(), ramp);
        }

        let tracker = TrainingLoadTracker::new();
        let daily = tracker.aggregate_daily_tss(workouts);
        let Some(start) = daily.keys().next().copied() else {
            return (0.0, 0.0);
        };
        match tracker.replay(&daily, start, as_of, Some(TrainingLoad::zero())) {
            Ok(series) => {
                let latest = series.last().map(|m| m.load).unwrap_or_default();
                let earlier = series.iter().rev().find(|m| m.date <= week_ago).map(|m| m.load);
                let ramp = earlier.map_or(0.0, |e| latest.ctl() - e.ctl());
                (latest.tsb(), ramp)
            }
            Err(_) => (0.0, 0.0),
        }
    }

    /// Ordered rules, first match wins
    pub fn classify(&self, s: &PhaseSignals) -> TrainingPhase {
        let cfg = &self.config;
        let average_weekly = s.weekly_tss.iter().sum::<f64>() / 4.0;
        let (peak_lo, peak_hi) = cfg.peak_volume_ratio;

        if average_weekly < cfg.transition_weekly_tss
            || (s.volume_ratio < cfg.transition_volume_ratio && s.tsb > cfg.transition_tsb)
        {
            TrainingPhase::Transition
        } else if s.volume_ratio < cfg.recovery_volume_ratio {
            TrainingPhase::Recovery
        } else if s.volume_ratio <= peak_hi
            && s.volume_ratio >= peak_lo
            && s.high_intensity_percent >= cfg.peak_high_intensity_pct
            && s.tsb > 0.0
        {
            TrainingPhase::Peak
        } else if s.ramp_rate > cfg.build_ramp_rate
            && s.high_intensity_percent >= cfg.build_high_intensity_pct
        {
            TrainingPhase::Build
        } else if s.low_intensity_percent >= cfg.base_low_intensity_pct {
            TrainingPhase::Base
        } else if s.ramp_rate > 0.0 {
            TrainingPhase::Build
        } else {
            TrainingPhase::Base
        }
    }

    /// History length, intensity variety and consistency, in [0, 1]
    pub fn confidence(s: &PhaseSignals) -> f64 {
        let weeks = s.history_days as f64 / 7.0;
        let history = (weeks / 8.0).min(1.0);
        let variety = (s.intensity_variety as f64 / 3.0).min(1.0);
        let consistency = (s.active_weeks as f64 / 4.0).min(1.0);
        (0.5 * history + 0.3 * variety + 0.2 * consistency).clamp(0.0, 1.0)
    }

    pub fn recommendation(phase: TrainingPhase) -> &'static str {
        match phase {
            TrainingPhase::Base => "Build aerobic volume with mostly easy sessions",
            TrainingPhase::Build => "Progress load gradually and protect recovery days",
            TrainingPhase::Peak => "Keep intensity sharp while volume tapers",
            TrainingPhase::Recovery => "Absorb recent training before adding load again",
            TrainingPhase::Transition => "Stay active with unstructured easy training",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkoutKind;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn workout(day: u64, minutes: u32, avg_hr: f64, tss: Decimal) -> WorkoutRecord {
        WorkoutRecord {
            id: format!("w{}", day),
            date: start().checked_add_days(Days::new(day)).unwrap(),
            start: None,
            duration_sec: minutes * 60,
            kind: WorkoutKind::Cardio,
            avg_hr: Some(avg_hr),
            max_hr: None,
            hr_samples: None,
            has_power: false,
            rpe: None,
            training_stress_score: tss,
        }
    }

    fn no_history() -> Vec<PmcMetrics> {
        Vec::new()
    }

    #[test]
    fn test_easy_volume_is_base() {
        let workouts: Vec<WorkoutRecord> = (0..35).map(|d| workout(d, 45, 120.0, dec!(50))).collect();
        let result = TrainingPhaseDetector::new().detect(&workouts, &no_history()).unwrap();
        assert_eq!(result.phase, TrainingPhase::Base);
        assert_eq!(result.low_intensity_percent, 100.0);
        assert!((result.weekly_tss - 350.0).abs() < 1e-9);
    }

    #[test]
    fn test_intense_ramp_is_build() {
        let workouts: Vec<WorkoutRecord> = (0..35)
            .map(|d| {
                if d % 2 == 0 {
                    workout(d, 60, 178.0, dec!(90))
                } else {
                    workout(d, 60, 120.0, dec!(50))
                }
            })
            .collect();
        let result = TrainingPhaseDetector::new().detect(&workouts, &no_history()).unwrap();
        assert_eq!(result.phase, TrainingPhase::Build);
        assert!(result.high_intensity_percent >= 15.0);
    }

    #[test]
    fn test_volume_drop_is_recovery() {
        let workouts: Vec<WorkoutRecord> = (0..35)
            .map(|d| {
                let tss = if d >= 28 { dec!(20) } else { dec!(50) };
                workout(d, 45, 120.0, tss)
            })
            .collect();
        let result = TrainingPhaseDetector::new().detect(&workouts, &no_history()).unwrap();
        assert_eq!(result.phase, TrainingPhase::Recovery);
    }

    #[test]
    fn test_taper_with_fresh_form_is_peak() {
        let workouts: Vec<WorkoutRecord> = (0..35)
            .map(|d| {
                let tss = if d >= 28 { dec!(45) } else { dec!(60) };
                let hr = if d % 3 == 0 { 180.0 } else { 120.0 };
                workout(d, 60, hr, tss)
            })
            .collect();
        let end = start().checked_add_days(Days::new(34)).unwrap();
        let history = vec![
            (end.checked_sub_days(Days::new(7)).unwrap(), TrainingLoad::new(71.0, 70.0)),
            (end, TrainingLoad::new(70.0, 60.0)),
        ];

        let result = TrainingPhaseDetector::new().detect(&workouts, &history).unwrap();
        assert_eq!(result.phase, TrainingPhase::Peak);
    }

    #[test]
    fn test_low_volume_is_transition() {
        let workouts: Vec<WorkoutRecord> = (0..35)
            .filter(|d| d % 3 == 0)
            .map(|d| workout(d, 30, 115.0, dec!(20)))
            .collect();
        let result = TrainingPhaseDetector::new().detect(&workouts, &no_history()).unwrap();
        assert_eq!(result.phase, TrainingPhase::Transition);
    }

    #[test]
    fn test_short_history_unavailable() {
        let workouts: Vec<WorkoutRecord> = (0..20).map(|d| workout(d, 45, 120.0, dec!(50))).collect();
        let err = TrainingPhaseDetector::new()
            .detect(&workouts, &no_history())
            .unwrap_err();
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_inconsistent_weeks_unavailable() {
        // 35 days of span, but only two of the last four weeks trained
        let workouts: Vec<WorkoutRecord> = (0..35)
            .filter(|d| (7..14).contains(d) || d >= &28)
            .map(|d| workout(d, 45, 120.0, dec!(50)))
            .collect();
        let err = TrainingPhaseDetector::new()
            .detect(&workouts, &no_history())
            .unwrap_err();
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_variety_raises_confidence() {
        let easy: Vec<WorkoutRecord> = (0..35).map(|d| workout(d, 45, 120.0, dec!(50))).collect();
        let mixed: Vec<WorkoutRecord> = (0..35)
            .map(|d| match d % 3 {
                0 => workout(d, 45, 120.0, dec!(50)),
                1 => workout(d, 45, 162.0, dec!(60)),
                _ => workout(d, 45, 182.0, dec!(70)),
            })
            .collect();

        let detector = TrainingPhaseDetector::new();
        let low = detector.detect(&easy, &no_history()).unwrap().confidence;
        let high = detector.detect(&mixed, &no_history()).unwrap().confidence;
        assert!(high > low);
        assert!((0.0..=1.0).contains(&low));
        assert!((0.0..=1.0).contains(&high));
    }

    #[test]
    fn test_intensity_fallbacks() {
        let mut w = workout(0, 60, 0.0, dec!(100));
        w.avg_hr = None;
        // IF = sqrt(100 / 100) = 1.0
        let classes = TrainingPhaseDetector::classify_workout(&w, None);
        assert_eq!(classes, vec![(IntensityClass::High, 3600.0)]);

        w.rpe = Some(3.0);
        let classes = TrainingPhaseDetector::classify_workout(&w, None);
        assert_eq!(classes[0].0, IntensityClass::Low);
    }
}
