use crate::error::{Result, VitalsError};
use crate::models::{DailySample, WorkoutRecord};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Plausibility ranges applied before samples reach scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// HRV must be above 0 and at most this (ms)
    pub max_hrv_ms: f64,
    pub min_rhr_bpm: f64,
    pub max_rhr_bpm: f64,
    pub min_respiratory_rate: f64,
    pub max_respiratory_rate: f64,
    pub max_sleep_hours: f64,
    /// Allowed distance of the stage percentage sum from 100
    pub stage_sum_tolerance: f64,
    pub max_steps: u32,
    pub max_active_energy_kcal: f64,
    pub max_workout_hours: f64,
    pub min_sample_bpm: f64,
    pub max_sample_bpm: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        ValidationConfig {
            max_hrv_ms: 300.0,
            min_rhr_bpm: 25.0,
            max_rhr_bpm: 220.0,
            min_respiratory_rate: 4.0,
            max_respiratory_rate: 60.0,
            max_sleep_hours: 24.0,
            stage_sum_tolerance: 5.0,
            max_steps: 150_000,
            max_active_energy_kcal: 10_000.0,
            max_workout_hours: 24.0,
            min_sample_bpm: 30.0,
            max_sample_bpm: 230.0,
        }
    }
}

/// A field dropped or corrected at ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub date: chrono::NaiveDate,
    pub field: String,
    pub value: String,
    pub reason: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}={}: {}", self.date, self.field, self.value, self.reason)
    }
}

/// Validate and clean daily samples
pub struct SampleValidator {
    config: ValidationConfig,
}

impl Default for SampleValidator {
    fn default() -> Self {
        SampleValidator::new(ValidationConfig::default())
    }
}

impl SampleValidator {
    pub fn new(config: ValidationConfig) -> Self {
        SampleValidator { config }
    }

    /// Drop implausible fields in place and report each one
    pub fn clean(&self, sample: &mut DailySample) -> Vec<ValidationIssue> {
        let cfg = &self.config;
        let date = sample.date;
        let mut issues = Vec::new();
        let mut flag = |field: &str, value: String, reason: String| {
            issues.push(ValidationIssue {
                date,
                field: field.to_string(),
                value,
                reason,
            });
        };

        // Clean HRV (0, max]
        if let Some(hrv) = sample.hrv_ms {
            if !(hrv.is_finite() && hrv > 0.0 && hrv <= cfg.max_hrv_ms) {
                sample.hrv_ms = None;
                flag("hrv_ms", hrv.to_string(), format!("outside (0, {}]", cfg.max_hrv_ms));
            }
        }

        if let Some(rhr) = sample.rhr_bpm {
            if !(cfg.min_rhr_bpm..=cfg.max_rhr_bpm).contains(&rhr) {
                sample.rhr_bpm = None;
                flag(
                    "rhr_bpm",
                    rhr.to_string(),
                    format!("outside [{}, {}]", cfg.min_rhr_bpm, cfg.max_rhr_bpm),
                );
            }
        }

        if let Some(rate) = sample.respiratory_rate {
            if !(cfg.min_respiratory_rate..=cfg.max_respiratory_rate).contains(&rate) {
                sample.respiratory_rate = None;
                flag(
                    "respiratory_rate",
                    rate.to_string(),
                    format!(
                        "outside [{}, {}]",
                        cfg.min_respiratory_rate, cfg.max_respiratory_rate
                    ),
                );
            }
        }

        let max_sleep_sec = (cfg.max_sleep_hours * 3600.0) as u32;
        if let Some(asleep) = sample.sleep_duration_sec {
            if asleep > max_sleep_sec {
                sample.sleep_duration_sec = None;
                flag(
                    "sleep_duration_sec",
                    asleep.to_string(),
                    format!("longer than {} hours", cfg.max_sleep_hours),
                );
            }
        }
        if let Some(in_bed) = sample.time_in_bed_sec {
            if in_bed > max_sleep_sec || in_bed == 0 {
                sample.time_in_bed_sec = None;
                flag(
                    "time_in_bed_sec",
                    in_bed.to_string(),
                    format!("zero or longer than {} hours", cfg.max_sleep_hours),
                );
            }
        }
        // Time in bed is the less reliable of the two
        if let (Some(asleep), Some(in_bed)) = (sample.sleep_duration_sec, sample.time_in_bed_sec) {
            if asleep > in_bed {
                sample.time_in_bed_sec = None;
                flag(
                    "time_in_bed_sec",
                    in_bed.to_string(),
                    format!("shorter than time asleep ({})", asleep),
                );
            }
        }

        if let Some(stages) = sample.sleep_stages {
            let parts = [stages.deep, stages.rem, stages.core, stages.awake];
            let in_range = parts.iter().all(|p| p.is_finite() && (0.0..=100.0).contains(p));
            let total = stages.total();
            if !in_range || (total - 100.0).abs() > cfg.stage_sum_tolerance {
                sample.sleep_stages = None;
                flag(
                    "sleep_stages",
                    format!("{:.1}", total),
                    format!("percentages must each be in [0, 100] and sum to 100 ± {}", cfg.stage_sum_tolerance),
                );
            }
        }

        if let Some(steps) = sample.steps {
            if steps > cfg.max_steps {
                sample.steps = None;
                flag("steps", steps.to_string(), format!("more than {}", cfg.max_steps));
            }
        }

        if let Some(kcal) = sample.active_energy_kcal {
            if !(kcal.is_finite() && (0.0..=cfg.max_active_energy_kcal).contains(&kcal)) {
                sample.active_energy_kcal = None;
                flag(
                    "active_energy_kcal",
                    kcal.to_string(),
                    format!("outside [0, {}]", cfg.max_active_energy_kcal),
                );
            }
        }

        for issue in &issues {
            warn!(date = %issue.date, field = %issue.field, value = %issue.value, "Dropped implausible value");
        }
        issues
    }

    /// Clean a batch, returning every issue found
    pub fn clean_all(&self, samples: &mut [DailySample]) -> Vec<ValidationIssue> {
        samples.iter_mut().flat_map(|s| self.clean(s)).collect()
    }
}

/// Validate and clean workout records
pub struct WorkoutValidator {
    config: ValidationConfig,
}

impl Default for WorkoutValidator {
    fn default() -> Self {
        WorkoutValidator::new(ValidationConfig::default())
    }
}

impl WorkoutValidator {
    pub fn new(config: ValidationConfig) -> Self {
        WorkoutValidator { config }
    }

    /// Reject unusable workouts, clean recoverable fields in place
    pub fn validate(&self, workout: &mut WorkoutRecord) -> Result<Vec<ValidationIssue>> {
        let cfg = &self.config;
        let max_duration = (cfg.max_workout_hours * 3600.0) as u32;

        if workout.duration_sec == 0 || workout.duration_sec > max_duration {
            return Err(VitalsError::Validation(format!(
                "workout {} on {}: duration {}s outside (0, {}h]",
                workout.id, workout.date, workout.duration_sec, cfg.max_workout_hours
            )));
        }
        if workout.training_stress_score < Decimal::ZERO {
            return Err(VitalsError::Validation(format!(
                "workout {} on {}: negative TSS {}",
                workout.id, workout.date, workout.training_stress_score
            )));
        }

        let mut issues = Vec::new();
        let date = workout.date;

        if let Some(rpe) = workout.rpe {
            let clamped = if rpe.is_finite() { rpe.clamp(1.0, 10.0) } else { 1.0 };
            if clamped != rpe {
                workout.rpe = Some(clamped);
                issues.push(ValidationIssue {
                    date,
                    field: "rpe".to_string(),
                    value: rpe.to_string(),
                    reason: format!("clamped to {}", clamped),
                });
            }
        }

        let bpm_range = cfg.min_sample_bpm..=cfg.max_sample_bpm;
        for (field, value) in [("avg_hr", &mut workout.avg_hr), ("max_hr", &mut workout.max_hr)] {
            if let Some(hr) = *value {
                if !bpm_range.contains(&hr) {
                    *value = None;
                    issues.push(ValidationIssue {
                        date,
                        field: field.to_string(),
                        value: hr.to_string(),
                        reason: "implausible heart rate".to_string(),
                    });
                }
            }
        }

        if let Some(samples) = workout.hr_samples.as_mut() {
            let before = samples.len();
            samples.retain(|s| bpm_range.contains(&s.bpm) && s.duration_sec > 0);
            let removed = before - samples.len();
            if removed > 0 {
                issues.push(ValidationIssue {
                    date,
                    field: "hr_samples".to_string(),
                    value: removed.to_string(),
                    reason: "segments outside heart rate range removed".to_string(),
                });
            }
            if samples.is_empty() {
                workout.hr_samples = None;
            }
        }

        Ok(issues)
    }

    /// Keep valid workouts; rejected ones are logged and skipped
    pub fn validate_all(
        &self,
        workouts: Vec<WorkoutRecord>,
    ) -> (Vec<WorkoutRecord>, Vec<ValidationIssue>, usize) {
        let mut kept = Vec::with_capacity(workouts.len());
        let mut issues = Vec::new();
        let mut rejected = 0;

        for mut workout in workouts {
            match self.validate(&mut workout) {
                Ok(found) => {
                    issues.extend(found);
                    kept.push(workout);
                }
                Err(e) => {
                    warn!("Rejected workout: {}", e);
                    rejected += 1;
                }
            }
        }

        (kept, issues, rejected)
    }
}
