//! Daily physiological strain on a 0-21 scale
//!
//! Each workout is reduced to an EPOC equivalent: heart-rate workouts go
//! through Banister TRIMP on heart-rate reserve, the rest fall back to session
//! RPE or the workout's TSS. The day's EPOC (workouts plus non-exercise
//! activity) is log-compressed onto the strain scale and then nudged by the
//! day's recovery score.

use crate::baseline::Baseline;
use crate::models::{Confidence, DailySample, WorkoutKind, WorkoutRecord};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Strain model constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrainConfig {
    /// Banister intensity exponent (default: 1.92)
    pub trimp_exponent: f64,

    pub epoc_coefficient: f64,
    pub epoc_exponent: f64,

    /// EPOC mapped to the top of the cardio scale (default: 850)
    pub epoc_max: f64,

    /// Top of the cardio load scale (default: 18)
    pub cardio_scale: f64,

    /// Hard cap on daily strain (default: 21)
    pub max_strain: f64,

    /// TRIMP per RPE-minute for session-RPE estimates
    pub srpe_trimp_factor: f64,

    /// TRIMP per TSS point when only TSS is known
    pub tss_trimp_factor: f64,

    /// Steps that count as one NEAT block
    pub neat_steps_reference: f64,
    /// Active kcal that count as one NEAT block
    pub neat_energy_reference: f64,
    /// EPOC equivalent of one NEAT block
    pub neat_epoc_per_reference: f64,

    /// Maximum fractional adjustment from recovery (default: 0.15)
    pub recovery_modulation: f64,

    pub default_resting_hr: f64,
    pub default_max_hr: f64,
}

impl Default for StrainConfig {
    fn default() -> Self {
        StrainConfig {
            trimp_exponent: 1.92,
            epoc_coefficient: 0.25,
            epoc_exponent: 1.1,
            epoc_max: 850.0,
            cardio_scale: 18.0,
            max_strain: 21.0,
            srpe_trimp_factor: 0.4,
            tss_trimp_factor: 3.0,
            neat_steps_reference: 10_000.0,
            neat_energy_reference: 500.0,
            neat_epoc_per_reference: 6.0,
            recovery_modulation: 0.15,
            default_resting_hr: 60.0,
            default_max_hr: 190.0,
        }
    }
}

/// Non-exercise activity for the day
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NonExercise {
    pub steps: Option<u32>,
    pub active_energy_kcal: Option<f64>,
}

impl NonExercise {
    pub fn from_sample(sample: &DailySample) -> Self {
        NonExercise {
            steps: sample.steps,
            active_energy_kcal: sample.active_energy_kcal,
        }
    }
}

/// Where a workout's load estimate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadSource {
    HeartRateStream,
    AverageHeartRate,
    SessionRpe,
    TrainingStress,
}

impl LoadSource {
    pub fn is_estimate(&self) -> bool {
        matches!(self, LoadSource::SessionRpe | LoadSource::TrainingStress)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutLoad {
    pub workout_id: String,
    pub source: LoadSource,
    pub trimp: f64,
    pub epoc: f64,
    /// Log-compressed cardio load for this workout alone
    pub cardio_load: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrainResult {
    /// Final strain after recovery modulation, clamped to [0, max_strain]
    pub strain: f64,
    /// Strain before recovery modulation
    pub unmodulated: f64,
    pub workouts: Vec<WorkoutLoad>,
    pub neat_epoc: f64,
    pub recovery_factor: f64,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, Default)]
pub struct StrainScorer {
    config: StrainConfig,
}

impl StrainScorer {
    pub fn new() -> Self {
        StrainScorer::default()
    }

    pub fn with_config(config: StrainConfig) -> Self {
        StrainScorer { config }
    }

    pub fn config(&self) -> &StrainConfig {
        &self.config
    }

    /// Daily strain in [0, 21] using the configured resting heart rate
    pub fn score(
        &self,
        workouts: &[WorkoutRecord],
        non_exercise: NonExercise,
        recovery: Option<u8>,
    ) -> f64 {
        self.assess(workouts, non_exercise, recovery, None).strain
    }

    /// Resting HR for heart-rate reserve: the day's reading, then the
    /// baseline, then configuration
    pub fn resolve_resting_hr(&self, today: Option<&DailySample>, baseline: Option<&Baseline>) -> f64 {
        today
            .and_then(|s| s.rhr_bpm)
            .or_else(|| baseline.map(|b| b.median))
            .unwrap_or(self.config.default_resting_hr)
    }

    pub fn assess(
        &self,
        workouts: &[WorkoutRecord],
        non_exercise: NonExercise,
        recovery: Option<u8>,
        resting_hr: Option<f64>,
    ) -> StrainResult {
        let resting_hr = resting_hr.unwrap_or(self.config.default_resting_hr);
        let mut reasons = Vec::new();

        let loads: Vec<WorkoutLoad> = workouts
            .iter()
            .map(|w| self.workout_load(w, resting_hr))
            .collect();

        for load in loads.iter().filter(|l| l.source.is_estimate()) {
            reasons.push(format!(
                "workout {} load estimated from {}",
                load.workout_id,
                match load.source {
                    LoadSource::SessionRpe => "session RPE",
                    _ => "training stress score",
                }
            ));
        }
        reasons.extend(self.concurrency_reasons(workouts, &loads));

        let neat_epoc = self.neat_epoc(non_exercise);
        let total_epoc: f64 = loads.iter().map(|l| l.epoc).sum::<f64>() + neat_epoc;
        let unmodulated = self.compress(total_epoc);
        let recovery_factor = self.recovery_factor(recovery);
        let strain = round2((unmodulated * recovery_factor).clamp(0.0, self.config.max_strain));

        let confidence = if reasons.is_empty() {
            Confidence::Full
        } else {
            warn!(reasons = ?reasons, "Strain computed with reduced confidence");
            Confidence::Reduced(reasons)
        };

        debug!(
            workouts = loads.len(),
            total_epoc,
            neat_epoc,
            recovery_factor,
            strain,
            "Strain scored"
        );

        StrainResult {
            strain,
            unmodulated,
            workouts: loads,
            neat_epoc,
            recovery_factor,
            confidence,
        }
    }

    /// Load estimate for one workout, picking the best available input
    pub fn workout_load(&self, workout: &WorkoutRecord, resting_hr: f64) -> WorkoutLoad {
        let max_hr = workout
            .max_hr
            .map_or(self.config.default_max_hr, |m| m.max(self.config.default_max_hr));

        let stream = self.stream_trimp(workout, resting_hr, max_hr);
        let average = || {
            workout.avg_hr.and_then(|hr| {
                heart_rate_reserve(hr, resting_hr, max_hr)
                    .map(|hrr| self.banister(workout.duration_minutes(), hrr))
            })
        };
        let session_rpe = || {
            workout
                .rpe
                .map(|rpe| rpe * workout.duration_minutes() * self.config.srpe_trimp_factor)
        };

        // Strength sessions under-read on average HR, so RPE is preferred there
        let (source, trimp) = match (stream, workout.kind) {
            (Some(trimp), _) => (LoadSource::HeartRateStream, trimp),
            (None, WorkoutKind::Strength) => session_rpe()
                .map(|t| (LoadSource::SessionRpe, t))
                .or_else(|| average().map(|t| (LoadSource::AverageHeartRate, t)))
                .unwrap_or_else(|| (LoadSource::TrainingStress, self.tss_trimp(workout))),
            (None, _) => average()
                .map(|t| (LoadSource::AverageHeartRate, t))
                .or_else(|| session_rpe().map(|t| (LoadSource::SessionRpe, t)))
                .unwrap_or_else(|| (LoadSource::TrainingStress, self.tss_trimp(workout))),
        };

        let trimp = trimp.max(0.0);
        let epoc = self.epoc(trimp);
        WorkoutLoad {
            workout_id: workout.id.clone(),
            source,
            trimp,
            epoc,
            cardio_load: self.compress(epoc),
        }
    }

    fn stream_trimp(&self, workout: &WorkoutRecord, resting_hr: f64, max_hr: f64) -> Option<f64> {
        let samples = workout.hr_samples.as_ref()?;
        let mut total_sec = 0u64;
        let mut trimp = 0.0;
        for sample in samples {
            total_sec += sample.duration_sec as u64;
            if let Some(hrr) = heart_rate_reserve(sample.bpm, resting_hr, max_hr) {
                trimp += self.banister(sample.duration_sec as f64 / 60.0, hrr);
            }
        }
        (total_sec > 0).then_some(trimp)
    }

    fn tss_trimp(&self, workout: &WorkoutRecord) -> f64 {
        workout
            .training_stress_score
            .to_f64()
            .unwrap_or(0.0)
            .max(0.0)
            * self.config.tss_trimp_factor
    }

    /// Banister TRIMP for a constant-intensity segment
    pub fn banister(&self, minutes: f64, hrr: f64) -> f64 {
        minutes * hrr * (self.config.trimp_exponent * hrr).exp()
    }

    pub fn epoc(&self, trimp: f64) -> f64 {
        if trimp <= 0.0 {
            return 0.0;
        }
        self.config.epoc_coefficient * trimp.powf(self.config.epoc_exponent)
    }

    /// Log-compress an EPOC total onto the cardio scale
    pub fn compress(&self, epoc: f64) -> f64 {
        if epoc <= 0.0 {
            return 0.0;
        }
        self.config.cardio_scale * (epoc + 1.0).ln() / (self.config.epoc_max + 1.0).ln()
    }

    pub fn neat_epoc(&self, non_exercise: NonExercise) -> f64 {
        let per = self.config.neat_epoc_per_reference;
        let from_steps = non_exercise
            .steps
            .map_or(0.0, |s| s as f64 / self.config.neat_steps_reference * per);
        let from_energy = non_exercise
            .active_energy_kcal
            .map_or(0.0, |k| k.max(0.0) / self.config.neat_energy_reference * per);
        from_steps.max(from_energy)
    }

    /// 1.0 at recovery 50; up to +modulation at 0 and -modulation at 100
    pub fn recovery_factor(&self, recovery: Option<u8>) -> f64 {
        match recovery {
            Some(r) => {
                let r = r.min(100) as f64;
                1.0 + self.config.recovery_modulation * (50.0 - r) / 50.0
            }
            None => 1.0,
        }
    }

    fn concurrency_reasons(&self, workouts: &[WorkoutRecord], loads: &[WorkoutLoad]) -> Vec<String> {
        let mut reasons = Vec::new();
        for (i, a) in workouts.iter().enumerate() {
            for (j, b) in workouts.iter().enumerate().skip(i + 1) {
                if !a.overlaps(b) || (a.has_power && b.has_power) {
                    continue;
                }
                let hr_based = [&loads[i], &loads[j]].iter().any(|l| {
                    matches!(
                        l.source,
                        LoadSource::HeartRateStream | LoadSource::AverageHeartRate
                    )
                });
                if hr_based {
                    reasons.push(format!(
                        "concurrent workouts {} and {} lack power data; heart-rate load substituted",
                        a.id, b.id
                    ));
                }
            }
        }
        reasons
    }
}

/// Fraction of heart-rate reserve, clamped to [0, 1]
pub fn heart_rate_reserve(hr: f64, resting_hr: f64, max_hr: f64) -> Option<f64> {
    if !hr.is_finite() || max_hr <= resting_hr {
        return None;
    }
    Some(((hr - resting_hr) / (max_hr - resting_hr)).clamp(0.0, 1.0))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
