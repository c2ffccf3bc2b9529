//! Day-by-day scoring over an athlete's timeline
//!
//! Each day reads the baseline window of prior samples, the day's own sample
//! and workouts, and the previous day's training load. Days are folded in
//! calendar order because the load recurrence is sequential; independent
//! athletes are scored in parallel.

use crate::baseline::{BaselineEngine, RecoveryBaselines};
use crate::cache::{InputFingerprint, ScoreCache, ScoringSettings};
use crate::config::AppConfig;
use crate::error::CalculationError;
use crate::import::ImportedData;
use crate::models::{Confidence, DailySample, DailyScore, Metric, TrainingLoad, WorkoutRecord};
use crate::pmc::{LoadChain, TrainingLoadTracker};
use crate::recovery::RecoveryScorer;
use crate::sleep::{SleepContext, SleepScorer};
use crate::strain::{NonExercise, StrainScorer};
use chrono::{Days, Duration, NaiveDate};
use rayon::prelude::*;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{debug, info};

const CALCULATION: &str = "scoring pipeline";

/// One athlete's samples and workouts
///
/// Holds at most one sample per date; a re-synced sample supersedes the
/// stored one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AthleteTimeline {
    user_id: String,
    samples: BTreeMap<NaiveDate, DailySample>,
    workouts: BTreeMap<NaiveDate, Vec<WorkoutRecord>>,
    sleep_target: Option<Duration>,
}

impl AthleteTimeline {
    pub fn new(user_id: impl Into<String>) -> Self {
        AthleteTimeline {
            user_id: user_id.into(),
            ..AthleteTimeline::default()
        }
    }

    pub fn from_imported(user_id: impl Into<String>, data: ImportedData) -> Self {
        let mut timeline = AthleteTimeline::new(user_id);
        for sample in data.samples {
            timeline.upsert_sample(sample);
        }
        for workout in data.workouts {
            timeline.add_workout(workout);
        }
        timeline
    }

    /// Personal sleep need used by the sleep score
    pub fn with_sleep_target(mut self, target: Duration) -> Self {
        self.sleep_target = Some(target);
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn sleep_target(&self) -> Option<Duration> {
        self.sleep_target
    }

    /// Insert or replace the sample for its date
    ///
    /// Returns the earliest date whose scores are now stale, or `None` when
    /// the sample is identical to the stored one.
    pub fn upsert_sample(&mut self, sample: DailySample) -> Option<NaiveDate> {
        let date = sample.date;
        if self.samples.get(&date) == Some(&sample) {
            return None;
        }
        self.samples.insert(date, sample);
        Some(date)
    }

    /// Add a workout, replacing any earlier record with the same id
    ///
    /// Returns the earliest date whose scores are now stale.
    pub fn add_workout(&mut self, workout: WorkoutRecord) -> NaiveDate {
        let mut earliest = workout.date;
        for (date, list) in self.workouts.iter_mut() {
            let before = list.len();
            list.retain(|w| w.id != workout.id);
            if list.len() != before {
                earliest = earliest.min(*date);
            }
        }
        self.workouts.retain(|_, list| !list.is_empty());
        self.workouts.entry(workout.date).or_default().push(workout);
        earliest
    }

    pub fn sample(&self, date: NaiveDate) -> Option<&DailySample> {
        self.samples.get(&date)
    }

    /// Samples in `[start, end)`
    pub fn samples_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Iterator<Item = &DailySample> + Clone + '_ {
        let range = if start < end { start..end } else { end..end };
        self.samples.range(range).map(|(_, s)| s)
    }

    pub fn samples(&self) -> impl Iterator<Item = &DailySample> + '_ {
        self.samples.values()
    }

    pub fn workouts_on(&self, date: NaiveDate) -> &[WorkoutRecord] {
        self.workouts.get(&date).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Workouts in `[start, end]`
    pub fn workouts_between(&self, start: NaiveDate, end: NaiveDate) -> Vec<WorkoutRecord> {
        if start > end {
            return Vec::new();
        }
        self.workouts
            .range(start..=end)
            .flat_map(|(_, list)| list.iter().cloned())
            .collect()
    }

    /// Summed TSS of the day's workouts
    pub fn daily_tss(&self, date: NaiveDate) -> f64 {
        self.workouts_on(date)
            .iter()
            .map(|w| w.training_stress_score)
            .sum::<Decimal>()
            .to_f64()
            .unwrap_or(0.0)
    }

    /// First and last date holding any data
    pub fn span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = [self.samples.keys().next(), self.workouts.keys().next()]
            .into_iter()
            .flatten()
            .min()?;
        let last = [self.samples.keys().next_back(), self.workouts.keys().next_back()]
            .into_iter()
            .flatten()
            .max()?;
        Some((*first, *last))
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty() && self.workouts.is_empty()
    }
}

/// Scores for one athlete from a parallel run
#[derive(Debug, Clone, PartialEq)]
pub struct UserScores {
    pub user_id: String,
    pub result: Result<Vec<DailyScore>, CalculationError>,
}

/// Composes baselines, sleep, recovery, strain and training load into
/// one `DailyScore` per day
#[derive(Debug, Clone, Default)]
pub struct ScoringPipeline {
    baseline: BaselineEngine,
    sleep: SleepScorer,
    recovery: RecoveryScorer,
    strain: StrainScorer,
}

impl ScoringPipeline {
    pub fn new() -> Self {
        ScoringPipeline::default()
    }

    pub fn from_config(config: &AppConfig) -> Self {
        ScoringPipeline {
            baseline: BaselineEngine::with_config(config.baseline.clone()),
            sleep: SleepScorer::with_config(config.sleep.clone()),
            recovery: RecoveryScorer::with_config(config.recovery.clone()),
            strain: StrainScorer::with_config(config.strain.clone()),
        }
    }

    /// Score one day given the load of the day before
    ///
    /// The recovery score's form component uses the load entering the day;
    /// the returned load includes the day's own TSS.
    pub fn score_day(
        &self,
        timeline: &AthleteTimeline,
        date: NaiveDate,
        previous: Option<TrainingLoad>,
    ) -> DailyScore {
        let load = TrainingLoadTracker::update(timeline.daily_tss(date), previous);
        self.score_with_load(timeline, date, previous, load)
    }

    /// Settings every cached score of `timeline` depends on
    pub fn settings_for(&self, timeline: &AthleteTimeline) -> ScoringSettings {
        ScoringSettings::new(
            timeline.sleep_target(),
            &(
                self.baseline.config(),
                self.sleep.config(),
                self.recovery.config(),
                self.strain.config(),
            ),
        )
    }

    fn score_with_load(
        &self,
        timeline: &AthleteTimeline,
        date: NaiveDate,
        previous: Option<TrainingLoad>,
        load: TrainingLoad,
    ) -> DailyScore {
        let workouts = timeline.workouts_on(date);
        let daily_tss = timeline.daily_tss(date);

        let history = timeline.samples_between(self.baseline.window_start(date), date);
        let baselines = RecoveryBaselines {
            hrv: self.baseline.compute_baseline(Metric::Hrv, history.clone(), date),
            rhr: self
                .baseline
                .compute_baseline(Metric::RestingHeartRate, history.clone(), date),
            respiratory: self
                .baseline
                .compute_baseline(Metric::RespiratoryRate, history.clone(), date),
        };

        let today = timeline.sample(date);

        let sleep = today.filter(|s| SleepScorer::has_sleep_data(s)).map(|night| {
            let context = SleepContext {
                target: timeline.sleep_target(),
                habitual_onset: self.sleep.habitual_onset(
                    history.clone(),
                    date,
                    self.baseline.config().window_days,
                ),
            };
            self.sleep.assess(night, context)
        });

        let recovery = today.map(|sample| {
            self.recovery.assess(
                sample,
                &baselines,
                sleep.as_ref().map(|s| f64::from(s.score)),
                previous,
            )
        });
        let recovery_score = recovery.as_ref().map(|r| r.score);

        let strain = if workouts.is_empty() && today.is_none() {
            None
        } else {
            let resting_hr = self.strain.resolve_resting_hr(today, baselines.rhr.as_ref());
            let non_exercise = today.map(NonExercise::from_sample).unwrap_or_default();
            Some(
                self.strain
                    .assess(workouts, non_exercise, recovery_score, Some(resting_hr)),
            )
        };

        DailyScore {
            date,
            recovery: recovery_score,
            sleep: sleep.as_ref().map(|s| s.score),
            strain: strain.as_ref().map(|s| s.strain),
            load,
            daily_tss,
            hrv_deviation_pct: today
                .and_then(|s| RecoveryScorer::hrv_drop_pct(s, baselines.hrv.as_ref())),
            sleep_debt_hours: sleep.and_then(|s| s.sleep_debt_hours),
            strain_confidence: strain.map(|s| s.confidence).unwrap_or(Confidence::Full),
        }
    }

    /// Score every day in `[start, end]`
    ///
    /// `initial` is the load of the day before `start`; `None` starts the
    /// chain fresh from the first day's TSS.
    pub fn run(
        &self,
        timeline: &AthleteTimeline,
        start: NaiveDate,
        end: NaiveDate,
        initial: Option<TrainingLoad>,
    ) -> Result<Vec<DailyScore>, CalculationError> {
        self.fold_days(timeline, start, end, initial, None)
    }

    /// Like [`run`](Self::run), reusing cached days whose inputs are unchanged
    pub fn run_cached(
        &self,
        timeline: &AthleteTimeline,
        start: NaiveDate,
        end: NaiveDate,
        initial: Option<TrainingLoad>,
        cache: &ScoreCache,
    ) -> Result<Vec<DailyScore>, CalculationError> {
        self.fold_days(timeline, start, end, initial, Some(cache))
    }

    fn fold_days(
        &self,
        timeline: &AthleteTimeline,
        start: NaiveDate,
        end: NaiveDate,
        initial: Option<TrainingLoad>,
        cache: Option<&ScoreCache>,
    ) -> Result<Vec<DailyScore>, CalculationError> {
        if start > end {
            return Err(CalculationError::InvalidParameter {
                calculation: CALCULATION.to_string(),
                parameter: "date range".to_string(),
                value: format!("{}..{}", start, end),
            });
        }

        let mut chain = match initial {
            Some(load) => {
                let seed_date = start.pred_opt().ok_or_else(|| CalculationError::InvalidParameter {
                    calculation: CALCULATION.to_string(),
                    parameter: "start".to_string(),
                    value: start.to_string(),
                })?;
                LoadChain::resume(seed_date, load)
            }
            None => LoadChain::new(),
        };
        let settings = cache.map(|_| self.settings_for(timeline));
        let mut scores = Vec::new();

        for date in start.iter_days().take_while(|d| *d <= end) {
            let previous = chain.current().map(|(_, load)| load);
            let load = chain.advance(date, timeline.daily_tss(date))?;

            let score = match (cache, settings.as_ref()) {
                (Some(cache), Some(settings)) => {
                    let window = timeline.samples_between(
                        self.baseline.window_start(date),
                        date.succ_opt().unwrap_or(date),
                    );
                    let fingerprint = InputFingerprint::compute(
                        date,
                        window,
                        timeline.workouts_on(date),
                        previous,
                        settings,
                    );
                    match cache.get(timeline.user_id(), date, &fingerprint) {
                        Some(hit) => hit,
                        None => {
                            let fresh = self.score_with_load(timeline, date, previous, load);
                            cache.put(timeline.user_id(), date, fingerprint, fresh.clone());
                            fresh
                        }
                    }
                }
                _ => self.score_with_load(timeline, date, previous, load),
            };
            scores.push(score);
        }

        info!(
            user = timeline.user_id(),
            start = %start,
            end = %end,
            days = scores.len(),
            "Scoring run complete"
        );
        Ok(scores)
    }

    /// Recompute from `from` onwards after a correction
    ///
    /// Scores before `from` are kept as stored. The chain is reseeded with
    /// the stored load of the day before `from`, so the result equals a full
    /// run over the corrected timeline.
    pub fn replay_from(
        &self,
        previous: &[DailyScore],
        from: NaiveDate,
        timeline: &AthleteTimeline,
        end: NaiveDate,
    ) -> Result<Vec<DailyScore>, CalculationError> {
        let seed_date = from.checked_sub_days(Days::new(1));
        let seed = previous
            .iter()
            .find(|s| Some(s.date) == seed_date)
            .map(|s| s.load);

        let mut scores: Vec<DailyScore> = previous
            .iter()
            .filter(|s| s.date < from)
            .cloned()
            .collect();
        debug!(
            user = timeline.user_id(),
            from = %from,
            kept = scores.len(),
            seeded = seed.is_some(),
            "Replaying scores"
        );

        if end >= from {
            scores.extend(self.run(timeline, from, end, seed)?);
        }
        Ok(scores)
    }

    /// Score independent athletes in parallel, each over its own span
    pub fn run_many(&self, timelines: &[AthleteTimeline]) -> Vec<UserScores> {
        timelines
            .par_iter()
            .map(|timeline| UserScores {
                user_id: timeline.user_id().to_string(),
                result: match timeline.span() {
                    Some((start, end)) => self.run(timeline, start, end, None),
                    None => Ok(Vec::new()),
                },
            })
            .collect()
    }
}
