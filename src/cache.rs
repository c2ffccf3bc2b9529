//! Memoization of daily scores
//!
//! A score is reused only when the fingerprint of everything that produced it
//! matches: the samples in the baseline window (including the day itself), the
//! day's workouts, the previous day's load and the scoring settings. Any
//! correction upstream, a new personal sleep target or a retuned scorer changes
//! the fingerprint and forces a recompute.

use crate::models::{DailySample, DailyScore, TrainingLoad, WorkoutRecord};
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// SHA-256 digest of a day's scoring inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputFingerprint([u8; 32]);

/// Athlete and scorer settings shared by every day of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ScoringSettings {
    sleep_target_sec: Option<i64>,
    config_digest: [u8; 32],
}

impl ScoringSettings {
    /// Settings for an athlete's sleep target and the scorers' configuration
    pub fn new<C: Serialize + std::fmt::Debug>(sleep_target: Option<Duration>, config: &C) -> Self {
        ScoringSettings {
            sleep_target_sec: sleep_target.map(|t| t.num_seconds()),
            config_digest: digest(config),
        }
    }
}

#[derive(Debug, Serialize)]
struct FingerprintInput<'a> {
    date: NaiveDate,
    samples: Vec<&'a DailySample>,
    workouts: &'a [WorkoutRecord],
    previous: Option<TrainingLoad>,
    settings: &'a ScoringSettings,
}

fn digest<T: Serialize + std::fmt::Debug>(value: &T) -> [u8; 32] {
    let mut hasher = Sha256::new();
    match bincode::serialize(value) {
        Ok(bytes) => hasher.update(&bytes),
        // serialization of these types cannot fail; fall back to Debug text
        Err(_) => hasher.update(format!("{:?}", value).as_bytes()),
    }
    hasher.finalize().into()
}

impl InputFingerprint {
    /// Fingerprint the inputs of one day's score
    pub fn compute<'a, I>(
        date: NaiveDate,
        samples: I,
        workouts: &'a [WorkoutRecord],
        previous: Option<TrainingLoad>,
        settings: &'a ScoringSettings,
    ) -> Self
    where
        I: IntoIterator<Item = &'a DailySample>,
    {
        let input = FingerprintInput {
            date,
            samples: samples.into_iter().collect(),
            workouts,
            previous,
            settings,
        };
        InputFingerprint(digest(&input))
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// Cache statistics and metrics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheMetrics {
    pub total_lookups: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Lookups whose entry existed but whose inputs had changed
    pub stale_hits: u64,
    pub evictions: u64,
}

impl CacheMetrics {
    /// Get hit rate as percentage
    pub fn hit_rate(&self) -> f64 {
        if self.total_lookups == 0 {
            return 0.0;
        }
        (self.cache_hits as f64 / self.total_lookups as f64) * 100.0
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    fingerprint: InputFingerprint,
    score: DailyScore,
    last_access: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<(String, NaiveDate), CacheEntry>,
    clock: u64,
    metrics: CacheMetrics,
}

/// In-memory score cache keyed by (user, date) with LRU eviction
///
/// Safe to share between threads scoring different users.
#[derive(Debug)]
pub struct ScoreCache {
    state: Mutex<CacheState>,
    max_entries: usize,
}

impl Default for ScoreCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl ScoreCache {
    pub fn new(max_entries: usize) -> Self {
        ScoreCache {
            state: Mutex::new(CacheState::default()),
            max_entries: max_entries.max(1),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        // a panic while holding the lock leaves only counters half-updated
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Cached score when the inputs are unchanged
    pub fn get(&self, user: &str, date: NaiveDate, fingerprint: &InputFingerprint) -> Option<DailyScore> {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.clock += 1;
        let now = state.clock;
        state.metrics.total_lookups += 1;

        let key = (user.to_string(), date);
        let found = match state.entries.get_mut(&key) {
            Some(entry) if entry.fingerprint == *fingerprint => {
                entry.last_access = now;
                Some(entry.score.clone())
            }
            Some(_) => {
                state.metrics.stale_hits += 1;
                None
            }
            None => None,
        };

        if found.is_some() {
            state.metrics.cache_hits += 1;
        } else {
            state.metrics.cache_misses += 1;
            debug!(user, date = %date, "Score cache miss");
        }
        found
    }

    pub fn put(&self, user: &str, date: NaiveDate, fingerprint: InputFingerprint, score: DailyScore) {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.clock += 1;
        let now = state.clock;
        let key = (user.to_string(), date);

        if !state.entries.contains_key(&key) && state.entries.len() >= self.max_entries {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_access)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                state.entries.remove(&oldest);
                state.metrics.evictions += 1;
            }
        }

        state.entries.insert(
            key,
            CacheEntry {
                fingerprint,
                score,
                last_access: now,
            },
        );
    }

    /// Drop a user's entries on or after `from`
    pub fn invalidate_from(&self, user: &str, from: NaiveDate) -> usize {
        let mut state = self.lock();
        let before = state.entries.len();
        state
            .entries
            .retain(|(u, date), _| !(u == user && *date >= from));
        before - state.entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.lock().metrics.clone()
    }
}
