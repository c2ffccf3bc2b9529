//! Physiological scoring for wearable data
//!
//! Turns daily wearable samples (HRV, resting heart rate, respiration, sleep,
//! activity) and workouts into recovery, sleep and strain scores, a fitness and
//! fatigue model, and the analytics built on top of them.

pub mod baseline;
pub mod cache;
pub mod config;
pub mod correlation;
pub mod error;
pub mod export;
pub mod import;
pub mod logging;
pub mod models;
pub mod phase;
pub mod pipeline;
pub mod pmc;
pub mod recovery;
pub mod risk;
pub mod scoring;
pub mod sleep;
pub mod strain;
pub mod zones;

pub use models::*;
pub use baseline::{Baseline, BaselineConfig, BaselineEngine};
pub use cache::{CacheMetrics, ScoreCache};
pub use config::AppConfig;
pub use correlation::CorrelationAnalyzer;
pub use error::{CalculationError, ImportExportError, Result, VitalsError};
pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};
pub use phase::TrainingPhaseDetector;
pub use pipeline::{AthleteTimeline, ScoringPipeline, UserScores};
pub use pmc::TrainingLoadTracker;
pub use recovery::RecoveryScorer;
pub use risk::OvertrainingRiskAssessor;
pub use sleep::SleepScorer;
pub use strain::StrainScorer;
