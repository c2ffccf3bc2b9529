use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sleep stage composition for a night, as percentages of total sleep time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SleepStagePercentages {
    pub deep: f64,
    pub rem: f64,
    pub core: f64,
    pub awake: f64,
}

impl SleepStagePercentages {
    /// Combined restorative share (deep + REM)
    pub fn restorative(&self) -> f64 {
        self.deep + self.rem
    }

    pub fn total(&self) -> f64 {
        self.deep + self.rem + self.core + self.awake
    }
}

/// Per-day aggregated physiological sample
///
/// One per calendar day. Every measurement is optional because device and
/// permission gaps are normal. A sample is only replaced when the source data
/// for that date is re-synced.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DailySample {
    pub date: NaiveDate,

    /// Heart rate variability (RMSSD/SDNN as delivered by the source), ms
    pub hrv_ms: Option<f64>,

    /// Resting heart rate, bpm
    pub rhr_bpm: Option<f64>,

    /// Sleeping respiratory rate, breaths per minute
    pub respiratory_rate: Option<f64>,

    /// Time asleep, seconds
    pub sleep_duration_sec: Option<u32>,

    /// Time in bed, seconds
    #[serde(default)]
    pub time_in_bed_sec: Option<u32>,

    pub sleep_stages: Option<SleepStagePercentages>,

    /// Number of wake interruptions during the night
    #[serde(default)]
    pub sleep_disturbances: Option<u16>,

    /// Clock time the night's sleep began
    #[serde(default)]
    pub sleep_onset: Option<NaiveTime>,

    pub steps: Option<u32>,

    pub active_energy_kcal: Option<f64>,
}

impl DailySample {
    /// Empty sample for a date
    pub fn new(date: NaiveDate) -> Self {
        DailySample {
            date,
            ..DailySample::default()
        }
    }

    pub fn sleep_hours(&self) -> Option<f64> {
        self.sleep_duration_sec.map(|s| s as f64 / 3600.0)
    }
}

/// Physiological metrics that carry a personal baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Metric {
    Hrv,
    RestingHeartRate,
    RespiratoryRate,
    SleepDuration,
    Steps,
    ActiveEnergy,
}

impl Metric {
    /// Extract this metric's value from a daily sample
    pub fn value(&self, sample: &DailySample) -> Option<f64> {
        match self {
            Metric::Hrv => sample.hrv_ms,
            Metric::RestingHeartRate => sample.rhr_bpm,
            Metric::RespiratoryRate => sample.respiratory_rate,
            Metric::SleepDuration => sample.sleep_duration_sec.map(f64::from),
            Metric::Steps => sample.steps.map(f64::from),
            Metric::ActiveEnergy => sample.active_energy_kcal,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Hrv => write!(f, "HRV"),
            Metric::RestingHeartRate => write!(f, "Resting HR"),
            Metric::RespiratoryRate => write!(f, "Respiratory Rate"),
            Metric::SleepDuration => write!(f, "Sleep Duration"),
            Metric::Steps => write!(f, "Steps"),
            Metric::ActiveEnergy => write!(f, "Active Energy"),
        }
    }
}

/// Broad workout category, used to pick a load estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkoutKind {
    #[default]
    Cardio,
    Strength,
    Mixed,
}

/// Constant-heart-rate segment of a workout's HR stream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeartRateSample {
    pub duration_sec: u32,
    pub bpm: f64,
}

/// Structured workout record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutRecord {
    /// Unique identifier for the workout
    pub id: String,

    /// Calendar day the workout counts towards
    pub date: NaiveDate,

    /// Wall-clock start, used to detect concurrent sessions
    #[serde(default)]
    pub start: Option<NaiveDateTime>,

    /// Duration of the workout in seconds
    pub duration_sec: u32,

    #[serde(default)]
    pub kind: WorkoutKind,

    pub avg_hr: Option<f64>,

    #[serde(default)]
    pub max_hr: Option<f64>,

    /// Heart rate stream summary (segments of roughly constant HR)
    #[serde(default)]
    pub hr_samples: Option<Vec<HeartRateSample>>,

    /// Whether a power stream backed this workout
    #[serde(default)]
    pub has_power: bool,

    /// Session rating of perceived exertion, 1.0-10.0
    pub rpe: Option<f64>,

    /// Training Stress Score precomputed by the source
    pub training_stress_score: Decimal,
}

impl WorkoutRecord {
    pub fn duration_minutes(&self) -> f64 {
        self.duration_sec as f64 / 60.0
    }

    pub fn duration_hours(&self) -> f64 {
        self.duration_sec as f64 / 3600.0
    }

    /// Wall-clock end, when the start is known
    pub fn end(&self) -> Option<NaiveDateTime> {
        self.start
            .map(|s| s + chrono::Duration::seconds(self.duration_sec as i64))
    }

    /// True when both workouts have known start times and their intervals intersect
    pub fn overlaps(&self, other: &WorkoutRecord) -> bool {
        match (self.start, self.end(), other.start, other.end()) {
            (Some(a_start), Some(a_end), Some(b_start), Some(b_end)) => {
                a_start < b_end && b_start < a_end
            }
            _ => false,
        }
    }
}

/// Exponentially weighted training load state
///
/// TSB is never stored independently: it is always derived as CTL - ATL, so
/// the three values cannot drift apart. It is serialized for consumers and
/// ignored on input.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "LoadRecord", into = "LoadRecord")]
pub struct TrainingLoad {
    ctl: f64,
    atl: f64,
}

impl TrainingLoad {
    /// Build a load state; negative inputs are floored at zero
    pub fn new(ctl: f64, atl: f64) -> Self {
        TrainingLoad {
            ctl: ctl.max(0.0),
            atl: atl.max(0.0),
        }
    }

    pub fn zero() -> Self {
        TrainingLoad::default()
    }

    /// Chronic Training Load ("fitness")
    pub fn ctl(&self) -> f64 {
        self.ctl
    }

    /// Acute Training Load ("fatigue")
    pub fn atl(&self) -> f64 {
        self.atl
    }

    /// Training Stress Balance ("form")
    pub fn tsb(&self) -> f64 {
        self.ctl - self.atl
    }

    /// Acute:chronic ratio, undefined without chronic load
    pub fn acute_chronic_ratio(&self) -> Option<f64> {
        if self.ctl > 0.0 {
            Some(self.atl / self.ctl)
        } else {
            None
        }
    }
}

#[derive(Serialize, Deserialize)]
struct LoadRecord {
    ctl: f64,
    atl: f64,
    #[serde(default)]
    tsb: f64,
}

impl From<LoadRecord> for TrainingLoad {
    fn from(record: LoadRecord) -> Self {
        TrainingLoad::new(record.ctl, record.atl)
    }
}

impl From<TrainingLoad> for LoadRecord {
    fn from(load: TrainingLoad) -> Self {
        LoadRecord {
            ctl: load.ctl,
            atl: load.atl,
            tsb: load.tsb(),
        }
    }
}

/// Quality flag for derived outputs that relied on substituted inputs
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "level", content = "reasons")]
pub enum Confidence {
    #[default]
    Full,
    Reduced(Vec<String>),
}

impl Confidence {
    pub fn is_reduced(&self) -> bool {
        matches!(self, Confidence::Reduced(_))
    }
}

/// Scores and load state for one calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyScore {
    pub date: NaiveDate,

    /// Recovery score (0-100)
    pub recovery: Option<u8>,

    /// Sleep score (0-100)
    pub sleep: Option<u8>,

    /// Strain (0-21)
    pub strain: Option<f64>,

    /// CTL/ATL/TSB after applying this day's TSS
    pub load: TrainingLoad,

    /// Total TSS for the day
    pub daily_tss: f64,

    /// Percentage HRV sits below its baseline (negative when above)
    pub hrv_deviation_pct: Option<f64>,

    /// Hours of sleep short of the personal target (negative on surplus)
    pub sleep_debt_hours: Option<f64>,

    #[serde(default)]
    pub strain_confidence: Confidence,
}

impl DailyScore {
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

/// Strength of a correlation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Significance {
    None,
    Weak,
    Moderate,
    Strong,
}

impl Significance {
    pub fn from_coefficient(r: f64) -> Self {
        let magnitude = r.abs();
        if magnitude >= 0.7 {
            Significance::Strong
        } else if magnitude >= 0.4 {
            Significance::Moderate
        } else if magnitude >= 0.2 {
            Significance::Weak
        } else {
            Significance::None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Positive,
    Negative,
}

/// Ordinary least-squares line through the paired series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendLine {
    pub slope: f64,
    pub intercept: f64,
}

impl TrendLine {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    /// Pearson coefficient in [-1, 1]
    pub coefficient: f64,
    pub r_squared: f64,
    pub sample_size: usize,
    pub significance: Significance,
    pub trend: Trend,
    /// Undefined when x has no variance
    pub trend_line: Option<TrendLine>,
    /// Two-sided p-value of the coefficient, `None` below 3 pairs or without variance
    pub p_value: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    /// Map a 0-100 risk score to its level
    pub fn from_score(score: f64) -> Self {
        if score >= 70.0 {
            RiskLevel::Critical
        } else if score >= 50.0 {
            RiskLevel::High
        } else if score >= 30.0 {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "Low"),
            RiskLevel::Moderate => write!(f, "Moderate"),
            RiskLevel::High => write!(f, "High"),
            RiskLevel::Critical => write!(f, "Critical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub name: String,
    /// Severity in [0, 1]
    pub severity: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Risk score in [0, 100]
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    /// Most severe factors first
    pub factors: Vec<RiskFactor>,
    pub recommendation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainingPhase {
    Base,
    Build,
    Peak,
    Recovery,
    Transition,
}

impl fmt::Display for TrainingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainingPhase::Base => write!(f, "Base"),
            TrainingPhase::Build => write!(f, "Build"),
            TrainingPhase::Peak => write!(f, "Peak"),
            TrainingPhase::Recovery => write!(f, "Recovery"),
            TrainingPhase::Transition => write!(f, "Transition"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseResult {
    pub phase: TrainingPhase,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// TSS over the most recent 7 days
    pub weekly_tss: f64,
    pub low_intensity_percent: f64,
    pub high_intensity_percent: f64,
    pub recommendation: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn workout_at(hour: u32, minutes: u32) -> WorkoutRecord {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        WorkoutRecord {
            id: format!("w{}", hour),
            date,
            start: Some(date.and_hms_opt(hour, 0, 0).unwrap()),
            duration_sec: minutes * 60,
            kind: WorkoutKind::Cardio,
            avg_hr: Some(140.0),
            max_hr: None,
            hr_samples: None,
            has_power: false,
            rpe: None,
            training_stress_score: dec!(50),
        }
    }

    #[test]
    fn test_tsb_is_derived() {
        let load = TrainingLoad::new(60.0, 75.0);
        assert_eq!(load.tsb(), -15.0);

        let negative = TrainingLoad::new(-3.0, 10.0);
        assert_eq!(negative.ctl(), 0.0);
    }

    #[test]
    fn test_training_load_serde_ignores_stored_tsb() {
        let json = r#"{"ctl": 50.0, "atl": 40.0, "tsb": 999.0}"#;
        let load: TrainingLoad = serde_json::from_str(json).unwrap();
        assert_eq!(load.tsb(), 10.0);

        let out = serde_json::to_value(load).unwrap();
        assert_eq!(out["tsb"], serde_json::json!(10.0));
    }

    #[test]
    fn test_workout_overlap() {
        let morning = workout_at(7, 60);
        let overlapping = workout_at(7, 30);
        let evening = workout_at(18, 45);

        assert!(morning.overlaps(&overlapping));
        assert!(!morning.overlaps(&evening));
    }

    #[test]
    fn test_significance_thresholds() {
        assert_eq!(Significance::from_coefficient(0.75), Significance::Strong);
        assert_eq!(Significance::from_coefficient(-0.5), Significance::Moderate);
        assert_eq!(Significance::from_coefficient(0.2), Significance::Weak);
        assert_eq!(Significance::from_coefficient(0.1), Significance::None);
    }

    #[test]
    fn test_risk_level_bands() {
        assert_eq!(RiskLevel::from_score(12.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(30.0), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_score(49.9), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_score(50.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(70.0), RiskLevel::Critical);
    }

    #[test]
    fn test_metric_extraction() {
        let mut sample = DailySample::new(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        sample.hrv_ms = Some(55.0);
        sample.sleep_duration_sec = Some(7 * 3600);

        assert_eq!(Metric::Hrv.value(&sample), Some(55.0));
        assert_eq!(Metric::SleepDuration.value(&sample), Some(25200.0));
        assert_eq!(Metric::RestingHeartRate.value(&sample), None);
        assert_eq!(sample.sleep_hours(), Some(7.0));
    }
}
