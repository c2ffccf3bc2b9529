use crate::models::HeartRateSample;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors that can occur during zone configuration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ZoneError {
    #[error("Invalid threshold value: {0}")]
    InvalidThreshold(String),
    #[error("Zone thresholds must be strictly increasing: {0:?}")]
    NotIncreasing(Vec<f64>),
    #[error("Invalid heart rate range: resting {resting} must be below max {max}")]
    InvalidHeartRateRange { resting: f64, max: f64 },
}

/// Coarse intensity class used for polarization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntensityClass {
    Low,
    Moderate,
    High,
}

impl IntensityClass {
    /// Zones 1-2 are low, 3 moderate, 4 and up high
    pub fn from_zone(zone: u8) -> Self {
        match zone {
            0..=2 => IntensityClass::Low,
            3 => IntensityClass::Moderate,
            _ => IntensityClass::High,
        }
    }

    /// Session RPE: 1-4 low, 5-6 moderate, 7-10 high
    pub fn from_rpe(rpe: f64) -> Self {
        if rpe < 5.0 {
            IntensityClass::Low
        } else if rpe < 7.0 {
            IntensityClass::Moderate
        } else {
            IntensityClass::High
        }
    }
}

impl fmt::Display for IntensityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntensityClass::Low => write!(f, "low"),
            IntensityClass::Moderate => write!(f, "moderate"),
            IntensityClass::High => write!(f, "high"),
        }
    }
}

/// Five heart-rate zones defined by heart-rate reserve fractions
///
/// Four upper bounds split the reserve into zones 1-5:
/// - Z1: < 60% HRR (Recovery)
/// - Z2: 60-70% HRR (Aerobic Base)
/// - Z3: 70-80% HRR (Tempo)
/// - Z4: 80-90% HRR (Threshold)
/// - Z5: 90%+ HRR (VO2 Max)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct IntensityZones {
    thresholds: Vec<f64>,
}

impl Default for IntensityZones {
    fn default() -> Self {
        IntensityZones {
            thresholds: vec![0.60, 0.70, 0.80, 0.90],
        }
    }
}

impl IntensityZones {
    /// Validate and build zones from HRR fractions in (0, 1)
    pub fn new(thresholds: Vec<f64>) -> Result<Self, ZoneError> {
        if thresholds.is_empty() {
            return Err(ZoneError::InvalidThreshold(
                "at least one zone boundary is required".to_string(),
            ));
        }
        if let Some(bad) = thresholds
            .iter()
            .find(|t| !t.is_finite() || **t <= 0.0 || **t >= 1.0)
        {
            return Err(ZoneError::InvalidThreshold(format!(
                "{} is outside (0, 1)",
                bad
            )));
        }
        if thresholds.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ZoneError::NotIncreasing(thresholds));
        }
        Ok(IntensityZones { thresholds })
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    pub fn zone_count(&self) -> u8 {
        self.thresholds.len() as u8 + 1
    }

    /// Zone (1-based) for a heart-rate reserve fraction
    pub fn zone_for_reserve(&self, hrr: f64) -> u8 {
        self.thresholds.iter().take_while(|t| hrr >= **t).count() as u8 + 1
    }

    /// Bind the zones to an athlete's heart-rate range
    pub fn for_athlete(&self, resting_hr: f64, max_hr: f64) -> Result<HeartRateZones, ZoneError> {
        if !(resting_hr.is_finite() && max_hr.is_finite()) || max_hr <= resting_hr {
            return Err(ZoneError::InvalidHeartRateRange {
                resting: resting_hr,
                max: max_hr,
            });
        }
        Ok(HeartRateZones {
            zones: self.clone(),
            resting_hr,
            max_hr,
        })
    }
}

impl TryFrom<Vec<f64>> for IntensityZones {
    type Error = ZoneError;

    fn try_from(value: Vec<f64>) -> Result<Self, Self::Error> {
        IntensityZones::new(value)
    }
}

impl From<IntensityZones> for Vec<f64> {
    fn from(zones: IntensityZones) -> Self {
        zones.thresholds
    }
}

/// Zones resolved against one athlete's resting and maximum heart rate
#[derive(Debug, Clone, PartialEq)]
pub struct HeartRateZones {
    zones: IntensityZones,
    resting_hr: f64,
    max_hr: f64,
}

impl HeartRateZones {
    pub fn reserve(&self, hr: f64) -> f64 {
        ((hr - self.resting_hr) / (self.max_hr - self.resting_hr)).clamp(0.0, 1.0)
    }

    pub fn zone_for_hr(&self, hr: f64) -> u8 {
        self.zones.zone_for_reserve(self.reserve(hr))
    }

    pub fn class_for_hr(&self, hr: f64) -> IntensityClass {
        IntensityClass::from_zone(self.zone_for_hr(hr))
    }

    /// Upper bpm bound of each zone but the last
    pub fn upper_bounds_bpm(&self) -> Vec<f64> {
        self.zones
            .thresholds()
            .iter()
            .map(|t| self.resting_hr + t * (self.max_hr - self.resting_hr))
            .collect()
    }

    /// Seconds spent in each zone
    pub fn time_in_zones(&self, samples: &[HeartRateSample]) -> ZoneDistribution {
        let mut seconds = vec![0u64; self.zones.zone_count() as usize];
        for sample in samples {
            let zone = self.zone_for_hr(sample.bpm) as usize;
            if let Some(slot) = seconds.get_mut(zone - 1) {
                *slot += sample.duration_sec as u64;
            }
        }
        ZoneDistribution { seconds }
    }
}

/// Time-in-zone totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneDistribution {
    /// Seconds per zone, zone 1 first
    pub seconds: Vec<u64>,
}

impl ZoneDistribution {
    pub fn total_seconds(&self) -> u64 {
        self.seconds.iter().sum()
    }

    pub fn zone_percent(&self, zone: u8) -> f64 {
        let total = self.total_seconds();
        match (zone.checked_sub(1), total) {
            (_, 0) | (None, _) => 0.0,
            (Some(idx), _) => {
                self.seconds.get(idx as usize).copied().unwrap_or(0) as f64 / total as f64 * 100.0
            }
        }
    }

    /// Seconds per intensity class
    pub fn by_class(&self) -> [(IntensityClass, u64); 3] {
        let mut totals = [
            (IntensityClass::Low, 0),
            (IntensityClass::Moderate, 0),
            (IntensityClass::High, 0),
        ];
        for (i, secs) in self.seconds.iter().enumerate() {
            let idx = IntensityClass::from_zone(i as u8 + 1) as usize;
            totals[idx].1 += secs;
        }
        totals
    }
}
