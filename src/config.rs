use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::baseline::BaselineConfig;
use crate::error::VitalsError;
use crate::import::validation::ValidationConfig;
use crate::logging::LogConfig;
use crate::phase::PhaseConfig;
use crate::pmc::PmcConfig;
use crate::recovery::RecoveryConfig;
use crate::risk::RiskConfig;
use crate::sleep::SleepConfig;
use crate::strain::StrainConfig;

/// Main application configuration
///
/// Every section falls back to its defaults, so a file only needs the values
/// it overrides.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Rolling baseline window and outlier rejection
    pub baseline: BaselineConfig,

    /// Recovery component weights
    pub recovery: RecoveryConfig,

    /// Sleep component weights and default sleep need
    pub sleep: SleepConfig,

    /// Strain model constants
    pub strain: StrainConfig,

    /// Performance Management Chart settings
    pub pmc: PmcConfig,

    /// Overtraining risk weights and severity ramps
    pub risk: RiskConfig,

    /// Training phase rules and intensity zones
    pub phase: PhaseConfig,

    /// Plausibility ranges for ingested data
    pub validation: ValidationConfig,

    pub logging: LogConfig,
}

impl AppConfig {
    /// Load configuration from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".vitalrs")
            .join("config.toml")
    }

    /// Load configuration from default location or create default
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();

        if config_path.exists() {
            match Self::load_from_file(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(
                        path = %config_path.display(),
                        "Failed to load config, using defaults: {:#}",
                        e
                    );
                }
            }
        }

        Self::default()
    }

    /// Check values that serde alone cannot reject
    pub fn validate(&self) -> crate::error::Result<()> {
        let invalid = |reason: &str| Err(VitalsError::Configuration(reason.to_string()));

        if self.baseline.window_days == 0 || self.baseline.min_samples == 0 {
            return invalid("baseline window_days and min_samples must be positive");
        }
        if !(self.baseline.outlier_sigma > 0.0) {
            return invalid("baseline outlier_sigma must be positive");
        }
        if !self.recovery.weights.all_positive() {
            return invalid("recovery weights must all be positive");
        }
        if !self.sleep.weights.all_positive() {
            return invalid("sleep weights must all be positive");
        }
        if !(self.sleep.default_target_hours > 0.0) {
            return invalid("sleep default_target_hours must be positive");
        }
        if !self.risk.weights.all_positive() {
            return invalid("risk weights must all be positive");
        }
        if self.risk.min_history_days == 0 {
            return invalid("risk min_history_days must be positive");
        }
        if self.strain.default_max_hr <= self.strain.default_resting_hr {
            return invalid("strain default_max_hr must exceed default_resting_hr");
        }
        if !(self.strain.epoc_max > 0.0 && self.strain.max_strain > 0.0) {
            return invalid("strain epoc_max and max_strain must be positive");
        }
        let (peak_low, peak_high) = self.phase.peak_volume_ratio;
        if peak_low >= peak_high {
            return invalid("phase peak_volume_ratio must be an increasing pair");
        }
        self.phase
            .zones
            .for_athlete(self.phase.resting_hr, self.phase.max_hr)
            .map_err(|e| VitalsError::Configuration(format!("phase: {}", e)))?;

        Ok(())
    }
}
