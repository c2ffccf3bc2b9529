use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::import::{ImportFormat, ImportedData};
use crate::models::{DailySample, WorkoutRecord};

/// Document layout accepted by the JSON importer
///
/// Either list may be omitted.
#[derive(Debug, Default, Deserialize)]
struct JsonDocument {
    #[serde(default)]
    samples: Vec<DailySample>,
    #[serde(default)]
    workouts: Vec<WorkoutRecord>,
}

/// JSON importer for `{ "samples": [...], "workouts": [...] }` documents
pub struct JsonImporter;

impl Default for JsonImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonImporter {
    pub fn new() -> Self {
        JsonImporter
    }

    pub fn import_from_str(&self, content: &str) -> Result<ImportedData> {
        let doc: JsonDocument =
            serde_json::from_str(content).context("Failed to parse JSON document")?;
        Ok(ImportedData {
            samples: doc.samples,
            workouts: doc.workouts,
        })
    }
}

impl ImportFormat for JsonImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false)
    }

    fn import_file(&self, file_path: &Path) -> Result<ImportedData> {
        let content = std::fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read {}", file_path.display()))?;
        self.import_from_str(&content)
            .with_context(|| format!("in {}", file_path.display()))
    }

    fn get_format_name(&self) -> &'static str {
        "JSON"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_import_document() {
        let json = r#"{
            "samples": [
                {"date": "2024-04-01", "hrv_ms": 61.0, "rhr_bpm": 47.0, "respiratory_rate": null,
                 "sleep_duration_sec": 26100, "sleep_stages": null, "steps": 8000,
                 "active_energy_kcal": null, "sleep_onset": "22:45:00"}
            ],
            "workouts": [
                {"id": "run-1", "date": "2024-04-01", "duration_sec": 2700, "avg_hr": 150.0,
                 "rpe": null, "training_stress_score": "55.5"}
            ]
        }"#;
        let data = JsonImporter::new().import_from_str(json).unwrap();

        assert_eq!(data.samples.len(), 1);
        assert_eq!(data.samples[0].hrv_ms, Some(61.0));
        assert!(data.samples[0].sleep_onset.is_some());
        assert_eq!(data.workouts[0].training_stress_score, dec!(55.5));
        assert!(!data.workouts[0].has_power);
    }

    #[test]
    fn test_missing_lists_default_empty() {
        let data = JsonImporter::new().import_from_str("{}").unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn test_malformed_json() {
        assert!(JsonImporter::new().import_from_str("{\"samples\": [").is_err());
    }
}
