use crate::import::validation::{SampleValidator, ValidationConfig, ValidationIssue, WorkoutValidator};
use crate::models::{DailySample, WorkoutRecord};
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub mod csv;
pub mod json;
pub mod validation;

/// Samples and workouts read from one or more files
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedData {
    pub samples: Vec<DailySample>,
    pub workouts: Vec<WorkoutRecord>,
}

impl ImportedData {
    pub fn append(&mut self, mut other: ImportedData) {
        self.samples.append(&mut other.samples);
        self.workouts.append(&mut other.workouts);
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty() && self.workouts.is_empty()
    }

    /// One sample per date; a later record for the same date supersedes
    /// the earlier one, as a re-sync would
    pub fn dedup_samples(&mut self) {
        let by_date: BTreeMap<_, _> = self
            .samples
            .drain(..)
            .map(|s| (s.date, s))
            .collect();
        self.samples = by_date.into_values().collect();
    }
}

/// Outcome of running the validation boundary over imported data
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub samples: usize,
    pub workouts: usize,
    pub rejected_workouts: usize,
    pub issues: Vec<ValidationIssue>,
}

/// Trait for importing data from different file formats
pub trait ImportFormat {
    /// Check if this importer can handle the given file
    fn can_import(&self, file_path: &Path) -> bool;

    fn import_file(&self, file_path: &Path) -> Result<ImportedData>;

    fn get_format_name(&self) -> &'static str;
}

/// Manager for coordinating different import formats
pub struct ImportManager {
    importers: Vec<Box<dyn ImportFormat>>,
    validation: ValidationConfig,
}

impl Default for ImportManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportManager {
    pub fn new() -> Self {
        Self::with_validation(ValidationConfig::default())
    }

    pub fn with_validation(validation: ValidationConfig) -> Self {
        let importers: Vec<Box<dyn ImportFormat>> = vec![
            Box::new(csv::CsvImporter::new()),
            Box::new(json::JsonImporter::new()),
        ];

        Self {
            importers,
            validation,
        }
    }

    /// Import a single file, auto-detecting the format
    pub fn import_file(&self, file_path: &Path) -> Result<ImportedData> {
        for importer in &self.importers {
            if importer.can_import(file_path) {
                info!(
                    path = %file_path.display(),
                    format = importer.get_format_name(),
                    "Importing file"
                );
                return importer.import_file(file_path);
            }
        }

        anyhow::bail!("No importer found for file: {}", file_path.display());
    }

    /// Import a file or every importable file in a directory
    pub fn import_path(&self, path: &Path) -> Result<ImportedData> {
        if path.is_dir() {
            self.import_directory(path)
        } else {
            self.import_file(path)
        }
    }

    pub fn import_directory(&self, dir_path: &Path) -> Result<ImportedData> {
        let mut all = ImportedData::default();
        let files = self.collect_importable_files(dir_path)?;

        if files.is_empty() {
            warn!(path = %dir_path.display(), "No importable files found");
            return Ok(all);
        }

        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({msg})",
                )?
                .progress_chars("#>-"),
        );

        for file_path in files {
            let name = file_path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string();
            pb.set_message(format!("Processing {}", name));

            match self.import_file(&file_path) {
                Ok(data) => {
                    pb.println(format!(
                        "✓ Imported {} samples and {} workouts from {}",
                        data.samples.len(),
                        data.workouts.len(),
                        name
                    ));
                    all.append(data);
                }
                Err(e) => {
                    pb.println(format!("✗ Failed to import {}: {}", name, e));
                }
            }

            pb.inc(1);
        }

        pb.finish_with_message("Import complete");
        Ok(all)
    }

    /// Run the validation boundary: clean samples, drop unusable workouts
    pub fn validate(&self, data: &mut ImportedData) -> ImportReport {
        data.dedup_samples();
        let mut issues = SampleValidator::new(self.validation.clone()).clean_all(&mut data.samples);

        let workouts = std::mem::take(&mut data.workouts);
        let (kept, workout_issues, rejected) =
            WorkoutValidator::new(self.validation.clone()).validate_all(workouts);
        data.workouts = kept;
        issues.extend(workout_issues);

        info!(
            samples = data.samples.len(),
            workouts = data.workouts.len(),
            rejected,
            issues = issues.len(),
            "Validation complete"
        );

        ImportReport {
            samples: data.samples.len(),
            workouts: data.workouts.len(),
            rejected_workouts: rejected,
            issues,
        }
    }

    fn collect_importable_files(&self, dir_path: &Path) -> Result<Vec<PathBuf>> {
        if !dir_path.is_dir() {
            anyhow::bail!("Path is not a directory: {}", dir_path.display());
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir_path)? {
            let path = entry?.path();
            if path.is_file() && self.importers.iter().any(|i| i.can_import(&path)) {
                files.push(path);
            }
        }
        files.sort();

        Ok(files)
    }
}
