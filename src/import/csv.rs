use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use csv::{ReaderBuilder, StringRecord};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use crate::import::{ImportFormat, ImportedData};
use crate::models::{DailySample, SleepStagePercentages, WorkoutKind, WorkoutRecord};

/// CSV importer with flexible column mapping
///
/// A file holds either daily samples or workouts; files with a TSS or
/// duration column are read as workouts.
pub struct CsvImporter {
    column_mapping: HashMap<String, String>,
}

impl Default for CsvImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvImporter {
    pub fn new() -> Self {
        let mut column_mapping = HashMap::new();

        Self::add_mapping(&mut column_mapping, "date", &["date", "day", "calendar_date"]);
        Self::add_mapping(
            &mut column_mapping,
            "hrv_ms",
            &["hrv_ms", "hrv", "rmssd", "sdnn", "heart_rate_variability"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "rhr_bpm",
            &["rhr_bpm", "rhr", "resting_hr", "resting_heart_rate"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "respiratory_rate",
            &["respiratory_rate", "resp_rate", "respiration", "breathing_rate"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "sleep_duration_sec",
            &["sleep_duration_sec", "sleep_sec", "asleep_sec", "sleep_duration"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "sleep_hours",
            &["sleep_hours", "sleep_h", "hours_asleep"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "time_in_bed_sec",
            &["time_in_bed_sec", "in_bed_sec", "time_in_bed"],
        );
        Self::add_mapping(&mut column_mapping, "deep", &["deep", "deep_pct", "deep_percent"]);
        Self::add_mapping(&mut column_mapping, "rem", &["rem", "rem_pct", "rem_percent"]);
        Self::add_mapping(
            &mut column_mapping,
            "core",
            &["core", "core_pct", "light", "light_pct"],
        );
        Self::add_mapping(&mut column_mapping, "awake", &["awake", "awake_pct", "wake_pct"]);
        Self::add_mapping(
            &mut column_mapping,
            "sleep_disturbances",
            &["sleep_disturbances", "disturbances", "wake_ups", "awakenings"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "sleep_onset",
            &["sleep_onset", "bedtime", "sleep_start"],
        );
        Self::add_mapping(&mut column_mapping, "steps", &["steps", "step_count"]);
        Self::add_mapping(
            &mut column_mapping,
            "active_energy_kcal",
            &["active_energy_kcal", "active_energy", "active_kcal", "calories"],
        );

        Self::add_mapping(&mut column_mapping, "id", &["id", "workout_id"]);
        Self::add_mapping(&mut column_mapping, "start", &["start", "start_time", "started_at"]);
        Self::add_mapping(
            &mut column_mapping,
            "duration_sec",
            &["duration_sec", "duration", "duration_seconds", "elapsed_sec"],
        );
        Self::add_mapping(&mut column_mapping, "kind", &["kind", "type", "workout_type"]);
        Self::add_mapping(
            &mut column_mapping,
            "avg_hr",
            &["avg_hr", "average_hr", "avg_heart_rate", "heart_rate", "hr"],
        );
        Self::add_mapping(&mut column_mapping, "max_hr", &["max_hr", "max_heart_rate"]);
        Self::add_mapping(&mut column_mapping, "has_power", &["has_power", "power"]);
        Self::add_mapping(&mut column_mapping, "rpe", &["rpe", "srpe", "effort"]);
        Self::add_mapping(
            &mut column_mapping,
            "tss",
            &["tss", "training_stress_score", "load"],
        );

        Self { column_mapping }
    }

    fn add_mapping(mapping: &mut HashMap<String, String>, standard: &str, variations: &[&str]) {
        for variation in variations {
            mapping.insert(variation.to_lowercase(), standard.to_string());
        }
    }

    fn normalize_column_name(&self, name: &str) -> String {
        let normalized = name.trim().to_lowercase().replace([' ', '-'], "_");

        self.column_mapping
            .get(&normalized)
            .cloned()
            .unwrap_or(normalized)
    }

    fn parse_date(value: &str) -> Result<NaiveDate> {
        let formats = ["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y%m%d"];
        formats
            .iter()
            .find_map(|f| NaiveDate::parse_from_str(value, f).ok())
            .with_context(|| format!("Unable to parse date: {}", value))
    }

    fn parse_datetime(value: &str) -> Result<NaiveDateTime> {
        let formats = [
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M",
            "%Y-%m-%dT%H:%M",
            "%Y-%m-%dT%H:%M:%SZ",
        ];
        formats
            .iter()
            .find_map(|f| NaiveDateTime::parse_from_str(value, f).ok())
            .with_context(|| format!("Unable to parse datetime: {}", value))
    }

    fn parse_time(value: &str) -> Result<NaiveTime> {
        ["%H:%M:%S", "%H:%M"]
            .iter()
            .find_map(|f| NaiveTime::parse_from_str(value, f).ok())
            .with_context(|| format!("Unable to parse time: {}", value))
    }

    fn parse_bool(value: &str) -> bool {
        matches!(value.to_lowercase().as_str(), "true" | "yes" | "1" | "y")
    }

    fn header_index(&self, headers: &StringRecord) -> HashMap<String, usize> {
        headers
            .iter()
            .enumerate()
            .map(|(i, h)| (self.normalize_column_name(h), i))
            .collect()
    }

    pub fn import_samples_from_reader<R: std::io::Read>(&self, reader: R) -> Result<Vec<DailySample>> {
        let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let columns = self.header_index(rdr.headers()?);
        if !columns.contains_key("date") {
            anyhow::bail!("Missing required column: date");
        }

        let mut samples = Vec::new();
        for (line, record) in rdr.records().enumerate() {
            let record = record?;
            let row = Row {
                record: &record,
                columns: &columns,
            };
            let sample = Self::parse_sample(&row).with_context(|| format!("row {}", line + 2))?;
            samples.push(sample);
        }

        Ok(samples)
    }

    fn parse_sample(row: &Row<'_>) -> Result<DailySample> {
        let date = Self::parse_date(row.required("date")?)?;

        let stages = match (
            row.parse::<f64>("deep")?,
            row.parse::<f64>("rem")?,
            row.parse::<f64>("core")?,
            row.parse::<f64>("awake")?,
        ) {
            (Some(deep), Some(rem), core, awake) => Some(SleepStagePercentages {
                deep,
                rem,
                core: core.unwrap_or(0.0),
                awake: awake.unwrap_or(0.0),
            }),
            _ => None,
        };

        let sleep_duration_sec = match row.parse::<u32>("sleep_duration_sec")? {
            Some(sec) => Some(sec),
            None => row
                .parse::<f64>("sleep_hours")?
                .map(|h| (h * 3600.0).round().max(0.0) as u32),
        };

        Ok(DailySample {
            date,
            hrv_ms: row.parse("hrv_ms")?,
            rhr_bpm: row.parse("rhr_bpm")?,
            respiratory_rate: row.parse("respiratory_rate")?,
            sleep_duration_sec,
            time_in_bed_sec: row.parse("time_in_bed_sec")?,
            sleep_stages: stages,
            sleep_disturbances: row.parse("sleep_disturbances")?,
            sleep_onset: row.get("sleep_onset").map(Self::parse_time).transpose()?,
            steps: row.parse("steps")?,
            active_energy_kcal: row.parse("active_energy_kcal")?,
        })
    }

    pub fn import_workouts_from_reader<R: std::io::Read>(
        &self,
        reader: R,
    ) -> Result<Vec<WorkoutRecord>> {
        self.import_workouts_from_source(reader, "csv")
    }

    /// Read workouts, naming rows without an id after `source` and their row
    ///
    /// Generated ids stay stable when the same source is imported again and
    /// never collide with rows from a different source.
    pub fn import_workouts_from_source<R: std::io::Read>(
        &self,
        reader: R,
        source: &str,
    ) -> Result<Vec<WorkoutRecord>> {
        let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let columns = self.header_index(rdr.headers()?);
        for required in ["date", "duration_sec"] {
            if !columns.contains_key(required) {
                anyhow::bail!("Missing required column: {}", required);
            }
        }

        let mut workouts = Vec::new();
        for (line, record) in rdr.records().enumerate() {
            let record = record?;
            let row = Row {
                record: &record,
                columns: &columns,
            };
            let workout = Self::parse_workout(&row, source, line)
                .with_context(|| format!("row {}", line + 2))?;
            workouts.push(workout);
        }

        Ok(workouts)
    }

    fn parse_workout(row: &Row<'_>, source: &str, line: usize) -> Result<WorkoutRecord> {
        let date = Self::parse_date(row.required("date")?)?;
        let kind = match row.get("kind").map(str::to_lowercase).as_deref() {
            Some("strength") | Some("weights") => WorkoutKind::Strength,
            Some("mixed") | Some("crossfit") | Some("hiit") => WorkoutKind::Mixed,
            _ => WorkoutKind::Cardio,
        };

        Ok(WorkoutRecord {
            id: row
                .get("id")
                .map(str::to_string)
                .unwrap_or_else(|| format!("{}:{}-{}", source, date.format("%Y%m%d"), line + 1)),
            date,
            start: row.get("start").map(Self::parse_datetime).transpose()?,
            duration_sec: row
                .parse::<f64>("duration_sec")?
                .map(|d| d.round().max(0.0) as u32)
                .unwrap_or(0),
            kind,
            avg_hr: row.parse("avg_hr")?,
            max_hr: row.parse("max_hr")?,
            hr_samples: None,
            has_power: row.get("has_power").map(Self::parse_bool).unwrap_or(false),
            rpe: row.parse("rpe")?,
            training_stress_score: row.parse::<Decimal>("tss")?.unwrap_or(Decimal::ZERO),
        })
    }

    fn is_workout_file(&self, file_path: &Path) -> Result<bool> {
        let mut rdr = ReaderBuilder::new()
            .from_path(file_path)
            .with_context(|| format!("Failed to open {}", file_path.display()))?;
        let columns = self.header_index(rdr.headers()?);
        Ok(columns.contains_key("tss") || columns.contains_key("duration_sec"))
    }
}

/// A CSV record with its header lookup
struct Row<'a> {
    record: &'a StringRecord,
    columns: &'a HashMap<String, usize>,
}

impl<'a> Row<'a> {
    /// Non-empty field value
    fn get(&self, column: &str) -> Option<&'a str> {
        self.columns
            .get(column)
            .and_then(|i| self.record.get(*i))
            .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("na"))
    }

    fn required(&self, column: &str) -> Result<&'a str> {
        self.get(column)
            .with_context(|| format!("Missing value for {}", column))
    }

    fn parse<T>(&self, column: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(column)
            .map(|v| {
                v.parse::<T>()
                    .map_err(|e| anyhow::anyhow!("Invalid {} '{}': {}", column, v, e))
            })
            .transpose()
    }
}

impl ImportFormat for CsvImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false)
    }

    fn import_file(&self, file_path: &Path) -> Result<ImportedData> {
        let file = std::fs::File::open(file_path)
            .with_context(|| format!("Failed to open {}", file_path.display()))?;

        if self.is_workout_file(file_path)? {
            Ok(ImportedData {
                samples: Vec::new(),
                workouts: self
                    .import_workouts_from_source(file, &file_path.to_string_lossy())?,
            })
        } else {
            Ok(ImportedData {
                samples: self.import_samples_from_reader(file)?,
                workouts: Vec::new(),
            })
        }
    }

    fn get_format_name(&self) -> &'static str {
        "CSV"
    }
}
