use crate::error::{ImportExportError, Result};
use std::io::Write;
use std::path::Path;

/// Export any serializable data structure to pretty-printed JSON
pub fn export_json<T, P>(data: &T, output_path: P) -> Result<()>
where
    T: serde::Serialize + ?Sized,
    P: AsRef<Path>,
{
    let json_data =
        serde_json::to_string_pretty(data).map_err(|e| ImportExportError::ExportFailed {
            path: output_path.as_ref().to_path_buf(),
            reason: e.to_string(),
        })?;

    let mut file = std::fs::File::create(output_path)?;
    file.write_all(json_data.as_bytes())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::tests::score;
    use crate::export::{DateRange, ExportManager};
    use crate::models::DailyScore;
    use chrono::NaiveDate;
    use tempfile::NamedTempFile;

    #[test]
    fn test_export_report() {
        let date = NaiveDate::from_ymd_opt(2024, 9, 2).unwrap();
        let report = ExportManager::new().generate_report(
            &[score(date, Some(72), 65.0)],
            &DateRange::default(),
            None,
            None,
        );

        let temp_file = NamedTempFile::new().unwrap();
        export_json(&report, temp_file.path()).unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.contains("\"days\": 1"));
        assert!(content.contains("\"recovery\": 72"));
        assert!(content.contains("\"tsb\": -5.0"));
    }

    #[test]
    fn test_scores_round_trip_through_file() {
        let date = NaiveDate::from_ymd_opt(2024, 9, 2).unwrap();
        let scores = vec![score(date, None, 12.5)];

        let temp_file = NamedTempFile::new().unwrap();
        export_json(&scores, temp_file.path()).unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        let back: Vec<DailyScore> = serde_json::from_str(&content).unwrap();
        assert_eq!(back, scores);
    }
}
