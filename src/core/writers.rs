//! Writers for pipeline results.
//!
//! - JSON report (the response payload)
//! - CSV of clustered points with their cluster label

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use thiserror::Error;

use super::loaders::GeoRecord;
use crate::processors::aggregate::PipelineReport;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error.
    #[error("JSON write error for '{path}': {source}")]
    JsonError {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// Mismatched array lengths.
    #[error("array length mismatch: points has {points_len} elements, labels has {labels_len} elements")]
    LengthMismatch { points_len: usize, labels_len: usize },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Creates a buffered writer for the given path.
fn create_buffered_writer(path: &Path) -> Result<BufWriter<File>> {
    ensure_parent_dirs(path)?;
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(BufWriter::new(file))
}

/// Write the pipeline report as pretty-printed JSON.
pub fn write_report_json(path: &Path, report: &PipelineReport) -> Result<()> {
    let mut writer = create_buffered_writer(path)?;
    let path_str = path.display().to_string();

    serde_json::to_writer_pretty(&mut writer, report).map_err(|e| WriteError::JsonError {
        path: path_str.clone(),
        source: e,
    })?;
    writeln!(writer).map_err(|e| WriteError::WriteFile {
        path: path_str.clone(),
        source: e,
    })?;
    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

/// Write clustered points with their labels to CSV.
///
/// Columns: `lat,lon,pincode,cluster`.
pub fn write_labels_csv(path: &Path, points: &[GeoRecord], labels: &[usize]) -> Result<()> {
    if points.len() != labels.len() {
        return Err(WriteError::LengthMismatch {
            points_len: points.len(),
            labels_len: labels.len(),
        });
    }

    let buf_writer = create_buffered_writer(path)?;
    let mut csv_writer = csv::Writer::from_writer(buf_writer);

    let path_str = path.display().to_string();

    csv_writer
        .write_record(["lat", "lon", "pincode", "cluster"])
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for (point, label) in points.iter().zip(labels.iter()) {
        csv_writer
            .write_record(&[
                format!("{:.6}", point.latitude),
                format!("{:.6}", point.longitude),
                point.pincode.clone(),
                label.to_string(),
            ])
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::aggregate::PipelineReport;
    use std::fs;
    use tempfile::tempdir;

    fn create_test_points() -> Vec<GeoRecord> {
        vec![
            GeoRecord::new(28.60, 77.05, "110001"),
            GeoRecord::new(28.55, 77.06, "110002"),
        ]
    }

    #[test]
    fn test_write_report_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("report.json");
        let report = PipelineReport::empty(4, 0, "no points found after filtering");

        write_report_json(&path, &report).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["clusters"], serde_json::json!([]));
        assert_eq!(value["cleanedCount"], 0);
        assert_eq!(value["removedCount"], 4);
        assert_eq!(value["message"], "no points found after filtering");
    }

    #[test]
    fn test_write_labels_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("labels.csv");

        write_labels_csv(&path, &create_test_points(), &[0, 1]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines[0], "lat,lon,pincode,cluster");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "28.600000,77.050000,110001,0");
        assert!(lines[2].ends_with(",110002,1"));
    }

    #[test]
    fn test_write_labels_csv_length_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("labels.csv");

        let result = write_labels_csv(&path, &create_test_points(), &[0]);

        match result.unwrap_err() {
            WriteError::LengthMismatch {
                points_len,
                labels_len,
            } => {
                assert_eq!(points_len, 2);
                assert_eq!(labels_len, 1);
            }
            _ => panic!("Expected LengthMismatch error"),
        }
        assert!(!path.exists());
    }
}
