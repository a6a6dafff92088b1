//! Record types and loaders for compute requests.
//!
//! This module provides:
//! - The raw and cleaned record types flowing through the pipeline
//! - A JSON request loader accepting both current and legacy field names
//! - A CSV record loader with case-insensitive column detection

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::geo::RouteSpec;

/// Errors that can occur during loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("Missing required columns: {0}")]
    MissingColumns(String),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Pincode as it arrives on the wire: text or a bare number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPincode {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl RawPincode {
    /// Render as the string form used everywhere downstream.
    pub fn to_text(&self) -> String {
        match self {
            RawPincode::Text(s) => s.clone(),
            RawPincode::Integer(n) => n.to_string(),
            RawPincode::Float(f) if f.fract() == 0.0 && f.is_finite() => format!("{}", *f as i64),
            RawPincode::Float(f) => f.to_string(),
        }
    }
}

impl From<&str> for RawPincode {
    fn from(s: &str) -> Self {
        RawPincode::Text(s.to_string())
    }
}

/// One input row before cleaning. Any field may be missing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default, alias = "latitude")]
    pub lat: Option<f64>,
    #[serde(default, alias = "lng", alias = "longitude")]
    pub lon: Option<f64>,
    #[serde(default, alias = "pin")]
    pub pincode: Option<RawPincode>,
}

impl RawRecord {
    pub fn new(lat: f64, lon: f64, pincode: &str) -> Self {
        Self {
            lat: Some(lat),
            lon: Some(lon),
            pincode: Some(RawPincode::from(pincode)),
        }
    }
}

/// A cleaned, immutable geotagged record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoRecord {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
    pub pincode: String,
}

impl GeoRecord {
    pub fn new(latitude: f64, longitude: f64, pincode: impl Into<String>) -> Self {
        Self {
            latitude,
            longitude,
            pincode: pincode.into(),
        }
    }

    /// Coordinates as `[lat, lon]`.
    #[inline]
    pub fn coords(&self) -> [f64; 2] {
        [self.latitude, self.longitude]
    }
}

/// Keeps an explicit `null` distinct from an absent field.
fn deserialize_present<'de, D>(deserializer: D) -> std::result::Result<Option<Option<usize>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<usize>::deserialize(deserializer).map(Some)
}

/// A compute request: route endpoints, records and optional overrides.
///
/// `maxPoints` is three-state: absent (`None`) falls back to the configured
/// sampling cap, an explicit `null` (`Some(None)`) disables the cap, and a
/// number (`Some(Some(n))`) is used as given.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeRequest {
    #[serde(alias = "startingLat")]
    pub start_lat: f64,
    #[serde(alias = "startingLong", alias = "startLong")]
    pub start_lon: f64,
    #[serde(alias = "endingLat")]
    pub end_lat: f64,
    #[serde(alias = "endingLong", alias = "endLong")]
    pub end_lon: f64,
    #[serde(default)]
    pub records: Vec<RawRecord>,
    #[serde(default)]
    pub k: Option<usize>,
    #[serde(
        default,
        alias = "max_points",
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_points: Option<Option<usize>>,
}

impl ComputeRequest {
    pub fn new(route: RouteSpec, records: Vec<RawRecord>) -> Self {
        Self {
            start_lat: route.start_lat,
            start_lon: route.start_lon,
            end_lat: route.end_lat,
            end_lon: route.end_lon,
            records,
            k: None,
            max_points: None,
        }
    }

    /// Sampling cap for this request, with `default` used when none was given.
    pub fn max_points_or(&self, default: usize) -> Option<usize> {
        self.max_points.unwrap_or(Some(default))
    }

    pub fn route(&self) -> RouteSpec {
        RouteSpec::new(self.start_lat, self.start_lon, self.end_lat, self.end_lon)
    }
}

/// Load a compute request from a JSON file.
pub fn load_request_json<P: AsRef<Path>>(path: P) -> Result<ComputeRequest> {
    let file = File::open(path.as_ref())?;
    let request = serde_json::from_reader(BufReader::new(file))?;
    Ok(request)
}

/// Load raw records from a CSV file.
///
/// Headers are matched case-insensitively: `lat`/`latitude`, `lon`/`lng`/
/// `longitude` and `pincode`/`pin`. Cells that fail to parse become missing
/// values so the cleaner can drop them; the pincode cell is kept verbatim so
/// leading zeros survive.
///
/// # Errors
///
/// Returns an error if the file cannot be read, lacks a coordinate column,
/// or contains no data rows.
pub fn load_records_csv<P: AsRef<Path>>(path: P) -> Result<Vec<RawRecord>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    let col_map: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| (name.to_lowercase(), i))
        .collect();

    let find = |names: &[&str]| names.iter().find_map(|n| col_map.get(*n).copied());

    let lat_idx = find(&["lat", "latitude"]);
    let lon_idx = find(&["lon", "lng", "long", "longitude"]);
    let pin_idx = find(&["pincode", "pin", "postal_code", "zip"]);

    let (lat_idx, lon_idx) = match (lat_idx, lon_idx) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(LoaderError::MissingColumns(format!(
                "expected lat/lon columns in {}, found [{}]",
                path.display(),
                headers.iter().collect::<Vec<_>>().join(", ")
            )))
        }
    };

    let mut records = Vec::new();

    for result in reader.records() {
        let row = result?;

        let lat: Option<f64> = row.get(lat_idx).and_then(|s| s.trim().parse().ok());
        let lon: Option<f64> = row.get(lon_idx).and_then(|s| s.trim().parse().ok());
        let pincode = pin_idx
            .and_then(|i| row.get(i))
            .map(|s| RawPincode::Text(s.to_string()));

        records.push(RawRecord { lat, lon, pincode });
    }

    if records.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    Ok(records)
}
