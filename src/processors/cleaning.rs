//! Dataset cleaning: drop incomplete rows, normalize pincodes, deduplicate.

use std::collections::HashSet;

use crate::core::geo::is_valid_coordinate;
use crate::core::loaders::{GeoRecord, RawRecord};

/// Outcome of cleaning a raw record batch.
#[derive(Debug, Clone, Default)]
pub struct CleanedDataset {
    /// Surviving records in input order.
    pub records: Vec<GeoRecord>,
    /// Number of raw records received.
    pub initial_count: usize,
    /// Rows dropped for missing or out-of-range coordinates.
    pub missing_coordinates: usize,
    /// Rows dropped for an empty pincode.
    pub empty_pincodes: usize,
    /// Rows collapsed as exact duplicates.
    pub duplicates: usize,
}

impl CleanedDataset {
    #[inline]
    pub fn cleaned_count(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn removed_count(&self) -> usize {
        self.initial_count - self.records.len()
    }
}

/// Dedup key: coordinates by bit pattern (with -0.0 folded into 0.0) plus pincode.
fn dedup_key(record: &GeoRecord) -> (u64, u64, String) {
    let bits = |v: f64| if v == 0.0 { 0.0f64.to_bits() } else { v.to_bits() };
    (
        bits(record.latitude),
        bits(record.longitude),
        record.pincode.clone(),
    )
}

/// Clean a batch of raw records.
///
/// Rows lacking a finite, in-range latitude or longitude are dropped,
/// pincodes are re-typed as strings and whitespace-trimmed, rows whose
/// trimmed pincode is empty are dropped, and exact `(lat, lon, pincode)`
/// duplicates are collapsed to their first occurrence. Nothing here fails;
/// every exclusion is only counted.
pub fn clean_records(raw: &[RawRecord]) -> CleanedDataset {
    let mut out = CleanedDataset {
        records: Vec::with_capacity(raw.len()),
        initial_count: raw.len(),
        ..Default::default()
    };
    let mut seen: HashSet<(u64, u64, String)> = HashSet::with_capacity(raw.len());

    for row in raw {
        let (lat, lon) = match (row.lat, row.lon) {
            (Some(lat), Some(lon)) if is_valid_coordinate(lat, lon) => (lat, lon),
            _ => {
                out.missing_coordinates += 1;
                continue;
            }
        };

        let pincode = row
            .pincode
            .as_ref()
            .map(|p| p.to_text().trim().to_string())
            .unwrap_or_default();
        if pincode.is_empty() {
            out.empty_pincodes += 1;
            continue;
        }

        let record = GeoRecord::new(lat, lon, pincode);
        if !seen.insert(dedup_key(&record)) {
            out.duplicates += 1;
            continue;
        }

        out.records.push(record);
    }

    log::info!(
        "Cleaned {} -> {} records (missing coords: {}, empty pincode: {}, duplicates: {})",
        out.initial_count,
        out.records.len(),
        out.missing_coordinates,
        out.empty_pincodes,
        out.duplicates
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loaders::RawPincode;

    #[test]
    fn test_clean_drops_missing_coordinates() {
        let raw = vec![
            RawRecord::new(28.6, 77.05, "110001"),
            RawRecord {
                lat: None,
                lon: Some(77.0),
                pincode: Some("110002".into()),
            },
            RawRecord {
                lat: Some(28.6),
                lon: None,
                pincode: Some("110003".into()),
            },
        ];
        let cleaned = clean_records(&raw);
        assert_eq!(cleaned.cleaned_count(), 1);
        assert_eq!(cleaned.missing_coordinates, 2);
    }

    #[test]
    fn test_clean_drops_out_of_range_and_nan() {
        let raw = vec![
            RawRecord::new(f64::NAN, 77.0, "1"),
            RawRecord::new(91.0, 77.0, "2"),
            RawRecord::new(28.0, 181.0, "3"),
        ];
        let cleaned = clean_records(&raw);
        assert!(cleaned.records.is_empty());
        assert_eq!(cleaned.removed_count(), 3);
    }

    #[test]
    fn test_clean_trims_and_drops_empty_pincodes() {
        let raw = vec![
            RawRecord::new(28.6, 77.05, "  110001 "),
            RawRecord::new(28.5, 77.05, "   "),
            RawRecord {
                lat: Some(28.4),
                lon: Some(77.0),
                pincode: None,
            },
        ];
        let cleaned = clean_records(&raw);
        assert_eq!(cleaned.records.len(), 1);
        assert_eq!(cleaned.records[0].pincode, "110001");
        assert_eq!(cleaned.empty_pincodes, 2);
    }

    #[test]
    fn test_clean_retypes_numeric_pincodes() {
        let raw = vec![RawRecord {
            lat: Some(12.97),
            lon: Some(77.59),
            pincode: Some(RawPincode::Integer(560001)),
        }];
        let cleaned = clean_records(&raw);
        assert_eq!(cleaned.records[0].pincode, "560001");
    }

    #[test]
    fn test_clean_collapses_duplicates_after_trim() {
        let raw = vec![
            RawRecord::new(28.6, 77.05, "110001"),
            RawRecord::new(28.6, 77.05, "110001 "),
            RawRecord::new(28.6, 77.05, "110002"),
            RawRecord::new(28.6, 77.05, "110001"),
        ];
        let cleaned = clean_records(&raw);
        assert_eq!(cleaned.records.len(), 2);
        assert_eq!(cleaned.duplicates, 2);
        assert_eq!(cleaned.records[0].pincode, "110001");
        assert_eq!(cleaned.records[1].pincode, "110002");
    }

    #[test]
    fn test_clean_counts_add_up() {
        let raw = vec![
            RawRecord::new(28.6, 77.05, "110001"),
            RawRecord::new(28.6, 77.05, "110001"),
            RawRecord::new(28.6, 77.05, ""),
            RawRecord::default(),
        ];
        let cleaned = clean_records(&raw);
        assert_eq!(cleaned.cleaned_count() + cleaned.removed_count(), raw.len());
        assert_eq!(
            cleaned.missing_coordinates + cleaned.empty_pincodes + cleaned.duplicates,
            cleaned.removed_count()
        );
    }

    #[test]
    fn test_clean_empty_input() {
        let cleaned = clean_records(&[]);
        assert_eq!(cleaned.initial_count, 0);
        assert_eq!(cleaned.cleaned_count(), 0);
    }
}
