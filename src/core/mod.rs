//! Core data types, geometry and I/O operations.

pub mod geo;
pub mod loaders;
pub mod transforms;
pub mod writers;

pub use geo::{distance_to_segment, great_circle_distance, BoundingBox, RouteSpec};
pub use loaders::{ComputeRequest, GeoRecord, RawPincode, RawRecord};
pub use writers::{write_labels_csv, write_report_json, WriteError};
