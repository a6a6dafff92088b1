//! Route-corridor filtering and adaptive clustering of geotagged pincode records.
//!
//! This crate provides tools for:
//! - Cleaning raw `(lat, lon, pincode)` records
//! - Keeping only records inside a corridor around a straight route segment
//! - Optionally narrowing pincodes with an external advisor, falling back to all
//! - Standardized k-means clustering with an adaptive cluster count
//!
//! # Example
//!
//! ```no_run
//! use route_cluster::{run_pipeline, ComputeRequest, PipelineConfig, RawRecord, RouteSpec};
//!
//! let route = RouteSpec::new(28.7041, 77.1025, 28.4595, 77.0266);
//! let request = ComputeRequest::new(route, vec![RawRecord::new(28.60, 77.05, "110001")]);
//! let output = run_pipeline(&request, &PipelineConfig::default(), None).unwrap();
//! println!("{}", output.report.message);
//! ```

pub mod advisor;
pub mod cli;
pub mod config;
pub mod core;
pub mod pipeline;
pub mod processors;
pub mod visualization;

pub use config::{AdvisorConfig, ClusteringConfig, CorridorConfig, PipelineConfig, SamplingConfig};
pub use core::geo::RouteSpec;
pub use core::loaders::{ComputeRequest, GeoRecord, RawRecord};
pub use pipeline::{run_pipeline, PipelineError, PipelineOutput};
pub use processors::aggregate::{ClusterSummary, PipelineReport};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
