//! End-to-end route clustering: clean, filter, sample, select, cluster, report.
//!
//! Each stage takes the previous stage's output by reference and produces a
//! new collection, so the counts reported at the end describe the untouched
//! input. Randomness comes only from the seeds in [`PipelineConfig`].

use thiserror::Error;

use crate::advisor::PincodeAdvisor;
use crate::config::{ConfigError, PipelineConfig};
use crate::core::geo::RouteSpec;
use crate::core::loaders::{ComputeRequest, GeoRecord};
use crate::core::transforms::subsample;
use crate::processors::aggregate::{summarize_clusters, AggregateError, PipelineReport, PipelineStats};
use crate::processors::cleaning::clean_records;
use crate::processors::clustering::cluster_records;
use crate::processors::filtering::{filter_corridor, CorridorRecord};
use crate::processors::pincodes::{select_pincodes, SelectionSource};

/// Message used when nothing is left to cluster.
pub const NO_POINTS_MESSAGE: &str = "No points found after filtering";

/// Unexpected failures; anticipated edge cases never produce one.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid route coordinates: {0:?}")]
    InvalidRoute(RouteSpec),

    #[error("invalid request parameter: {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("inconsistent clustering output: {0}")]
    Aggregate(#[from] AggregateError),
}

/// Result type for pipeline runs.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Report plus the labelled points behind it.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub report: PipelineReport,
    /// Points handed to the clustering stage, in input order.
    pub points: Vec<GeoRecord>,
    /// Cluster label for each entry of `points`.
    pub labels: Vec<usize>,
    /// Cluster centers as `[lat, lon]`.
    pub centers: Vec<[f64; 2]>,
}

/// Run the whole pipeline for one request.
///
/// `advisor` is optional; without it every pincode in the corridor is kept.
///
/// # Errors
///
/// Fails only for an invalid configuration, non-finite or out-of-range route
/// coordinates, a zero `maxPoints`, or an internal inconsistency between
/// clustering output and its input.
pub fn run_pipeline(
    request: &ComputeRequest,
    config: &PipelineConfig,
    advisor: Option<&dyn PincodeAdvisor>,
) -> Result<PipelineOutput> {
    config.validate()?;

    let route = request.route();
    if !route.is_valid() {
        return Err(PipelineError::InvalidRoute(route));
    }
    let max_points = request.max_points_or(config.sampling.max_points);
    if max_points == Some(0) {
        return Err(PipelineError::InvalidParameter(
            "maxPoints must be at least 1".to_string(),
        ));
    }

    log::info!(
        "Starting route clustering with {} records",
        request.records.len()
    );
    log::info!(
        "Route: ({}, {}) -> ({}, {})",
        route.start_lat,
        route.start_lon,
        route.end_lat,
        route.end_lon
    );
    log::debug!(
        "Parameters: k={:?}, max_points={:?}",
        request.k,
        max_points
    );

    // Clean
    let cleaned = clean_records(&request.records);

    // Corridor
    let corridor = filter_corridor(&cleaned.records, &route, &config.corridor);

    // Sample
    let sampled = subsample(&corridor.records, max_points, config.sampling.seed);
    if sampled.len() < corridor.records.len() {
        log::info!(
            "Sampled down to {} records (max_points={:?})",
            sampled.len(),
            max_points
        );
    }
    let sampled: Vec<GeoRecord> = sampled.into_iter().map(|c: CorridorRecord| c.record).collect();

    // Select pincodes
    let selection = select_pincodes(&sampled, &route, advisor, config.advisor.max_listing);
    let used_pincodes: Vec<String> = selection.pincodes.iter().cloned().collect();
    let raw_used_points = selection.records.len();

    let mut stats = PipelineStats {
        initial_count: cleaned.initial_count,
        cleaned_count: cleaned.cleaned_count(),
        in_bounding_box: corridor.in_bounding_box,
        in_corridor: corridor.records.len(),
        sampled: sampled.len(),
        raw_used_points,
        route_length_meters: corridor.route_length_m,
        corridor_threshold_meters: corridor.threshold_m,
        advisor_used: selection.source == SelectionSource::Advisor,
        ..Default::default()
    };

    if selection.records.is_empty() {
        log::warn!("No coordinates available for clustering");
        let mut report =
            PipelineReport::empty(cleaned.initial_count, cleaned.cleaned_count(), NO_POINTS_MESSAGE);
        report.used_pincodes = used_pincodes;
        report.stats = stats;
        return Ok(PipelineOutput {
            report,
            points: Vec::new(),
            labels: Vec::new(),
            centers: Vec::new(),
        });
    }

    // Cluster
    let outcome = cluster_records(&selection.records, request.k, &config.clustering);
    if outcome.centers.len() != outcome.k {
        return Err(AggregateError::CenterCount {
            k: outcome.k,
            centers: outcome.centers.len(),
        }
        .into());
    }

    // Aggregate
    let clusters = summarize_clusters(
        &selection.records,
        &outcome.labels,
        &outcome.centers,
        config.report.samples_per_cluster,
    )?;

    stats.k = outcome.k;
    stats.k_reason = Some(outcome.k_reason.to_string());
    stats.inertia = Some(outcome.inertia);

    let message = format!(
        "kmeans_k={}, route_length_meters={}",
        outcome.k, corridor.route_length_m as i64
    );

    let report = PipelineReport {
        clusters,
        cleaned_count: cleaned.cleaned_count(),
        removed_count: cleaned.removed_count(),
        used_pincodes,
        raw_used_points,
        message,
        stats,
    };

    log::info!(
        "Report prepared: {} clusters, {} clustered points",
        report.clusters.len(),
        report.clustered_points()
    );

    Ok(PipelineOutput {
        report,
        points: selection.records,
        labels: outcome.labels,
        centers: outcome.centers,
    })
}
