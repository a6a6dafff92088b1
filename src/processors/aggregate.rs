//! Cluster summaries and the pipeline report.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::loaders::GeoRecord;

/// Errors raised when clustering output does not line up with its input.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("label count mismatch: {points} points but {labels} labels")]
    LabelCount { points: usize, labels: usize },

    #[error("label {label} out of range for k = {k}")]
    LabelOutOfRange { label: usize, k: usize },

    #[error("expected {k} centers, got {centers}")]
    CenterCount { k: usize, centers: usize },
}

/// Summary of one cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    pub cluster_id: usize,
    /// `[lat, lon]`
    pub center: [f64; 2],
    pub size: usize,
    pub samples: Vec<GeoRecord>,
}

/// Per-stage counts and parameters of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStats {
    pub initial_count: usize,
    pub cleaned_count: usize,
    pub in_bounding_box: usize,
    pub in_corridor: usize,
    pub sampled: usize,
    pub raw_used_points: usize,
    pub route_length_meters: f64,
    pub corridor_threshold_meters: f64,
    pub k: usize,
    pub k_reason: Option<String>,
    pub advisor_used: bool,
    pub inertia: Option<f64>,
}

/// Response payload for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineReport {
    pub clusters: Vec<ClusterSummary>,
    pub cleaned_count: usize,
    pub removed_count: usize,
    pub used_pincodes: Vec<String>,
    pub raw_used_points: usize,
    pub message: String,
    #[serde(default)]
    pub stats: PipelineStats,
}

impl PipelineReport {
    /// Report with no clusters, e.g. when nothing survived filtering.
    pub fn empty(initial_count: usize, cleaned_count: usize, message: impl Into<String>) -> Self {
        Self {
            clusters: Vec::new(),
            cleaned_count,
            removed_count: initial_count.saturating_sub(cleaned_count),
            used_pincodes: Vec::new(),
            raw_used_points: 0,
            message: message.into(),
            stats: PipelineStats {
                initial_count,
                cleaned_count,
                ..Default::default()
            },
        }
    }

    /// Total members across all clusters.
    pub fn clustered_points(&self) -> usize {
        self.clusters.iter().map(|c| c.size).sum()
    }
}

/// Build one summary per cluster index `0..k`, empty clusters included.
///
/// Members keep their input order; the first `samples_per_cluster` of them
/// are echoed as samples.
pub fn summarize_clusters(
    points: &[GeoRecord],
    labels: &[usize],
    centers: &[[f64; 2]],
    samples_per_cluster: usize,
) -> Result<Vec<ClusterSummary>, AggregateError> {
    if points.len() != labels.len() {
        return Err(AggregateError::LabelCount {
            points: points.len(),
            labels: labels.len(),
        });
    }

    let k = centers.len();
    let mut clusters: Vec<ClusterSummary> = centers
        .iter()
        .enumerate()
        .map(|(cluster_id, &center)| ClusterSummary {
            cluster_id,
            center,
            size: 0,
            samples: Vec::with_capacity(samples_per_cluster),
        })
        .collect();

    for (point, &label) in points.iter().zip(labels.iter()) {
        let cluster = clusters
            .get_mut(label)
            .ok_or(AggregateError::LabelOutOfRange { label, k })?;
        cluster.size += 1;
        if cluster.samples.len() < samples_per_cluster {
            cluster.samples.push(point.clone());
        }
    }

    for c in &clusters {
        log::info!(
            "Cluster {}: {} points, center: ({:.6}, {:.6})",
            c.cluster_id,
            c.size,
            c.center[0],
            c.center[1]
        );
    }

    Ok(clusters)
}
