//! Adaptive k-means clustering of geographic points.
//!
//! This module implements:
//! - Cluster-count selection (caller-supplied or `round(sqrt(n / d))`, capped)
//! - Per-axis standardization so latitude and longitude weigh equally
//! - Lloyd's k-means with k-means++ seeding from a `ChaCha8Rng`
//! - Multiple seeded restarts run in parallel with `rayon`; lowest inertia wins
//!
//! Every restart derives its seed from the configured base seed, so results
//! are identical across runs and independent of thread scheduling.
//!
//! # Example
//!
//! ```no_run
//! use route_cluster::config::ClusteringConfig;
//! use route_cluster::processors::clustering::kmeans_best_of;
//!
//! let points = vec![[0.0, 0.0], [0.1, 0.0], [5.0, 5.0], [5.1, 5.0]];
//! let result = kmeans_best_of(&points, 2, &ClusteringConfig::default());
//! assert_eq!(result.labels.len(), 4);
//! ```

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::ClusteringConfig;
use crate::core::loaders::GeoRecord;
use crate::core::transforms::StandardScaler;

/// Why a particular cluster count was used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum KReason {
    #[serde(rename = "requested")]
    Requested,
    #[serde(rename = "requested, clamped to point count")]
    RequestedClamped,
    #[serde(rename = "auto: sqrt(n/2)")]
    Auto,
}

impl std::fmt::Display for KReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            KReason::Requested => "requested",
            KReason::RequestedClamped => "requested, clamped to point count",
            KReason::Auto => "auto: sqrt(n/2)",
        };
        f.write_str(s)
    }
}

/// Pick the number of clusters for `n` points.
///
/// A requested `k` is clamped to `[1, n]`. Otherwise
/// `k = clamp(round(sqrt(n / points_per_cluster)), 1, max_auto_k)`, then
/// capped at `n`. Returns 0 only when `n` is 0.
pub fn choose_k(n: usize, requested: Option<usize>, config: &ClusteringConfig) -> (usize, KReason) {
    if n == 0 {
        return (0, requested.map_or(KReason::Auto, |_| KReason::RequestedClamped));
    }

    match requested {
        Some(req) => {
            let k = req.clamp(1, n);
            let reason = if k == req {
                KReason::Requested
            } else {
                KReason::RequestedClamped
            };
            (k, reason)
        }
        None => {
            let auto = (n as f64 / config.points_per_cluster).sqrt().round() as usize;
            (auto.clamp(1, config.max_auto_k.max(1)).min(n), KReason::Auto)
        }
    }
}

/// Result of a k-means run.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansResult<const D: usize> {
    /// Cluster index in `0..k` for every input point.
    pub labels: Vec<usize>,
    /// One centroid per cluster.
    pub centroids: Vec<[f64; D]>,
    /// Sum of squared distances of points to their centroid.
    pub inertia: f64,
    /// Lloyd iterations performed.
    pub iterations: usize,
}

#[inline]
fn distance_sq<const D: usize>(a: &[f64; D], b: &[f64; D]) -> f64 {
    let mut acc = 0.0;
    for d in 0..D {
        let diff = a[d] - b[d];
        acc += diff * diff;
    }
    acc
}

/// Index of the nearest centroid; ties go to the lowest index.
#[inline]
fn nearest<const D: usize>(point: &[f64; D], centroids: &[[f64; D]]) -> (usize, f64) {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (c, center) in centroids.iter().enumerate() {
        let dist = distance_sq(point, center);
        if dist < best_dist {
            best_dist = dist;
            best = c;
        }
    }
    (best, best_dist)
}

/// k-means++ seeding: each next center is drawn with probability
/// proportional to its squared distance from the closest chosen center.
fn init_plus_plus<const D: usize>(points: &[[f64; D]], k: usize, rng: &mut ChaCha8Rng) -> Vec<[f64; D]> {
    let n = points.len();
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..n)]);

    let mut closest: Vec<f64> = points.iter().map(|p| distance_sq(p, &centroids[0])).collect();

    while centroids.len() < k {
        let total: f64 = closest.iter().sum();

        let next = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            let mut chosen = n - 1;
            for (i, &w) in closest.iter().enumerate() {
                if target < w {
                    chosen = i;
                    break;
                }
                target -= w;
            }
            chosen
        } else {
            // All remaining points coincide with a center
            rng.gen_range(0..n)
        };

        let center = points[next];
        for (i, p) in points.iter().enumerate() {
            let d = distance_sq(p, &center);
            if d < closest[i] {
                closest[i] = d;
            }
        }
        centroids.push(center);
    }

    centroids
}

/// Single k-means run (Lloyd's algorithm) with seeded k-means++ initialization.
///
/// Empty clusters keep their previous centroid. Iteration stops when no
/// assignment changes or no centroid moves more than `tolerance`.
///
/// # Panics
///
/// Panics if `points` is empty or `k` is 0 or greater than `points.len()`.
pub fn kmeans<const D: usize>(
    points: &[[f64; D]],
    k: usize,
    max_iterations: usize,
    tolerance: f64,
    seed: u64,
) -> KMeansResult<D> {
    let n = points.len();
    assert!(n > 0, "kmeans needs at least one point");
    assert!(k >= 1 && k <= n, "invalid k = {} for {} points", k, n);

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut centroids = init_plus_plus(points, k, &mut rng);
    let mut labels = vec![usize::MAX; n];
    let mut iterations = 0;
    let tol_sq = tolerance * tolerance;

    for _ in 0..max_iterations {
        iterations += 1;

        // Assignment step
        let mut changed = false;
        for (i, p) in points.iter().enumerate() {
            let (best, _) = nearest(p, &centroids);
            if labels[i] != best {
                labels[i] = best;
                changed = true;
            }
        }

        // Update step
        let mut sums = vec![[0.0; D]; k];
        let mut counts = vec![0usize; k];
        for (p, &c) in points.iter().zip(labels.iter()) {
            counts[c] += 1;
            for d in 0..D {
                sums[c][d] += p[d];
            }
        }

        let mut max_shift_sq: f64 = 0.0;
        for c in 0..k {
            if counts[c] == 0 {
                continue;
            }
            let mut updated = [0.0; D];
            for d in 0..D {
                updated[d] = sums[c][d] / counts[c] as f64;
            }
            max_shift_sq = max_shift_sq.max(distance_sq(&centroids[c], &updated));
            centroids[c] = updated;
        }

        if !changed || max_shift_sq <= tol_sq {
            break;
        }
    }

    // Final assignment against the final centroids
    let mut inertia = 0.0;
    for (i, p) in points.iter().enumerate() {
        let (best, dist) = nearest(p, &centroids);
        labels[i] = best;
        inertia += dist;
    }

    KMeansResult {
        labels,
        centroids,
        inertia,
        iterations,
    }
}

/// Run `config.n_init` seeded restarts in parallel and keep the lowest-inertia
/// result (earliest restart on ties).
pub fn kmeans_best_of<const D: usize>(
    points: &[[f64; D]],
    k: usize,
    config: &ClusteringConfig,
) -> KMeansResult<D> {
    let runs: Vec<KMeansResult<D>> = (0..config.n_init.max(1))
        .into_par_iter()
        .map(|restart| {
            kmeans(
                points,
                k,
                config.max_iterations,
                config.tolerance,
                config.seed.wrapping_add(restart as u64),
            )
        })
        .collect();

    let mut best: Option<KMeansResult<D>> = None;
    for run in runs {
        let better = match &best {
            Some(b) => run.inertia < b.inertia,
            None => true,
        };
        if better {
            best = Some(run);
        }
    }

    // n_init >= 1 guarantees at least one run
    best.unwrap_or_else(|| kmeans(points, k, config.max_iterations, config.tolerance, config.seed))
}

/// Clustering of geographic records with centers in native coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusteringOutcome {
    pub k: usize,
    pub k_reason: KReason,
    /// Cluster index for every input record.
    pub labels: Vec<usize>,
    /// Cluster centers as `[lat, lon]`.
    pub centers: Vec<[f64; 2]>,
    /// Inertia in standardized units.
    pub inertia: f64,
}

/// Cluster records on standardized `(lat, lon)`.
///
/// An empty input yields `k = 0` with no labels or centers.
pub fn cluster_records(
    records: &[GeoRecord],
    requested_k: Option<usize>,
    config: &ClusteringConfig,
) -> ClusteringOutcome {
    let (k, k_reason) = choose_k(records.len(), requested_k, config);

    if k == 0 {
        return ClusteringOutcome {
            k,
            k_reason,
            labels: Vec::new(),
            centers: Vec::new(),
            inertia: 0.0,
        };
    }

    log::info!(
        "Using k={} clusters for {} points ({})",
        k,
        records.len(),
        k_reason
    );

    let coords: Vec<[f64; 2]> = records.iter().map(GeoRecord::coords).collect();
    let scaler = StandardScaler::fit(&coords);
    let scaled = scaler.transform(&coords);
    log::debug!(
        "Scaler mean={:?} scale={:?}",
        scaler.mean,
        scaler.scale
    );

    let result = kmeans_best_of(&scaled, k, config);
    let centers = scaler.inverse_transform(&result.centroids);
    log::info!(
        "KMeans finished: inertia={:.4}, iterations={}",
        result.inertia,
        result.iterations
    );

    ClusteringOutcome {
        k,
        k_reason,
        labels: result.labels,
        centers,
        inertia: result.inertia,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> Vec<[f64; 2]> {
        vec![
            [0.0, 0.0],
            [0.1, 0.0],
            [0.0, 0.1],
            [0.1, 0.1],
            [10.0, 10.0],
            [10.1, 10.0],
            [10.0, 10.1],
            [10.1, 10.1],
        ]
    }

    #[test]
    fn test_choose_k_auto() {
        let config = ClusteringConfig::default();
        assert_eq!(choose_k(1, None, &config), (1, KReason::Auto));
        assert_eq!(choose_k(2, None, &config).0, 1);
        assert_eq!(choose_k(8, None, &config).0, 2);
        assert_eq!(choose_k(50, None, &config).0, 5);
        assert_eq!(choose_k(2000, None, &config).0, 12);
    }

    #[test]
    fn test_choose_k_requested() {
        let config = ClusteringConfig::default();
        assert_eq!(choose_k(10, Some(3), &config), (3, KReason::Requested));
        assert_eq!(choose_k(2, Some(5), &config), (2, KReason::RequestedClamped));
        assert_eq!(choose_k(10, Some(0), &config), (1, KReason::RequestedClamped));
        // A requested k is not bounded by the auto cap
        assert_eq!(choose_k(100, Some(20), &config), (20, KReason::Requested));
    }

    #[test]
    fn test_choose_k_empty() {
        let config = ClusteringConfig::default();
        assert_eq!(choose_k(0, None, &config).0, 0);
        assert_eq!(choose_k(0, Some(4), &config).0, 0);
    }

    #[test]
    fn test_kmeans_two_blobs() {
        let points = two_blobs();
        let result = kmeans(&points, 2, 100, 1e-4, 42);

        assert_eq!(result.labels.len(), 8);
        assert_eq!(result.centroids.len(), 2);
        assert!(result.labels[..4].iter().all(|&l| l == result.labels[0]));
        assert!(result.labels[4..].iter().all(|&l| l == result.labels[4]));
        assert_ne!(result.labels[0], result.labels[4]);
        assert!(result.inertia < 0.1);
    }

    #[test]
    fn test_kmeans_single_cluster_is_mean() {
        let points = vec![[0.0, 0.0], [2.0, 0.0], [0.0, 2.0], [2.0, 2.0]];
        let result = kmeans(&points, 1, 100, 1e-4, 1);
        assert_eq!(result.labels, vec![0, 0, 0, 0]);
        assert!((result.centroids[0][0] - 1.0).abs() < 1e-12);
        assert!((result.centroids[0][1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_kmeans_identical_points_allows_empty_clusters() {
        let points = vec![[1.0, 1.0]; 5];
        let result = kmeans(&points, 3, 100, 1e-4, 42);

        assert_eq!(result.centroids.len(), 3);
        assert_eq!(result.labels.len(), 5);
        assert!(result.labels.iter().all(|&l| l < 3));
        assert_eq!(result.inertia, 0.0);
    }

    #[test]
    #[should_panic]
    fn test_kmeans_invalid_k() {
        let _ = kmeans(&[[0.0, 0.0]], 2, 10, 1e-4, 0);
    }

    #[test]
    fn test_best_of_deterministic() {
        let points: Vec<[f64; 2]> = (0..200)
            .map(|i| {
                let t = i as f64;
                [(t * 0.37).sin() * 3.0, (t * 0.11).cos() * 2.0]
            })
            .collect();
        let config = ClusteringConfig::default();

        let a = kmeans_best_of(&points, 6, &config);
        let b = kmeans_best_of(&points, 6, &config);
        assert_eq!(a, b);
    }

    #[test]
    fn test_best_of_not_worse_than_any_restart() {
        let points = two_blobs();
        let config = ClusteringConfig {
            n_init: 5,
            ..Default::default()
        };
        let best = kmeans_best_of(&points, 3, &config);

        for r in 0..5 {
            let single = kmeans(
                &points,
                3,
                config.max_iterations,
                config.tolerance,
                config.seed + r,
            );
            assert!(best.inertia <= single.inertia);
        }
    }

    #[test]
    fn test_cluster_records_native_centers() {
        let records = vec![
            GeoRecord::new(28.60, 77.05, "110001"),
            GeoRecord::new(28.61, 77.05, "110001"),
            GeoRecord::new(28.46, 77.03, "122001"),
            GeoRecord::new(28.47, 77.03, "122001"),
        ];
        let outcome = cluster_records(&records, Some(2), &ClusteringConfig::default());

        assert_eq!(outcome.k, 2);
        assert_eq!(outcome.labels.len(), 4);
        assert_eq!(outcome.labels[0], outcome.labels[1]);
        assert_eq!(outcome.labels[2], outcome.labels[3]);
        assert_ne!(outcome.labels[0], outcome.labels[2]);

        let north = outcome.centers[outcome.labels[0]];
        assert!((north[0] - 28.605).abs() < 1e-9);
        assert!((north[1] - 77.05).abs() < 1e-9);
    }

    #[test]
    fn test_cluster_records_empty() {
        let outcome = cluster_records(&[], None, &ClusteringConfig::default());
        assert_eq!(outcome.k, 0);
        assert!(outcome.labels.is_empty());
        assert!(outcome.centers.is_empty());
    }
}
