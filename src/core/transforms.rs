//! Point-set transforms: seeded subsampling and per-axis standardization.

use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Randomly subsample a slice down to `max_points` items.
///
/// If the slice has no more than `max_points` items, or no cap is given, the
/// items are returned unchanged. Otherwise exactly `max_points` items are
/// drawn uniformly without replacement from a generator seeded with `seed`,
/// and returned in their original relative order so downstream "first N"
/// selections stay stable.
pub fn subsample<T: Clone>(items: &[T], max_points: Option<usize>, seed: u64) -> Vec<T> {
    let n = items.len();

    let max_points = match max_points {
        Some(m) if m < n => m,
        _ => return items.to_vec(),
    };

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut indices = index::sample(&mut rng, n, max_points).into_vec();

    // Sort indices to preserve input order
    indices.sort_unstable();

    indices.iter().map(|&idx| items[idx].clone()).collect()
}

/// Per-axis standardization to zero mean and unit variance.
///
/// Axes with zero variance keep a scale of 1 so they map to 0 rather than
/// dividing by zero.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler<const D: usize> {
    pub mean: [f64; D],
    pub scale: [f64; D],
}

impl<const D: usize> StandardScaler<D> {
    /// Fit mean and population standard deviation per axis.
    pub fn fit(points: &[[f64; D]]) -> Self {
        let mut mean = [0.0; D];
        let mut scale = [1.0; D];

        if points.is_empty() {
            return Self { mean, scale };
        }

        let n = points.len() as f64;
        for p in points {
            for d in 0..D {
                mean[d] += p[d];
            }
        }
        for m in mean.iter_mut() {
            *m /= n;
        }

        let mut var = [0.0; D];
        for p in points {
            for d in 0..D {
                let diff = p[d] - mean[d];
                var[d] += diff * diff;
            }
        }
        for d in 0..D {
            let std = (var[d] / n).sqrt();
            scale[d] = if std > f64::EPSILON * mean[d].abs().max(1.0) {
                std
            } else {
                1.0
            };
        }

        Self { mean, scale }
    }

    pub fn transform(&self, points: &[[f64; D]]) -> Vec<[f64; D]> {
        points
            .iter()
            .map(|p| {
                let mut out = [0.0; D];
                for d in 0..D {
                    out[d] = (p[d] - self.mean[d]) / self.scale[d];
                }
                out
            })
            .collect()
    }

    pub fn inverse_transform(&self, points: &[[f64; D]]) -> Vec<[f64; D]> {
        points
            .iter()
            .map(|p| {
                let mut out = [0.0; D];
                for d in 0..D {
                    out[d] = p[d] * self.scale[d] + self.mean[d];
                }
                out
            })
            .collect()
    }
}
