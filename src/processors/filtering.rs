//! Route-corridor filtering.
//!
//! Two stages, cheap first: an O(1) bounding-box reject, then the
//! point-to-segment distance test against the corridor half-width. The
//! distance stage runs in parallel with rayon; output order matches input order.

use rayon::prelude::*;
use serde::Serialize;

use crate::config::CorridorConfig;
use crate::core::geo::RouteSpec;
use crate::core::loaders::GeoRecord;

/// A record inside the corridor, annotated with its distance to the route.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorridorRecord {
    #[serde(flatten)]
    pub record: GeoRecord,
    pub distance_to_route_m: f64,
}

/// Result of corridor filtering with per-stage counts.
#[derive(Debug, Clone, Default)]
pub struct CorridorFilterResult {
    /// Records inside the corridor, in input order.
    pub records: Vec<CorridorRecord>,
    /// Records that passed the bounding-box stage.
    pub in_bounding_box: usize,
    /// Great-circle route length in meters.
    pub route_length_m: f64,
    /// Corridor half-width actually applied, in meters.
    pub threshold_m: f64,
}

/// Corridor half-width for a route of the given length.
///
/// `clamp(route_length * width_factor, min_width_m, max_width_m)`: short
/// routes still get a usable band, long routes cannot widen without bound.
pub fn corridor_threshold(route_length_m: f64, config: &CorridorConfig) -> f64 {
    (route_length_m * config.width_factor)
        .max(config.min_width_m)
        .min(config.max_width_m)
}

/// Keep only records inside the route's bounding box.
pub fn filter_bounding_box(records: &[GeoRecord], route: &RouteSpec) -> Vec<GeoRecord> {
    let bbox = route.bounding_box();
    records
        .iter()
        .filter(|r| bbox.contains(r.latitude, r.longitude))
        .cloned()
        .collect()
}

/// Keep records within `threshold_m` of the route segment.
pub fn filter_by_distance(
    records: &[GeoRecord],
    route: &RouteSpec,
    threshold_m: f64,
) -> Vec<CorridorRecord> {
    records
        .par_iter()
        .filter_map(|r| {
            let distance = route.distance_to(r.latitude, r.longitude);
            if distance <= threshold_m {
                Some(CorridorRecord {
                    record: r.clone(),
                    distance_to_route_m: distance,
                })
            } else {
                None
            }
        })
        .collect()
}

/// Apply both corridor stages.
pub fn filter_corridor(
    records: &[GeoRecord],
    route: &RouteSpec,
    config: &CorridorConfig,
) -> CorridorFilterResult {
    let bbox = route.bounding_box();
    log::info!(
        "Bounding box: lat({}, {}), lon({}, {})",
        bbox.min_lat,
        bbox.max_lat,
        bbox.min_lon,
        bbox.max_lon
    );

    let boxed = filter_bounding_box(records, route);
    log::info!("After bounding box filter: {} records", boxed.len());

    let route_length_m = route.length_m();
    let threshold_m = corridor_threshold(route_length_m, config);
    log::info!(
        "Route length: {:.2}m, distance threshold: {:.2}m",
        route_length_m,
        threshold_m
    );

    let kept = filter_by_distance(&boxed, route, threshold_m);
    log::info!("After corridor distance filter: {} records", kept.len());

    CorridorFilterResult {
        records: kept,
        in_bounding_box: boxed.len(),
        route_length_m,
        threshold_m,
    }
}
