//! Great-circle and point-to-segment distances over geographic coordinates.
//!
//! All inputs are decimal degrees and all outputs are meters.

use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Straight route between two coordinates; the corridor axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    pub start_lat: f64,
    pub start_lon: f64,
    pub end_lat: f64,
    pub end_lon: f64,
}

impl RouteSpec {
    pub fn new(start_lat: f64, start_lon: f64, end_lat: f64, end_lon: f64) -> Self {
        Self {
            start_lat,
            start_lon,
            end_lat,
            end_lon,
        }
    }

    /// Great-circle length of the route in meters.
    pub fn length_m(&self) -> f64 {
        great_circle_distance(self.start_lat, self.start_lon, self.end_lat, self.end_lon)
    }

    /// Distance from a point to the route segment in meters.
    #[inline]
    pub fn distance_to(&self, lat: f64, lon: f64) -> f64 {
        distance_to_segment(
            lat,
            lon,
            self.start_lat,
            self.start_lon,
            self.end_lat,
            self.end_lon,
        )
    }

    /// Axis-aligned box spanned by the two endpoints.
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox {
            min_lat: self.start_lat.min(self.end_lat),
            max_lat: self.start_lat.max(self.end_lat),
            min_lon: self.start_lon.min(self.end_lon),
            max_lon: self.start_lon.max(self.end_lon),
        }
    }

    /// True when every coordinate is finite and inside the valid lat/lon ranges.
    pub fn is_valid(&self) -> bool {
        is_valid_coordinate(self.start_lat, self.start_lon)
            && is_valid_coordinate(self.end_lat, self.end_lon)
    }

    /// Same segment traversed in the opposite direction.
    pub fn reversed(&self) -> Self {
        Self::new(self.end_lat, self.end_lon, self.start_lat, self.start_lon)
    }
}

/// Inclusive latitude/longitude box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    #[inline]
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }
}

/// True for finite coordinates with latitude in [-90, 90] and longitude in [-180, 180].
#[inline]
pub fn is_valid_coordinate(lat: f64, lon: f64) -> bool {
    lat.is_finite()
        && lon.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lon)
}

/// Haversine distance between two coordinates in meters.
pub fn great_circle_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Distance from a point to the segment `(seg_start, seg_end)` in meters.
///
/// The point is projected onto the segment in a local equirectangular frame
/// centred on the segment's mean latitude, with the projection parameter
/// clamped to `[0, 1]` so the result never extrapolates past an endpoint. The
/// returned value is the great-circle distance from the original point to the
/// projected point. A zero-length segment degrades to the distance to its
/// start.
pub fn distance_to_segment(
    lat: f64,
    lon: f64,
    seg_start_lat: f64,
    seg_start_lon: f64,
    seg_end_lat: f64,
    seg_end_lon: f64,
) -> f64 {
    let lon_scale = ((seg_start_lat + seg_end_lat) / 2.0).to_radians().cos();

    let x = lon.to_radians() * lon_scale;
    let y = lat.to_radians();
    let x1 = seg_start_lon.to_radians() * lon_scale;
    let y1 = seg_start_lat.to_radians();
    let x2 = seg_end_lon.to_radians() * lon_scale;
    let y2 = seg_end_lat.to_radians();

    let dx = x2 - x1;
    let dy = y2 - y1;
    let len_sq = dx * dx + dy * dy;

    if len_sq == 0.0 {
        return great_circle_distance(lat, lon, seg_start_lat, seg_start_lon);
    }

    let t = (((x - x1) * dx + (y - y1) * dy) / len_sq).clamp(0.0, 1.0);

    let proj_lat = (y1 + t * dy).to_degrees();
    // Scale is only zero for a segment centred on a pole; fall back to the raw longitude there.
    let proj_lon = if lon_scale.abs() > f64::EPSILON {
        ((x1 + t * dx) / lon_scale).to_degrees()
    } else {
        seg_start_lon + t * (seg_end_lon - seg_start_lon)
    };

    great_circle_distance(lat, lon, proj_lat, proj_lon)
}
