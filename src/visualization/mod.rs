//! Map-style plots of clustered route points.
//!
//! Points are drawn as longitude (x) against latitude (y), colored by cluster,
//! with the route segment and the cluster centers on top.

use std::path::Path;

use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::core::geo::RouteSpec;
use crate::core::loaders::GeoRecord;

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("No points to plot")]
    NoPoints,

    #[error("Label count mismatch: {points} points but {labels} labels")]
    LabelMismatch { points: usize, labels: usize },
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Default plot width in pixels.
const DEFAULT_WIDTH: u32 = 1920;

/// Default plot height in pixels.
const DEFAULT_HEIGHT: u32 = 1080;

/// Color palette for cluster visualization.
const CLUSTER_COLORS: &[(u8, u8, u8)] = &[
    (228, 26, 28),   // Red
    (55, 126, 184),  // Blue
    (77, 175, 74),   // Green
    (152, 78, 163),  // Purple
    (255, 127, 0),   // Orange
    (166, 86, 40),   // Brown
    (247, 129, 191), // Pink
    (0, 206, 209),   // Turquoise
    (138, 43, 226),  // Blue Violet
    (50, 205, 50),   // Lime Green
    (255, 20, 147),  // Deep Pink
    (255, 215, 0),   // Gold
];

const ROUTE_COLOR: RGBColor = RGBColor(40, 40, 40);

/// Color for a cluster label, cycling through the palette.
fn cluster_color(label: usize) -> RGBColor {
    let (r, g, b) = CLUSTER_COLORS[label % CLUSTER_COLORS.len()];
    RGBColor(r, g, b)
}

fn plot_err<E: std::fmt::Display>(e: E) -> VisualizationError {
    VisualizationError::PlottingError(e.to_string())
}

/// Plot clustered points, the route segment and cluster centers as a PNG.
///
/// # Arguments
///
/// * `output_path` - Path to save the PNG image
/// * `route` - Route whose endpoints are drawn as a line
/// * `points` - Clustered points
/// * `labels` - Cluster label per point
/// * `centers` - Cluster centers as `[lat, lon]`
///
/// # Errors
///
/// Returns `NoPoints` for an empty point set and `LabelMismatch` when
/// `labels` does not line up with `points`.
pub fn plot_route_clusters(
    output_path: &Path,
    route: &RouteSpec,
    points: &[GeoRecord],
    labels: &[usize],
    centers: &[[f64; 2]],
) -> Result<()> {
    if points.is_empty() {
        return Err(VisualizationError::NoPoints);
    }
    if points.len() != labels.len() {
        return Err(VisualizationError::LabelMismatch {
            points: points.len(),
            labels: labels.len(),
        });
    }

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // (lon, lat) so x runs east
    let mut extent: Vec<(f64, f64)> = points.iter().map(|p| (p.longitude, p.latitude)).collect();
    extent.push((route.start_lon, route.start_lat));
    extent.push((route.end_lon, route.end_lat));

    let (x_min, x_max, y_min, y_max) = compute_bounds(&extent);
    let x_padding = (x_max - x_min) * 0.05;
    let y_padding = (y_max - y_min) * 0.05;

    let root = BitMapBackend::new(output_path, (DEFAULT_WIDTH, DEFAULT_HEIGHT)).into_drawing_area();

    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .build_cartesian_2d(
            (x_min - x_padding)..(x_max + x_padding),
            (y_min - y_padding)..(y_max + y_padding),
        )
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(points.iter().zip(labels.iter()).map(|(p, &label)| {
            Circle::new((p.longitude, p.latitude), 3, cluster_color(label).mix(0.7).filled())
        }))
        .map_err(plot_err)?;

    chart
        .draw_series(LineSeries::new(
            vec![(route.start_lon, route.start_lat), (route.end_lon, route.end_lat)],
            ROUTE_COLOR.stroke_width(2),
        ))
        .map_err(plot_err)?;

    chart
        .draw_series(
            [(route.start_lon, route.start_lat), (route.end_lon, route.end_lat)]
                .into_iter()
                .map(|(x, y)| Circle::new((x, y), 7, ROUTE_COLOR.filled())),
        )
        .map_err(plot_err)?;

    chart
        .draw_series(centers.iter().enumerate().map(|(i, c)| {
            Cross::new((c[1], c[0]), 10, cluster_color(i).stroke_width(3))
        }))
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;

    log::info!("Saved cluster plot: {}", output_path.display());
    Ok(())
}

/// Compute the bounds (min/max) for x and y coordinates.
///
/// Degenerate axes are widened so the chart range is never empty.
fn compute_bounds(points: &[(f64, f64)]) -> (f64, f64, f64, f64) {
    let mut x_min = f64::MAX;
    let mut x_max = f64::MIN;
    let mut y_min = f64::MAX;
    let mut y_max = f64::MIN;

    for &(x, y) in points {
        x_min = x_min.min(x);
        x_max = x_max.max(x);
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }

    if (x_max - x_min).abs() < 1e-9 {
        x_min -= 0.01;
        x_max += 0.01;
    }
    if (y_max - y_min).abs() < 1e-9 {
        y_min -= 0.01;
        y_max += 0.01;
    }

    (x_min, x_max, y_min, y_max)
}
