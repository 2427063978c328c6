//! Coordinate rounding for boundary output.

use geojson::{Feature, Geometry, Value};

/// Most decimals an `f64` coordinate can meaningfully carry.
pub const MAX_PRECISION: u32 = 15;

/// Scale factor for `precision` decimals; larger requests are capped at
/// [`MAX_PRECISION`] so the factor stays finite.
fn scale(precision: u32) -> f64 {
    10f64.powi(precision.min(MAX_PRECISION) as i32)
}

fn round(v: f64, factor: f64) -> f64 {
    (v * factor).round() / factor
}

fn round_position(position: &mut [f64], factor: f64) {
    for v in position.iter_mut() {
        *v = round(*v, factor);
    }
}

fn round_positions(positions: &mut [Vec<f64>], factor: f64) {
    for p in positions.iter_mut() {
        round_position(p, factor);
    }
}

/// Round every coordinate of `geometry` (and its bbox) to `precision` decimals,
/// at most [`MAX_PRECISION`].
pub fn round_geometry(geometry: &mut Geometry, precision: u32) {
    let factor = scale(precision);
    round_geometry_by(geometry, factor);
}

fn round_geometry_by(geometry: &mut Geometry, factor: f64) {
    if let Some(bbox) = geometry.bbox.as_mut() {
        round_position(bbox, factor);
    }
    match &mut geometry.value {
        Value::Point(p) => round_position(p, factor),
        Value::MultiPoint(ps) | Value::LineString(ps) => round_positions(ps, factor),
        Value::MultiLineString(lines) | Value::Polygon(lines) => {
            for line in lines.iter_mut() {
                round_positions(line, factor);
            }
        }
        Value::MultiPolygon(polygons) => {
            for ring in polygons.iter_mut().flatten() {
                round_positions(ring, factor);
            }
        }
        Value::GeometryCollection(geometries) => {
            for g in geometries.iter_mut() {
                round_geometry_by(g, factor);
            }
        }
    }
}

/// Round all feature geometries in place.
pub fn round_features(features: &mut [Feature], precision: u32) {
    let factor = scale(precision);
    for feature in features.iter_mut() {
        if let Some(bbox) = feature.bbox.as_mut() {
            round_position(bbox, factor);
        }
        if let Some(geometry) = feature.geometry.as_mut() {
            round_geometry_by(geometry, factor);
        }
    }
}
