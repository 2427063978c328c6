//! Map specification for the dashboard.
//!
//! The output is a declarative, serializable description of a scatter-map:
//! one marker per aggregated point and a line layer for LGA boundaries. It is
//! handed to a charting front end as JSON; nothing here draws pixels.

pub mod precision;

use geojson::{Feature, FeatureCollection};
use serde::{Deserialize, Serialize};

use crate::model::AggregatedPoint;

pub use precision::{round_features, round_geometry};

/// Diameter in pixels of the largest marker.
const MAX_MARKER_DIAMETER: f64 = 16.0;

/// Smallest marker diameter in pixels.
const MIN_MARKER_DIAMETER: f64 = 2.0;

/// How marker `size` maps onto drawn marker dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeMode {
    /// Marker area is proportional to size.
    Area,
    /// Marker diameter is proportional to size.
    Diameter,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

/// Options for building a [`MapSpec`].
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Tile provider access token.
    pub access_token: Option<String>,

    /// Base map style (default: "open-street-map").
    pub style: String,

    /// Initial view center (default: central NSW).
    pub center: LonLat,

    /// Initial zoom (default: 5).
    pub zoom: f64,

    /// Marker fill color (default: "red").
    pub marker_color: String,

    /// Boundary line color (default: "royalblue").
    pub boundary_color: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            access_token: None,
            style: "open-street-map".into(),
            center: LonLat { lon: 146.9211, lat: -31.2532 },
            zoom: 5.0,
            marker_color: "red".into(),
            boundary_color: "royalblue".into(),
        }
    }
}

/// One case marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub postcode: u32,
    pub lga_name: String,
    pub lon: f64,
    pub lat: f64,
    /// Cumulative case count; scaled by the trace's marker style.
    pub size: u64,
    pub hover_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerStyle {
    pub color: String,
    pub symbol: String,
    pub size_mode: SizeMode,
    pub size_min: f64,
    pub size_ref: f64,
}

/// The scatter trace holding every marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerTrace {
    pub mode: String,
    pub markers: Vec<Marker>,
    pub style: MarkerStyle,
    pub hover_template: String,
}

/// A GeoJSON overlay drawn as lines beneath the markers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineLayer {
    pub source: FeatureCollection,
    #[serde(rename = "type")]
    pub kind: String,
    pub below: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapLayout {
    pub access_token: Option<String>,
    pub style: String,
    pub center: LonLat,
    pub zoom: f64,
    pub layers: Vec<LineLayer>,
    pub show_legend: bool,
}

/// Everything a front end needs to draw the case map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSpec {
    pub trace: MarkerTrace,
    pub layout: MapLayout,
}

impl MapSpec {
    pub fn marker_count(&self) -> usize {
        self.trace.markers.len()
    }
}

/// Size reference putting the largest count at [`MAX_MARKER_DIAMETER`] in area mode.
pub fn size_ref(max_size: u64) -> f64 {
    if max_size == 0 {
        return 1.0;
    }
    2.0 * max_size as f64 / (MAX_MARKER_DIAMETER * MAX_MARKER_DIAMETER)
}

/// Drawn diameter of a marker in area mode.
///
/// Area, not radius, grows with `size`: `sqrt(2 * size / size_ref)`, so the
/// count [`size_ref`] was built from is drawn at [`MAX_MARKER_DIAMETER`].
pub fn marker_diameter(size: u64, size_ref: f64, size_min: f64) -> f64 {
    if size_ref <= 0.0 {
        return size_min;
    }
    (2.0 * size as f64 / size_ref).sqrt().max(size_min)
}

/// Build the map spec for `points` with `features` as the boundary overlay.
pub fn render(points: &[AggregatedPoint], features: Vec<Feature>, options: &RenderOptions) -> MapSpec {
    let markers: Vec<Marker> = points
        .iter()
        .map(|p| Marker {
            postcode: p.postcode,
            lga_name: p.lga_name.clone(),
            lon: p.longitude,
            lat: p.latitude,
            size: p.cumulative_cases,
            hover_text: format!("{} {}", p.postcode, p.lga_name),
        })
        .collect();

    let max_size = markers.iter().map(|m| m.size).max().unwrap_or(0);

    let trace = MarkerTrace {
        mode: "markers+text".into(),
        markers,
        style: MarkerStyle {
            color: options.marker_color.clone(),
            symbol: "circle".into(),
            size_mode: SizeMode::Area,
            size_min: MIN_MARKER_DIAMETER,
            size_ref: size_ref(max_size),
        },
        hover_template: "<b>%{hovertext} </b><br>cases: %{marker.size}<br>longitude: %{lon}<br>latitude: %{lat}<br>"
            .into(),
    };

    let boundaries = LineLayer {
        source: FeatureCollection { bbox: None, features, foreign_members: None },
        kind: "line".into(),
        below: "traces".into(),
        color: options.boundary_color.clone(),
    };

    MapSpec {
        trace,
        layout: MapLayout {
            access_token: options.access_token.clone(),
            style: options.style.clone(),
            center: options.center,
            zoom: options.zoom,
            layers: vec![boundaries],
            show_legend: false,
        },
    }
}
