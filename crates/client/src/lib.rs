//! Client code for covidmap.
//!
//! This crate provides the dataset pipeline: HTTP fetch, cleaning, the
//! postcode join and per-LGA aggregation, and the map specification handed
//! to the presentation layer.

pub mod aggregate;
pub mod clean;
pub mod dashboard;
pub mod fetch;
pub mod model;
pub mod render;
pub mod table;

pub use aggregate::{aggregate, aggregate_tables};
pub use clean::{clean, get_locality};
pub use dashboard::Dashboard;
pub use fetch::{BoundaryFetcher, BoundaryOutcome, FetchClient, FetchConfig, FetchedTable};
pub use model::{AggregatedPoint, CaseRecord, DatasetBundle, LastUpdate, PostcodeRecord};
pub use render::{MapSpec, RenderOptions, render, round_features};
pub use table::{DatasetKind, Table};
