//! Command-line argument parsing.

use clap::{Parser, Subcommand};
use covidmap_client::render::precision::MAX_PRECISION;

/// covidmap - NSW COVID-19 case map pipeline
///
/// Fetches the NSW case and Australian postcode datasets, joins them, and
/// emits the case map specification or the LGA boundary layer as JSON.
///
/// Examples:
///   covidmap map-spec --pretty
///   covidmap lga-geojson --precision 4 > nsw-lga.geojson
///   covidmap purge-cache --max-entries 5
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the LGA boundaries as a GeoJSON FeatureCollection
    ///
    /// Downloads the boundary file first if it is not on disk yet.
    LgaGeojson {
        /// Decimal places kept in every coordinate (0-15)
        #[arg(
            long,
            default_value = "6",
            value_name = "DIGITS",
            value_parser = clap::value_parser!(u32).range(0..=MAX_PRECISION as i64)
        )]
        precision: u32,
    },

    /// Run the pipeline once and print the map specification
    MapSpec {
        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Delete expired cache entries and print how many were removed
    PurgeCache {
        /// Also trim the store to this many entries, least recently used first
        #[arg(long, value_name = "COUNT")]
        max_entries: Option<usize>,
    },
}
