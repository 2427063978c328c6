//! covidmap command-line entry point.
//!
//! JSON results go to stdout; logging goes to stderr so the output can be
//! piped straight into a file or another tool.

use anyhow::{Context, Result, bail};
use clap::Parser;
use covidmap_client::fetch::{BoundaryFetcher, BoundaryOutcome, FetchClient, FetchConfig};
use covidmap_client::{Dashboard, round_features};
use covidmap_core::{AppConfig, CacheService};
use geojson::FeatureCollection;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let args = Args::parse();
    let config = AppConfig::load().context("failed to load configuration")?;

    match args.command {
        Command::LgaGeojson { precision } => lga_geojson(&config, precision).await,
        Command::MapSpec { pretty } => map_spec(config, pretty).await,
        Command::PurgeCache { max_entries } => purge_cache(&config, max_entries).await,
    }
}

async fn lga_geojson(config: &AppConfig, precision: u32) -> Result<()> {
    let client = FetchClient::new(FetchConfig::from(config))?;
    let fetcher = BoundaryFetcher::new(client, config.lga_geojson_url.clone(), config.lga_geojson_path.clone());

    let mut features = match fetcher.load().await? {
        BoundaryOutcome::Loaded(features) => features,
        BoundaryOutcome::Degraded { reason } => bail!("LGA boundaries unavailable: {reason}"),
    };
    round_features(&mut features, precision);
    tracing::info!(features = features.len(), precision, "writing LGA boundaries");

    let collection = FeatureCollection { bbox: None, features, foreign_members: None };
    println!("{}", serde_json::to_string(&collection)?);
    Ok(())
}

async fn map_spec(config: AppConfig, pretty: bool) -> Result<()> {
    let cache = CacheService::open(&config).await?;
    let dashboard = Dashboard::new(config, cache.clone())?;

    let spec = dashboard.map_spec().await;
    tracing::info!(markers = spec.marker_count(), "built map spec");

    let json = if pretty { serde_json::to_string_pretty(&spec)? } else { serde_json::to_string(&spec)? };
    println!("{json}");

    drop(dashboard);
    cache.close().await?;
    Ok(())
}

async fn purge_cache(config: &AppConfig, max_entries: Option<usize>) -> Result<()> {
    let cache = CacheService::open(config).await?;

    let mut deleted = cache.db().purge_expired_memo().await?;
    if let Some(max) = max_entries {
        deleted += cache.db().purge_lru_memo(max).await?;
    }
    tracing::info!(deleted, remaining = cache.db().count_memo().await?, "purged cache");
    println!("{deleted}");

    cache.close().await?;
    Ok(())
}
