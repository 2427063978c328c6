//! The pipeline behind the dashboard page.
//!
//! [`Dashboard`] owns the fetch client and boundary fetcher and is handed a
//! [`CacheService`] at construction. Each accessor is safe to call on every
//! page load: results are served from the memo caches while fresh.

use covidmap_core::{AppConfig, CacheService, Error};
use geojson::Feature;

use crate::aggregate::aggregate_tables;
use crate::clean::clean;
use crate::fetch::{BoundaryFetcher, BoundaryOutcome, FetchClient, FetchConfig};
use crate::model::{AggregatedPoint, DatasetBundle, LastUpdate};
use crate::render::{MapSpec, RenderOptions, render};
use crate::table::DatasetKind;

pub struct Dashboard {
    config: AppConfig,
    client: FetchClient,
    cache: CacheService,
    boundaries: BoundaryFetcher,
}

impl Dashboard {
    pub fn new(config: AppConfig, cache: CacheService) -> Result<Self, Error> {
        let client = FetchClient::new(FetchConfig::from(&config))?;
        let boundaries =
            BoundaryFetcher::new(client.clone(), config.lga_geojson_url.clone(), config.lga_geojson_path.clone());
        Ok(Self { config, client, cache, boundaries })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn cache(&self) -> &CacheService {
        &self.cache
    }

    pub fn boundaries(&self) -> &BoundaryFetcher {
        &self.boundaries
    }

    fn datasets_args(&self) -> String {
        format!("{}\n{}\n{:?}", self.config.cases_url, self.config.postcodes_url, self.config.case_cleaning)
    }

    /// Cleaned case and postcode tables, refetched once the datasets TTL lapses.
    pub async fn datasets(&self) -> Result<DatasetBundle, Error> {
        self.cache.datasets().memoize(&self.datasets_args(), || self.fetch_datasets()).await
    }

    async fn fetch_datasets(&self) -> Result<DatasetBundle, Error> {
        let (cases, postcodes) = tokio::try_join!(
            self.client.fetch_table(&self.config.cases_url),
            self.client.fetch_table(&self.config.postcodes_url),
        )?;

        let policy = self.config.case_cleaning;
        let mut bundle = DatasetBundle {
            last_update: cases.last_modified.map_or(LastUpdate::Unknown, LastUpdate::At),
            ..Default::default()
        };
        for (kind, fetched) in [(DatasetKind::NswCases, cases), (DatasetKind::AuPostcodes, postcodes)] {
            let cleaned = clean(&fetched.table, kind, policy)?;
            tracing::debug!(dataset = %kind, rows = cleaned.len(), fetch_ms = fetched.fetch_ms, "cleaned dataset");
            bundle.datasets.insert(kind, cleaned);
        }

        tracing::info!(last_update = %bundle.last_update, "refreshed datasets");
        Ok(bundle)
    }

    /// Aggregated map points for the current datasets.
    pub async fn points(&self) -> Result<Vec<AggregatedPoint>, Error> {
        let bundle = self.datasets().await?;
        let missing = |kind: DatasetKind| Error::Parse(format!("dataset {kind} missing from bundle"));
        let cases = bundle.get(DatasetKind::NswCases).ok_or_else(|| missing(DatasetKind::NswCases))?;
        let postcodes = bundle.get(DatasetKind::AuPostcodes).ok_or_else(|| missing(DatasetKind::AuPostcodes))?;
        aggregate_tables(cases, postcodes)
    }

    /// LGA boundary features; empty when they cannot be had.
    ///
    /// Only successfully loaded features are cached, so a failed download is
    /// retried on the next call.
    pub async fn lga_features(&self) -> Vec<Feature> {
        match self.load_lga_features().await {
            Ok(features) => features,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load LGA boundaries");
                Vec::new()
            }
        }
    }

    async fn load_lga_features(&self) -> Result<Vec<Feature>, Error> {
        let args = format!("{}\n{}", self.config.lga_geojson_url, self.boundaries.path().display());
        let outcome = self
            .cache
            .boundaries()
            .memoize_if(&args, || self.boundaries.load(), |outcome| !outcome.is_degraded())
            .await?;

        if let BoundaryOutcome::Degraded { reason } = &outcome {
            tracing::warn!(%reason, "rendering without LGA boundaries");
        }
        Ok(outcome.into_features())
    }

    /// The map for the dashboard page.
    ///
    /// Dataset failures render as a map with no markers.
    pub async fn map_spec(&self) -> MapSpec {
        let points = match self.points().await {
            Ok(points) => points,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load case data, rendering empty map");
                Vec::new()
            }
        };
        let features = self.lga_features().await;
        render(&points, features, &self.render_options())
    }

    fn render_options(&self) -> RenderOptions {
        let access_token = match self.config.require_map_access_token() {
            Ok(token) => Some(token.to_string()),
            Err(e) => {
                tracing::debug!(error = %e, "no map access token configured");
                None
            }
        };
        RenderOptions { access_token, ..Default::default() }
    }
}
