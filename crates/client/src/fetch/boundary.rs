//! LGA boundary features, downloaded once and kept on local disk.

use std::path::{Path, PathBuf};

use covidmap_core::Error;
use geojson::{Feature, GeoJson};
use serde::{Deserialize, Serialize};

use super::FetchClient;

/// Result of loading boundary features.
///
/// The boundary overlay is decoration; when it cannot be downloaded the map
/// is still drawn, just without it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BoundaryOutcome {
    Loaded(Vec<Feature>),
    Degraded { reason: String },
}

impl BoundaryOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, BoundaryOutcome::Degraded { .. })
    }

    /// The features, empty when degraded.
    pub fn into_features(self) -> Vec<Feature> {
        match self {
            BoundaryOutcome::Loaded(features) => features,
            BoundaryOutcome::Degraded { .. } => Vec::new(),
        }
    }
}

/// Loads boundary features from a local file, downloading it first if absent.
#[derive(Debug, Clone)]
pub struct BoundaryFetcher {
    client: FetchClient,
    url: String,
    path: PathBuf,
}

impl BoundaryFetcher {
    pub fn new(client: FetchClient, url: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self { client, url: url.into(), path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the features.
    ///
    /// A failed download, including one whose body is not GeoJSON, is
    /// reported as [`BoundaryOutcome::Degraded`] and leaves no file behind. A
    /// local file that exists but cannot be read or parsed is an error.
    pub async fn load(&self) -> Result<BoundaryOutcome, Error> {
        if !tokio::fs::try_exists(&self.path).await? {
            tracing::info!(url = %self.url, path = %self.path.display(), "downloading LGA boundaries");
            let downloaded = self
                .client
                .download_verified(&self.url, &self.path, |bytes| {
                    let text = std::str::from_utf8(bytes)
                        .map_err(|e| Error::Parse(format!("GeoJSON is not UTF-8: {e}")))?;
                    parse_features(text)
                })
                .await;
            return Ok(match downloaded {
                Ok((_, features)) => BoundaryOutcome::Loaded(features),
                Err(e) => {
                    tracing::warn!(error = %e, "LGA boundary download failed, continuing without boundaries");
                    BoundaryOutcome::Degraded { reason: e.to_string() }
                }
            });
        }

        let text = tokio::fs::read_to_string(&self.path).await?;
        let features = parse_features(&text)?;
        tracing::debug!(path = %self.path.display(), features = features.len(), "loaded LGA boundaries");
        Ok(BoundaryOutcome::Loaded(features))
    }
}

/// Features of a GeoJSON document: all of a FeatureCollection, or a lone Feature.
pub fn parse_features(text: &str) -> Result<Vec<Feature>, Error> {
    let geojson: GeoJson = text.parse().map_err(|e| Error::Parse(format!("invalid GeoJSON: {e}")))?;
    match geojson {
        GeoJson::FeatureCollection(collection) => Ok(collection.features),
        GeoJson::Feature(feature) => Ok(vec![feature]),
        GeoJson::Geometry(_) => Err(Error::Parse("GeoJSON must be a FeatureCollection".into())),
    }
}
