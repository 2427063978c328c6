//! Cache service owning the store and the two memo caches the pipeline uses.

use super::connection::CacheDb;
use super::memo::MemoCache;
use crate::Error;
use crate::config::AppConfig;

/// Namespace for the case/postcode dataset pair.
pub const DATASETS_NAMESPACE: &str = "datasets";

/// Namespace for the LGA boundary feature list.
pub const BOUNDARIES_NAMESPACE: &str = "lga_features";

/// Explicit cache lifecycle: open once at startup, hand to the pipeline,
/// close on shutdown.
#[derive(Clone, Debug)]
pub struct CacheService {
    db: CacheDb,
    datasets: MemoCache,
    boundaries: MemoCache,
}

impl CacheService {
    /// Open the on-disk store named by `cache_db_path`.
    pub async fn open(config: &AppConfig) -> Result<Self, Error> {
        let db = CacheDb::open(&config.cache_db_path).await?;
        tracing::info!(path = %config.cache_db_path.display(), "opened cache store");
        Self::with_db(db, config)
    }

    /// Build the service around an existing store (e.g. an in-memory one).
    pub fn with_db(db: CacheDb, config: &AppConfig) -> Result<Self, Error> {
        let datasets =
            MemoCache::new(db.clone(), DATASETS_NAMESPACE, config.datasets_ttl(), config.cache_max_entries)?;
        let boundaries =
            MemoCache::new(db.clone(), BOUNDARIES_NAMESPACE, config.boundaries_ttl(), config.cache_max_entries)?;
        Ok(Self { db, datasets, boundaries })
    }

    /// Short-lived cache for the case and postcode tables.
    pub fn datasets(&self) -> &MemoCache {
        &self.datasets
    }

    /// Long-lived cache for boundary features.
    pub fn boundaries(&self) -> &MemoCache {
        &self.boundaries
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    /// Close the store. Clones held elsewhere stop working.
    pub async fn close(self) -> Result<(), Error> {
        self.db.close().await?;
        tracing::info!("closed cache store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_caches_use_configured_ttls() {
        let config = AppConfig { datasets_ttl_secs: 5, boundaries_ttl_secs: 50, ..Default::default() };
        let db = CacheDb::open_in_memory().await.unwrap();
        let service = CacheService::with_db(db, &config).unwrap();

        assert_eq!(service.datasets().ttl(), Duration::from_secs(5));
        assert_eq!(service.boundaries().ttl(), Duration::from_secs(50));
        assert_ne!(service.datasets().key(""), service.boundaries().key(""));
    }

    #[tokio::test]
    async fn test_open_and_close_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig { cache_db_path: dir.path().join("cache.sqlite"), ..Default::default() };

        let service = CacheService::open(&config).await.unwrap();
        service.datasets().store("", &1u32).await.unwrap();
        service.close().await.unwrap();

        let reopened = CacheService::open(&config).await.unwrap();
        assert_eq!(reopened.datasets().lookup::<u32>("").await.unwrap(), Some(1));
        reopened.close().await.unwrap();
    }
}
