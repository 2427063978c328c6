//! Opening the memo store.

use super::migrations;
use crate::Error;
use std::path::Path;
use tokio_rusqlite::Connection;

/// WAL lets `purge-cache` run while a dashboard process holds the store open.
const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA busy_timeout=5000;
     PRAGMA temp_store=MEMORY;";

/// Handle to the memo store.
///
/// Cloning is cheap; every clone talks to the same background connection
/// thread.
#[derive(Clone, Debug)]
pub struct CacheDb {
    pub(crate) conn: Connection,
}

impl CacheDb {
    /// Open (or create) the store at `path`, creating missing parent
    /// directories and bringing the schema up to date.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(dir).await?;
        }

        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    /// A throwaway store that lives as long as the handle.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory().await.map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| conn.execute_batch(PRAGMAS)).await.map_err(Error::Database)?;
        migrations::run(&conn).await?;
        Ok(Self { conn })
    }

    /// Close the store. Other clones fail with `ConnectionClosed` afterwards.
    pub async fn close(self) -> Result<(), Error> {
        self.conn.close().await.map_err(Error::Database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_store_has_memo_table() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert_eq!(db.count_memo().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache-directory").join("covidmap-cache.sqlite");

        let db = CacheDb::open(&path).await.unwrap();
        assert!(path.exists());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_clone_reports_database_error() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let other = db.clone();
        db.close().await.unwrap();

        let result = other.count_memo().await;
        assert!(matches!(result, Err(Error::Database(_))));
        assert!(result.unwrap_err().to_string().starts_with("CACHE_ERROR"));
    }
}
