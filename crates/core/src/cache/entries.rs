//! Memo entry operations.
//!
//! Stores serialized results of memoized calls with an expiry time and a
//! last-access time used for LRU eviction.

use super::connection::CacheDb;
use crate::Error;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Bookkeeping columns of a memo entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoEntryMeta {
    pub namespace: String,
    pub fetched_at: String,
    pub expires_at: String,
    pub last_accessed_at: String,
}

/// Fixed-width RFC 3339 so that stored timestamps compare lexicographically.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl CacheDb {
    /// Get a fresh memo value by key hash, marking it as recently used.
    ///
    /// Returns None if the key doesn't exist or has expired.
    pub async fn get_memo(&self, key_hash: &str) -> Result<Option<String>, Error> {
        let key_hash = key_hash.to_string();
        let now = timestamp(Utc::now());
        self.conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let result = conn.query_row(
                    "SELECT value_json FROM memo_entries WHERE key_hash = ?1 AND expires_at > ?2",
                    params![key_hash, now],
                    |row| row.get::<_, String>(0),
                );

                match result {
                    Ok(json) => {
                        conn.execute(
                            "UPDATE memo_entries SET last_accessed_at = ?2 WHERE key_hash = ?1",
                            params![key_hash, now],
                        )?;
                        Ok(Some(json))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Get memo metadata by key hash, whether or not the entry is fresh.
    pub async fn get_memo_meta(&self, key_hash: &str) -> Result<Option<MemoEntryMeta>, Error> {
        let key_hash = key_hash.to_string();
        self.conn
            .call(move |conn| -> Result<Option<MemoEntryMeta>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT namespace, fetched_at, expires_at, last_accessed_at
                     FROM memo_entries WHERE key_hash = ?1",
                )?;

                let result = stmt.query_row(params![key_hash], |row| {
                    Ok(MemoEntryMeta {
                        namespace: row.get(0)?,
                        fetched_at: row.get(1)?,
                        expires_at: row.get(2)?,
                        last_accessed_at: row.get(3)?,
                    })
                });

                match result {
                    Ok(meta) => Ok(Some(meta)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or replace a memo value that stays fresh for `ttl`.
    ///
    /// Uses UPSERT semantics so a recomputed value overwrites the stale one.
    pub async fn put_memo(&self, key_hash: &str, namespace: &str, value_json: &str, ttl: Duration) -> Result<(), Error> {
        let key_hash = key_hash.to_string();
        let namespace = namespace.to_string();
        let value_json = value_json.to_string();

        let ttl = chrono::Duration::from_std(ttl).map_err(|e| Error::InvalidInput(format!("ttl out of range: {e}")))?;
        let now = Utc::now();
        let fetched_at = timestamp(now);
        let expires_at = timestamp(now + ttl);

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO memo_entries (key_hash, namespace, value_json, fetched_at, expires_at, last_accessed_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?4)
                    ON CONFLICT(key_hash) DO UPDATE SET
                        namespace = excluded.namespace,
                        value_json = excluded.value_json,
                        fetched_at = excluded.fetched_at,
                        expires_at = excluded.expires_at,
                        last_accessed_at = excluded.last_accessed_at",
                    params![key_hash, namespace, value_json, fetched_at, expires_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Number of stored memo entries, fresh or not.
    pub async fn count_memo(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM memo_entries", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete expired memo entries.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_expired_memo(&self) -> Result<u64, Error> {
        let now = timestamp(Utc::now());
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM memo_entries WHERE expires_at <= ?1", params![now])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Evict least recently used entries until count <= max_entries.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_lru_memo(&self, max_entries: usize) -> Result<u64, Error> {
        let max = max_entries as i64;
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM memo_entries", [], |row| row.get(0))?;
                if count <= max {
                    return Ok(0);
                }

                let to_delete = count - max;
                let deleted = conn.execute(
                    "DELETE FROM memo_entries WHERE key_hash IN (
                    SELECT key_hash FROM memo_entries ORDER BY last_accessed_at ASC, rowid ASC LIMIT ?1
                )",
                    params![to_delete],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }
}
