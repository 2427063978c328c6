//! Schema migrations, tracked with SQLite's `user_version`.

use super::Error;
use tokio_rusqlite::Connection;

/// Ordered schema steps. Step `n` (1-based) upgrades `user_version` `n-1` to `n`.
const MIGRATIONS: &[&str] = &[include_str!("../../migrations/001_memo_entries.sql")];

/// Schema version this build expects.
pub const SCHEMA_VERSION: i64 = MIGRATIONS.len() as i64;

/// Apply every step newer than the store's `user_version`, each in its own
/// transaction.
///
/// A store written by a newer build is refused rather than downgraded.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if current > SCHEMA_VERSION {
            return Err(Error::MigrationFailed(format!(
                "store is at schema version {current}, this build supports up to {SCHEMA_VERSION}"
            )));
        }

        for (idx, sql) in MIGRATIONS.iter().enumerate().skip(current as usize) {
            let version = idx as i64 + 1;
            tracing::debug!(version, "applying cache migration");
            let tx = conn.transaction()?;
            tx.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("step {version}: {e}")))?;
            tx.pragma_update(None, "user_version", version)?;
            tx.commit()?;
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}
