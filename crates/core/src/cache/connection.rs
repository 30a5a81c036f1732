//! Opening the cache database.

use std::path::Path;

use tokio_rusqlite::Connection;

use super::migrations;
use crate::Error;

/// Applied to every connection before migrations run.
const PRAGMAS: &[(&str, &str)] = &[("synchronous", "NORMAL"), ("temp_store", "MEMORY"), ("foreign_keys", "ON")];

/// Handle to the database that holds every cache store.
///
/// Queries run on tokio-rusqlite's background thread. Clones share it.
#[derive(Clone, Debug)]
pub struct CacheDb {
    pub(crate) conn: Connection,
}

impl CacheDb {
    /// Open (or create) the database at `path`, creating missing parent
    /// directories, then bring the schema up to date.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::InvalidInput(format!("cannot create {}: {e}", parent.display())))?;
        }

        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::prepare(conn).await
    }

    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::prepare(conn).await
    }

    async fn prepare(conn: Connection) -> Result<Self, Error> {
        let journal = conn
            .call(|conn| {
                // in-memory databases report "memory" and stay that way
                let journal: String =
                    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
                for (name, value) in PRAGMAS {
                    conn.pragma_update(None, name, value)?;
                }
                Ok(journal)
            })
            .await
            .map_err(Error::Database)?;
        tracing::debug!(journal_mode = %journal, "cache database opened");

        migrations::run(&conn).await?;

        Ok(Self { conn })
    }
}
