//! Named store management.
//!
//! Each deployed version owns one store. Stores are created lazily by
//! [`CacheDb::open_store`] and evicted whole by [`CacheDb::delete_store`]
//! or [`CacheDb::retain_only`].

use super::connection::CacheDb;
use crate::Error;
use tokio_rusqlite::params;

/// Handle to one named store inside a [`CacheDb`].
///
/// Cheap to clone; every clone talks to the same database connection.
#[derive(Clone, Debug)]
pub struct CacheStore {
    pub(crate) db: CacheDb,
    pub(crate) name: String,
}

impl CacheStore {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl CacheDb {
    /// Open a store by name, creating it if it doesn't exist.
    pub async fn open_store(&self, name: &str) -> Result<CacheStore, Error> {
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("store name cannot be empty".into()));
        }

        let owned = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO cache_stores (name, created_at) VALUES (?1, ?2)",
                    params![owned, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(CacheStore { db: self.clone(), name: name.to_string() })
    }

    /// Handle to a store without creating it.
    ///
    /// Reads on a missing store miss; writes fail until it is opened.
    pub fn store_handle(&self, name: &str) -> CacheStore {
        CacheStore { db: self.clone(), name: name.to_string() }
    }

    /// Check whether a store exists.
    pub async fn has_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM cache_stores WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// List every store name, oldest first.
    pub async fn store_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM cache_stores ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a store and all of its entries.
    ///
    /// Returns false if the store didn't exist.
    pub async fn delete_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM cache_stores WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every store except `keep`, in one transaction.
    ///
    /// Returns the names of the deleted stores.
    pub async fn retain_only(&self, keep: &str) -> Result<Vec<String>, Error> {
        let keep = keep.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let tx = conn.transaction()?;
                let stale = {
                    let mut stmt =
                        tx.prepare("SELECT name FROM cache_stores WHERE name != ?1 ORDER BY created_at ASC, name ASC")?;
                    let names = stmt
                        .query_map(params![keep], |row| row.get(0))?
                        .collect::<Result<Vec<String>, _>>()?;
                    names
                };
                tx.execute("DELETE FROM cache_stores WHERE name != ?1", params![keep])?;
                tx.commit()?;
                Ok(stale)
            })
            .await
            .map_err(Error::from)
    }
}
