//! Entry operations on a single store.
//!
//! Entries are keyed by [`compute_cache_key`] over the request method and
//! URL. Writes are UPSERTs, so concurrent puts for one key are
//! last-write-wins.

use super::hash::compute_cache_key;
use super::stores::CacheStore;
use crate::Error;
use crate::http::{ShellRequest, ShellResponse};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;
use tokio_rusqlite::rusqlite::types::Type;
use url::Url;

/// Metadata about a stored entry, without its body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedEntry {
    pub store: String,
    pub key_hash: String,
    pub method: String,
    pub url: String,
    pub final_url: String,
    pub status_code: u16,
    pub response_kind: String,
    pub body_len: u64,
    pub stored_at: String,
}

/// Response headers that belong to one client and are never replayed.
const PRIVATE_HEADERS: &[&str] = &["set-cookie", "set-cookie2"];

/// Row image of a request/response pair, ready to bind.
struct EntryRow {
    key_hash: String,
    method: String,
    url: String,
    final_url: String,
    status_code: i64,
    response_kind: &'static str,
    headers_json: String,
    body: Vec<u8>,
    stored_at: String,
}

impl EntryRow {
    fn new(request: &ShellRequest, response: &ShellResponse) -> Result<Self, Error> {
        let headers: Vec<&(String, String)> = response
            .headers
            .iter()
            .filter(|(name, _)| !PRIVATE_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name)))
            .collect();
        let headers_json = serde_json::to_string(&headers)
            .map_err(|e| Error::InvalidInput(format!("failed to encode headers: {e}")))?;
        let mut url = request.url.clone();
        url.set_fragment(None);

        Ok(Self {
            key_hash: compute_cache_key(&request.method, &request.url),
            method: request.method.to_ascii_uppercase(),
            url: url.to_string(),
            final_url: response.url.to_string(),
            status_code: i64::from(response.status),
            response_kind: response.kind.as_str(),
            headers_json,
            body: response.body.to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}

const UPSERT_SQL: &str = "INSERT INTO cache_entries (
        store, key_hash, method, url, final_url, status_code,
        response_kind, headers_json, body, stored_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
    ON CONFLICT(store, key_hash) DO UPDATE SET
        method = excluded.method,
        url = excluded.url,
        final_url = excluded.final_url,
        status_code = excluded.status_code,
        response_kind = excluded.response_kind,
        headers_json = excluded.headers_json,
        body = excluded.body,
        stored_at = excluded.stored_at";

fn upsert(conn: &rusqlite::Connection, store: &str, row: &EntryRow) -> Result<(), Error> {
    conn.execute(
        UPSERT_SQL,
        params![
            store,
            &row.key_hash,
            &row.method,
            &row.url,
            &row.final_url,
            row.status_code,
            row.response_kind,
            &row.headers_json,
            &row.body,
            &row.stored_at,
        ],
    )?;
    Ok(())
}

fn column_u16(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<u16> {
    let value: i64 = row.get(idx)?;
    u16::try_from(value).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

fn column_u64(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let value: i64 = row.get(idx)?;
    u64::try_from(value).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

impl CacheStore {
    /// Look up the stored response for a request.
    ///
    /// Returns None on a miss.
    pub async fn get(&self, request: &ShellRequest) -> Result<Option<ShellResponse>, Error> {
        let store = self.name.clone();
        let key_hash = compute_cache_key(&request.method, &request.url);
        let row = self
            .db
            .conn
            .call(move |conn| -> Result<Option<(String, i64, String, String, Vec<u8>)>, Error> {
                let result = conn.query_row(
                    "SELECT final_url, status_code, response_kind, headers_json, body
                     FROM cache_entries WHERE store = ?1 AND key_hash = ?2",
                    params![store, key_hash],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
                );

                match result {
                    Ok(r) => Ok(Some(r)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        let Some((final_url, status_code, kind, headers_json, body)) = row else {
            return Ok(None);
        };

        let url = Url::parse(&final_url).map_err(|e| Error::CorruptEntry(format!("final_url: {e}")))?;
        let status = u16::try_from(status_code).map_err(|e| Error::CorruptEntry(format!("status: {e}")))?;
        let headers: Vec<(String, String)> =
            serde_json::from_str(&headers_json).map_err(|e| Error::CorruptEntry(format!("headers: {e}")))?;

        Ok(Some(ShellResponse { url, status, headers, body: Bytes::from(body), kind: kind.parse()? }))
    }

    /// Insert or replace the stored response for a request.
    pub async fn put(&self, request: &ShellRequest, response: &ShellResponse) -> Result<(), Error> {
        let store = self.name.clone();
        let row = EntryRow::new(request, response)?;
        self.db
            .conn
            .call(move |conn| upsert(conn, &store, &row))
            .await
            .map_err(Error::from)
    }

    /// Store every pair in one transaction; either all land or none do.
    ///
    /// Returns the number of entries written.
    pub async fn put_all(&self, pairs: &[(ShellRequest, ShellResponse)]) -> Result<usize, Error> {
        let store = self.name.clone();
        let rows = pairs
            .iter()
            .map(|(req, resp)| EntryRow::new(req, resp))
            .collect::<Result<Vec<_>, _>>()?;

        self.db
            .conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction()?;
                for row in &rows {
                    upsert(&tx, &store, row)?;
                }
                tx.commit()?;
                Ok(rows.len())
            })
            .await
            .map_err(Error::from)
    }

    /// Remove the entry for a request.
    ///
    /// Returns false if there was nothing to remove.
    pub async fn delete(&self, request: &ShellRequest) -> Result<bool, Error> {
        let store = self.name.clone();
        let key_hash = compute_cache_key(&request.method, &request.url);
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute(
                    "DELETE FROM cache_entries WHERE store = ?1 AND key_hash = ?2",
                    params![store, key_hash],
                )?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in this store.
    pub async fn len(&self) -> Result<u64, Error> {
        let store = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM cache_entries WHERE store = ?1", params![store], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.len().await? == 0)
    }

    /// List entry metadata, oldest first.
    pub async fn entries(&self) -> Result<Vec<CachedEntry>, Error> {
        let store = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<Vec<CachedEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT store, key_hash, method, url, final_url, status_code,
                            response_kind, LENGTH(body), stored_at
                     FROM cache_entries WHERE store = ?1
                     ORDER BY stored_at ASC, url ASC",
                )?;
                let entries = stmt
                    .query_map(params![store], |row| {
                        Ok(CachedEntry {
                            store: row.get(0)?,
                            key_hash: row.get(1)?,
                            method: row.get(2)?,
                            url: row.get(3)?,
                            final_url: row.get(4)?,
                            status_code: column_u16(row, 5)?,
                            response_kind: row.get(6)?,
                            body_len: column_u64(row, 7)?,
                            stored_at: row.get(8)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(entries)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheDb;
    use crate::http::{RequestMode, ResponseKind};

    fn request(path: &str) -> ShellRequest {
        ShellRequest::get(Url::parse("https://app.test").unwrap().join(path).unwrap(), RequestMode::NoCors)
    }

    fn response(path: &str, body: &'static str) -> ShellResponse {
        ShellResponse {
            url: Url::parse("https://app.test").unwrap().join(path).unwrap(),
            status: 200,
            headers: vec![("content-type".into(), "text/html".into())],
            body: Bytes::from_static(body.as_bytes()),
            kind: ResponseKind::Basic,
        }
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("creatrid-v1").await.unwrap();

        store.put(&request("/pricing"), &response("/pricing", "plans")).await.unwrap();

        let hit = store.get(&request("/pricing")).await.unwrap().unwrap();
        assert_eq!(hit, response("/pricing", "plans"));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("creatrid-v1").await.unwrap();
        assert!(store.get(&request("/nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_last_write_wins() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("creatrid-v1").await.unwrap();

        store.put(&request("/blog"), &response("/blog", "old")).await.unwrap();
        store.put(&request("/blog"), &response("/blog", "new")).await.unwrap();

        let hit = store.get(&request("/blog")).await.unwrap().unwrap();
        assert_eq!(&hit.body[..], b"new");
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mode_does_not_affect_key() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("creatrid-v1").await.unwrap();

        store.put(&request("/"), &response("/", "home")).await.unwrap();
        let nav = ShellRequest::navigate(Url::parse("https://app.test/#hero").unwrap());
        assert!(store.get(&nav).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_stores_are_isolated() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let v1 = db.open_store("creatrid-v1").await.unwrap();
        let v2 = db.open_store("creatrid-v2").await.unwrap();

        v1.put(&request("/"), &response("/", "home")).await.unwrap();
        assert!(v2.get(&request("/")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_all() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("creatrid-v1").await.unwrap();

        let pairs = vec![
            (request("/"), response("/", "home")),
            (request("/dashboard"), response("/dashboard", "dash")),
        ];
        assert_eq!(store.put_all(&pairs).await.unwrap(), 2);
        assert_eq!(store.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_delete_store_cascades() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("creatrid-v1").await.unwrap();
        store.put(&request("/"), &response("/", "home")).await.unwrap();

        db.delete_store("creatrid-v1").await.unwrap();

        let reopened = db.open_store("creatrid-v1").await.unwrap();
        assert!(reopened.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("creatrid-v1").await.unwrap();
        store.put(&request("/blog"), &response("/blog", "posts")).await.unwrap();

        assert!(store.delete(&request("/blog")).await.unwrap());
        assert!(!store.delete(&request("/blog")).await.unwrap());
    }

    #[tokio::test]
    async fn test_entries_metadata() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("creatrid-v1").await.unwrap();
        store.put(&request("/discover"), &response("/discover", "creators")).await.unwrap();

        let entries = store.entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].url, "https://app.test/discover");
        assert_eq!(entries[0].method, "GET");
        assert_eq!(entries[0].status_code, 200);
        assert_eq!(entries[0].response_kind, "basic");
        assert_eq!(entries[0].body_len, 8);
    }

    #[tokio::test]
    async fn test_put_into_deleted_store_fails() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("creatrid-v1").await.unwrap();
        db.delete_store("creatrid-v1").await.unwrap();

        let result = store.put(&request("/"), &response("/", "home")).await;
        assert!(matches!(result, Err(Error::Database(_))));
    }

    #[tokio::test]
    async fn test_put_drops_set_cookie() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("creatrid-v1").await.unwrap();

        let mut resp = response("/dashboard", "dash");
        resp.headers.push(("Set-Cookie".into(), "session=alice; HttpOnly".into()));
        resp.headers.push(("set-cookie2".into(), "legacy=1".into()));
        store.put(&request("/dashboard"), &resp).await.unwrap();

        let hit = store.get(&request("/dashboard")).await.unwrap().unwrap();
        assert_eq!(hit.header("set-cookie"), None);
        assert_eq!(hit.header("set-cookie2"), None);
        assert_eq!(hit.header("content-type"), Some("text/html"));
    }

    #[tokio::test]
    async fn test_entries_rejects_out_of_range_status() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("creatrid-v1").await.unwrap();
        store.put(&request("/"), &response("/", "home")).await.unwrap();

        db.conn
            .call(|conn| conn.execute("UPDATE cache_entries SET status_code = 70000", []))
            .await
            .unwrap();

        assert!(store.entries().await.is_err());
        assert!(matches!(store.get(&request("/")).await, Err(Error::CorruptEntry(_))));
    }
}
