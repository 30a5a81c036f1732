//! Schema migrations for the cache database.
//!
//! Each migration is one numbered SQL file under `migrations/`. A file is
//! applied in the same transaction that records its version and name in
//! `_migrations`, so a failed file leaves no trace.

use tokio_rusqlite::{Connection, params, rusqlite};

use super::Error;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration { version: 1, name: "001_cache_stores", sql: include_str!("../../migrations/001_cache_stores.sql") },
    Migration { version: 2, name: "002_cache_entries", sql: include_str!("../../migrations/002_cache_entries.sql") },
];

const LEDGER_SQL: &str = "CREATE TABLE IF NOT EXISTS _migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL
)";

/// Apply every migration newer than the highest recorded version.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute_batch(LEDGER_SQL)?;
        let applied: i64 = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;

        for migration in MIGRATIONS.iter().filter(|m| m.version > applied) {
            apply(conn, migration).map_err(|e| Error::MigrationFailed(format!("{}: {e}", migration.name)))?;
            tracing::debug!(version = migration.version, name = migration.name, "applied cache migration");
        }
        Ok(())
    })
    .await
    .map_err(Error::from)
}

fn apply(conn: &mut rusqlite::Connection, migration: &Migration) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(migration.sql)?;
    tx.execute(
        "INSERT INTO _migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
        params![migration.version, migration.name, chrono::Utc::now().to_rfc3339()],
    )?;
    tx.commit()
}
