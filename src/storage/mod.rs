//! SQLite document store -- schema, ingest, and the record source over it.

pub mod ingest;
pub mod records;
pub mod schema;

pub use self::ingest::{ingest_documents, read_documents, IngestSummary};
pub use self::records::SqliteSource;

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use r2d2::Pool as R2D2Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::collections::BTreeMap;

/// Connection Pool type
pub type Pool = R2D2Pool<SqliteConnectionManager>;

/// Open (or create) the SQLite database and return a connection pool.
pub fn open_pool(path: &str) -> Result<Pool> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let manager = SqliteConnectionManager::file(path).with_init(|c| {
        c.execute_batch(
            "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA temp_store = MEMORY;
                 PRAGMA busy_timeout = 5000;",
        )
    });

    let pool = R2D2Pool::new(manager)?;

    // Run migrations on a single connection
    let conn = pool.get()?;
    schema::migrate(&conn)?;

    Ok(pool)
}

/// Number of stored job documents.
pub fn document_count(pool: &Pool) -> Result<u64> {
    let conn = pool.get()?;
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM job_documents", [], |row| row.get(0))?;
    Ok(count as u64)
}

/// Stored documents per status; documents without one count as `unknown`.
pub fn status_counts(pool: &Pool) -> Result<BTreeMap<String, u64>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT COALESCE(status, 'unknown'), COUNT(*) FROM job_documents GROUP BY 1",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;

    let mut counts = BTreeMap::new();
    for row in rows {
        let (status, count) = row?;
        *counts.entry(status).or_insert(0) += count as u64;
    }
    Ok(counts)
}

/// Fixed-width UTC text so that string order is time order in SQL.
/// Instants outside years 1..=9999 are clamped to that range, whose text
/// stays four-digit and unsigned.
pub(crate) fn sortable_timestamp(at: DateTime<Utc>) -> String {
    let first = Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).single();
    let last = Utc
        .with_ymd_and_hms(9999, 12, 31, 23, 59, 59)
        .single()
        .map(|t| t + chrono::Duration::milliseconds(999));
    let mut at = at;
    if let Some(first) = first {
        at = at.max(first);
    }
    if let Some(last) = last {
        at = at.min(last);
    }
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
