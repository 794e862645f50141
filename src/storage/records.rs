//! [`RecordSource`] over the SQLite document store.

use super::{sortable_timestamp, Pool};
use crate::analysis::AnalysisError;
use crate::jobs::document::parse_document;
use crate::jobs::JobRecord;
use crate::source::{FetchedRecords, RecordSource};
use crate::window::TimeWindow;
use rusqlite::params;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct SqliteSource {
    pool: Pool,
}

impl SqliteSource {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    fn query(&self, window: &TimeWindow, limit: usize) -> anyhow::Result<Vec<(String, String)>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, body_json FROM job_documents
             WHERE created_at >= ?1 AND created_at < ?2
             ORDER BY created_at DESC, id ASC
             LIMIT ?3",
        )?;

        // One extra row tells us whether the limit cut anything off.
        let probe = i64::try_from(limit).unwrap_or(i64::MAX).saturating_add(1);
        let rows = stmt.query_map(
            params![sortable_timestamp(window.start()), sortable_timestamp(window.end()), probe],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )?;

        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }
}

impl RecordSource for SqliteSource {
    fn fetch(&self, window: &TimeWindow, limit: usize) -> Result<FetchedRecords, AnalysisError> {
        let mut rows = self
            .query(window, limit)
            .map_err(|e| AnalysisError::DataUnavailable(format!("{:#}", e)))?;

        let truncated = rows.len() > limit;
        rows.truncate(limit);

        let mut records: Vec<JobRecord> = Vec::with_capacity(rows.len());
        let mut skipped = 0;
        for (id, body) in rows {
            let parsed = serde_json::from_str(&body)
                .map_err(|e| e.to_string())
                .and_then(|doc| parse_document(&doc).map_err(|e| e.to_string()));
            match parsed {
                Ok(record) => records.push(record),
                Err(reason) => {
                    warn!(%id, %reason, "skipping job document");
                    skipped += 1;
                }
            }
        }

        debug!(returned = records.len(), skipped, truncated, "fetched job records");
        Ok(FetchedRecords {
            records,
            truncated,
            skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ingest_documents, open_pool};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn window() -> TimeWindow {
        TimeWindow::new(
            Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 2, 13, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn seeded() -> anyhow::Result<(tempfile::TempDir, SqliteSource)> {
        let dir = tempfile::tempdir()?;
        let pool = open_pool(dir.path().join("jobs.db").to_str().unwrap())?;
        ingest_documents(
            &pool,
            &[
                json!({ "_id": "before", "status": "completed", "createdAt": "2026-03-02T11:59:59Z" }),
                json!({ "_id": "first", "status": "completed", "createdAt": "2026-03-02T12:00:00Z" }),
                json!({ "_id": "second", "status": "failed", "createdAt": "2026-03-02T12:10:00+00:00",
                        "error": { "name": "ActivityFailure", "rootCauseMessage": "timeout" } }),
                json!({ "_id": "weird", "status": "exploded", "createdAt": "2026-03-02T12:20:00Z" }),
                json!({ "_id": "third", "status": "running", "createdAt": "2026-03-02T12:30:00Z" }),
                json!({ "_id": "after", "status": "running", "createdAt": "2026-03-02T13:00:00Z" }),
            ],
        )?;
        Ok((dir, SqliteSource::new(pool)))
    }

    #[test]
    fn test_fetch_window_newest_first() -> anyhow::Result<()> {
        let (_dir, source) = seeded()?;
        let fetched = source.fetch(&window(), 100)?;

        let ids: Vec<_> = fetched.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["third", "second", "first"]);
        assert_eq!(fetched.skipped, 1);
        assert!(!fetched.truncated);
        Ok(())
    }

    #[test]
    fn test_fetch_reports_truncation() -> anyhow::Result<()> {
        let (_dir, source) = seeded()?;
        let fetched = source.fetch(&window(), 2)?;
        assert!(fetched.truncated);
        Ok(())
    }

    #[test]
    fn test_broken_store_is_data_unavailable() -> anyhow::Result<()> {
        let (_dir, source) = seeded()?;
        source.pool().get()?.execute("DROP TABLE job_documents", [])?;

        let err = source.fetch(&window(), 10).unwrap_err();
        assert!(matches!(err, AnalysisError::DataUnavailable(_)));
        Ok(())
    }
}
