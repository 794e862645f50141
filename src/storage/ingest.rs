//! Loading job documents into the store.
//!
//! Input is either one JSON array of documents or newline-delimited JSON.
//! Documents are upserted by id, so a later snapshot of a job (e.g. `running`
//! then `completed`) replaces the earlier one.

use super::{sortable_timestamp, Pool};
use crate::jobs::document::document_key;
use crate::jobs::JobStatus;
use anyhow::{Context, Result};
use rusqlite::params;
use serde::Serialize;
use serde_json::Value;
use std::io::BufRead;
use tracing::{info, warn};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub stored: usize,
    /// Documents without a usable id or creation time.
    pub rejected: usize,
}

/// Parse a JSON array or an NDJSON stream. Blank NDJSON lines are ignored;
/// a line that is not JSON fails the whole read with its line number.
pub fn read_documents(reader: impl BufRead) -> Result<Vec<Value>> {
    let mut lines = Vec::new();
    for line in reader.lines() {
        lines.push(line.context("failed to read input")?);
    }

    let first = lines
        .iter()
        .map(|l| l.trim())
        .find(|l| !l.is_empty());
    if matches!(first, Some(l) if l.starts_with('[')) {
        let whole = lines.join("\n");
        let docs: Vec<Value> = serde_json::from_str(&whole).context("input is not a JSON array")?;
        return Ok(docs);
    }

    let mut docs = Vec::new();
    for (n, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let doc = serde_json::from_str(line).with_context(|| format!("line {} is not valid JSON", n + 1))?;
        docs.push(doc);
    }
    Ok(docs)
}

/// Upsert `docs` in one transaction.
pub fn ingest_documents(pool: &Pool, docs: &[Value]) -> Result<IngestSummary> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    let mut summary = IngestSummary::default();
    {
        let mut stmt = tx.prepare(
            "INSERT INTO job_documents (id, created_at, status, body_json, ingested_at)
             VALUES (?1, ?2, ?3, ?4, datetime('now'))
             ON CONFLICT(id) DO UPDATE SET
                created_at = excluded.created_at,
                status = excluded.status,
                body_json = excluded.body_json,
                ingested_at = excluded.ingested_at",
        )?;

        for doc in docs {
            let (id, created_at) = match document_key(doc) {
                Ok(key) => key,
                Err(e) => {
                    warn!(error = %e, "rejecting job document");
                    summary.rejected += 1;
                    continue;
                }
            };
            let status = doc.get("status").and_then(Value::as_str).map(stored_status);
            stmt.execute(params![
                id,
                sortable_timestamp(created_at),
                status,
                serde_json::to_string(doc)?
            ])
            .with_context(|| format!("failed to store job document {}", id))?;
            summary.stored += 1;
        }
    }
    tx.commit()?;

    info!(stored = summary.stored, rejected = summary.rejected, "ingested job documents");
    Ok(summary)
}

/// Known statuses are stored under their canonical name so they can be
/// counted in SQL; anything else is kept lower-cased as given.
fn stored_status(raw: &str) -> String {
    raw.parse::<JobStatus>()
        .map(|s| s.to_string())
        .unwrap_or_else(|_| raw.trim().to_lowercase())
}
