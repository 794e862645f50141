//! Download-ready exports of already fetched job records.
//!
//! Exports never query the store; they only reshape the records they are given.

use crate::analysis::errors::ErrorPolicy;
use crate::config::{ArtifactTypeNames, ExportConfig};
use crate::jobs::{JobRecord, JobStatus};
use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    /// JSON array, one object per failed job.
    FailedJobs,
    /// CSV, one row per job.
    AllJobs,
}

impl ExportKind {
    pub fn content_type(self) -> &'static str {
        match self {
            ExportKind::FailedJobs => "application/json",
            ExportKind::AllJobs => "text/csv; charset=utf-8",
        }
    }

    /// e.g. `failed_jobs_20260302_120000.json`
    pub fn file_name(self, at: DateTime<Utc>) -> String {
        let stamp = at.format("%Y%m%d_%H%M%S");
        match self {
            ExportKind::FailedJobs => format!("failed_jobs_{}.json", stamp),
            ExportKind::AllJobs => format!("jobs_{}.csv", stamp),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailedExportOptions {
    pub omit_cascading: bool,
    pub message_max_chars: usize,
    pub limit: usize,
}

impl From<&ExportConfig> for FailedExportOptions {
    fn from(cfg: &ExportConfig) -> Self {
        Self {
            omit_cascading: cfg.omit_cascading,
            message_max_chars: cfg.message_max_chars,
            limit: cfg.failed_limit,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportedError<'a> {
    error_name: Option<&'a str>,
    root_cause_message: Option<String>,
    failed_activity_name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportedFailure<'a> {
    id: &'a str,
    status: JobStatus,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    artifact_type_id: Option<&'a str>,
    artifact_type_name: Option<&'a str>,
    error: Option<ExportedError<'a>>,
}

/// Failed jobs, newest first, as a pretty-printed JSON array.
pub fn export_failed_jobs(
    records: &[JobRecord],
    policy: &ErrorPolicy,
    names: &ArtifactTypeNames,
    opts: &FailedExportOptions,
) -> Result<Vec<u8>> {
    let mut failed: Vec<&JobRecord> = records
        .iter()
        .filter(|r| r.is_failed())
        .filter(|r| !(opts.omit_cascading && policy.is_cascading(r)))
        .collect();
    failed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    failed.truncate(opts.limit);

    let rows: Vec<ExportedFailure<'_>> = failed
        .into_iter()
        .map(|r| {
            let type_id = r.artifact_type_id.as_deref();
            ExportedFailure {
                id: &r.id,
                status: r.status,
                created_at: r.created_at,
                completed_at: r.completed_at,
                artifact_type_id: type_id,
                artifact_type_name: type_id.map(|t| names.resolve(t)),
                error: r.error.as_ref().map(|e| ExportedError {
                    error_name: e.error_name.as_deref(),
                    root_cause_message: e
                        .root_cause_message
                        .as_deref()
                        .map(|m| m.chars().take(opts.message_max_chars).collect()),
                    failed_activity_name: e.failed_activity_name.as_deref(),
                }),
            }
        })
        .collect();

    Ok(serde_json::to_vec_pretty(&rows)?)
}

const CSV_HEADER: [&str; 11] = [
    "id",
    "status",
    "createdAt",
    "startedAt",
    "completedAt",
    "durationSeconds",
    "artifactTypeId",
    "artifactTypeName",
    "errorName",
    "rootCauseMessage",
    "failedActivityName",
];

/// Every job as one flattened CSV row, in input order.
pub fn export_all_jobs(records: &[JobRecord], names: &ArtifactTypeNames) -> Vec<u8> {
    let mut out = String::new();
    out.push_str(&CSV_HEADER.join(","));
    out.push_str("\r\n");

    for r in records {
        let time = |t: Option<DateTime<Utc>>| {
            t.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
                .unwrap_or_default()
        };
        let type_id = r.artifact_type_id.as_deref().unwrap_or_default();
        let fields = [
            r.id.clone(),
            r.status.to_string(),
            time(Some(r.created_at)),
            time(r.started_at),
            time(r.completed_at),
            r.duration_seconds().map(|d| d.to_string()).unwrap_or_default(),
            type_id.to_string(),
            if type_id.is_empty() { String::new() } else { names.resolve(type_id).to_string() },
            r.error_name().unwrap_or_default().to_string(),
            r.root_cause_message().unwrap_or_default().to_string(),
            r.failed_activity_name().unwrap_or_default().to_string(),
        ];
        let row: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
        let _ = write!(out, "{}\r\n", row.join(","));
    }
    out.into_bytes()
}

/// Quote a field when it holds a separator, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
