//! Mapping of loosely-typed stored job documents into [`JobRecord`]s.
//!
//! Documents come from a schemaless store and may use MongoDB extended JSON
//! (`{"$oid": ..}`, `{"$date": ..}`). One bad document never fails a batch:
//! fields that cannot be interpreted are treated as absent, and only a
//! document without an id, a creation time or a known status is rejected.

use super::{JobError, JobRecord, JobStatus};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("document is not a JSON object")]
    NotAnObject,
    #[error("document has no usable id")]
    MissingId,
    #[error("document {id} has no usable createdAt")]
    MissingCreatedAt { id: String },
    #[error("document {id} has no status")]
    MissingStatus { id: String },
    #[error("document {id}: {reason}")]
    UnknownStatus { id: String, reason: String },
}

/// Identity and creation time of a document, the two fields the store indexes on.
pub fn document_key(doc: &Value) -> Result<(String, DateTime<Utc>), DocumentError> {
    let obj = doc.as_object().ok_or(DocumentError::NotAnObject)?;
    let id = obj
        .get("_id")
        .or_else(|| obj.get("id"))
        .and_then(identifier)
        .ok_or(DocumentError::MissingId)?;
    let created_at = obj
        .get("createdAt")
        .and_then(timestamp)
        .ok_or_else(|| DocumentError::MissingCreatedAt { id: id.clone() })?;
    Ok((id, created_at))
}

/// Convert a stored document into a validated [`JobRecord`].
pub fn parse_document(doc: &Value) -> Result<JobRecord, DocumentError> {
    let (id, created_at) = document_key(doc)?;

    let status = match doc.get("status").and_then(Value::as_str) {
        Some(raw) => raw
            .parse::<JobStatus>()
            .map_err(|reason| DocumentError::UnknownStatus { id: id.clone(), reason })?,
        None => return Err(DocumentError::MissingStatus { id }),
    };

    let started_at = first_timestamp(doc, &["startTime", "startedAt"]);

    let mut completed_at = first_timestamp(doc, &["completedAt", "finishedAt"]);
    if status == JobStatus::Running && completed_at.is_some() {
        debug!(%id, "dropping completedAt on running job");
        completed_at = None;
    }
    if matches!(completed_at, Some(done) if done < created_at) {
        debug!(%id, "dropping completedAt earlier than createdAt");
        completed_at = None;
    }

    let error = match (status, doc.get("error")) {
        (JobStatus::Failed, Some(raw)) if raw.is_object() => Some(parse_error(raw)),
        (JobStatus::Failed, _) => None,
        (_, Some(raw)) if !raw.is_null() => {
            debug!(%id, %status, "dropping error detail on non-failed job");
            None
        }
        _ => None,
    };

    Ok(JobRecord {
        id,
        status,
        created_at,
        started_at,
        completed_at,
        error,
        artifact_type_id: doc.get("artifactTypeId").and_then(identifier),
    })
}

fn parse_error(raw: &Value) -> JobError {
    JobError {
        error_name: text(raw.get("name")).or_else(|| text(raw.get("errorName"))),
        root_cause_message: text(raw.get("rootCauseMessage")),
        failed_activity_name: raw
            .get("failedActivity")
            .and_then(|a| text(a.get("name")))
            .or_else(|| text(raw.get("failedActivityName"))),
    }
}

fn first_timestamp(doc: &Value, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter().find_map(|k| doc.get(*k).and_then(timestamp))
}

/// Non-blank string content.
fn text(v: Option<&Value>) -> Option<String> {
    let s = v?.as_str()?.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Strings, numbers and `{"$oid": ..}` all identify a document.
fn identifier(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("$oid").and_then(identifier),
        _ => None,
    }
}

/// RFC 3339 text, epoch milliseconds, or `{"$date": <either>}`.
pub(crate) fn timestamp(v: &Value) -> Option<DateTime<Utc>> {
    match v {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::Object(map) => match map.get("$date")? {
            Value::Object(inner) => inner
                .get("$numberLong")
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<i64>().ok())
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
            other => timestamp(other),
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_mongo_extended_json() {
        let doc = json!({
            "_id": { "$oid": "665f1c2e9b1e8a0012345678" },
            "status": "failed",
            "createdAt": { "$date": "2026-03-02T12:00:00Z" },
            "startTime": { "$date": { "$numberLong": "1772452815000" } },
            "completedAt": "2026-03-02T12:05:00Z",
            "artifactTypeId": { "$oid": "64a000000000000000000001" },
            "error": {
                "name": "ActivityFailure",
                "rootCauseMessage": "timeout",
                "failedActivity": { "name": "renderSlides" }
            }
        });

        let record = parse_document(&doc).unwrap();
        assert_eq!(record.id, "665f1c2e9b1e8a0012345678");
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.artifact_type_id.as_deref(), Some("64a000000000000000000001"));
        assert_eq!(record.error_name(), Some("ActivityFailure"));
        assert_eq!(record.root_cause_message(), Some("timeout"));
        assert_eq!(record.failed_activity_name(), Some("renderSlides"));
        assert_eq!(record.duration_seconds(), Some(300.0));
        assert_eq!(record.pending_seconds(), Some(15.0));
    }

    #[test]
    fn test_missing_required_fields_are_rejected() {
        assert_eq!(parse_document(&json!([1, 2])), Err(DocumentError::NotAnObject));
        assert_eq!(
            parse_document(&json!({ "status": "failed", "createdAt": 0 })),
            Err(DocumentError::MissingId)
        );
        assert_eq!(
            parse_document(&json!({ "id": "a", "status": "failed", "createdAt": "yesterday" })),
            Err(DocumentError::MissingCreatedAt { id: "a".to_string() })
        );
        assert!(matches!(
            parse_document(&json!({ "id": "a", "status": "cancelled", "createdAt": 0 })),
            Err(DocumentError::UnknownStatus { .. })
        ));
    }

    #[test]
    fn test_inconsistent_fields_are_dropped() {
        let running = parse_document(&json!({
            "id": "r",
            "status": "running",
            "createdAt": "2026-03-02T12:00:00Z",
            "completedAt": "2026-03-02T12:01:00Z",
            "error": { "name": "Boom" }
        }))
        .unwrap();
        assert_eq!(running.completed_at, None);
        assert_eq!(running.error, None);

        let backwards = parse_document(&json!({
            "id": "b",
            "status": "completed",
            "createdAt": "2026-03-02T12:00:00Z",
            "completedAt": "2026-03-02T11:00:00Z"
        }))
        .unwrap();
        assert_eq!(backwards.status, JobStatus::Succeeded);
        assert_eq!(backwards.completed_at, None);
    }

    #[test]
    fn test_blank_error_fields_are_absent() {
        let record = parse_document(&json!({
            "id": 42,
            "status": "failed",
            "createdAt": 1772452800000_i64,
            "error": { "errorName": "ActivityFailure", "rootCauseMessage": "   " }
        }))
        .unwrap();
        assert_eq!(record.id, "42");
        assert_eq!(record.error_name(), Some("ActivityFailure"));
        assert_eq!(record.root_cause_message(), None);
    }
}
