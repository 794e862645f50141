//! API route definitions.

use super::state::AppState;
use super::ApiError;
use crate::analysis::{HealthReport, ReportRequest};
use crate::export::{export_all_jobs, export_failed_jobs, ExportKind, FailedExportOptions};
use crate::storage::{document_count, status_counts};
use crate::window::{WindowPreset, WindowSelection};
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::{routing::get, Json, Router};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/report", get(report))
        .route("/export/failed", get(export_failed))
        .route("/export/jobs", get(export_jobs))
}

/// Window and filter selection shared by report and export endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct WindowParams {
    pub range: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub artifact_type: Option<String>,
    pub include_cascading: Option<bool>,
}

impl WindowParams {
    pub fn to_request(&self) -> Result<ReportRequest, ApiError> {
        let selection = match (self.start, self.end, self.range.as_deref()) {
            (Some(start), Some(end), None) => WindowSelection::Dates { start, end },
            (None, None, Some(range)) => {
                WindowSelection::Preset(range.parse::<WindowPreset>().map_err(ApiError::BadRequest)?)
            }
            (None, None, None) => WindowSelection::default(),
            (_, _, Some(_)) => {
                return Err(ApiError::BadRequest(
                    "use either range or start/end, not both".to_string(),
                ))
            }
            _ => {
                return Err(ApiError::BadRequest(
                    "start and end must be given together".to_string(),
                ))
            }
        };
        Ok(ReportRequest {
            selection,
            artifact_type: self.artifact_type.clone().filter(|t| !t.is_empty()),
        })
    }
}

async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let pool = state.source.pool().clone();
    let (documents, statuses) = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        Ok((document_count(&pool)?, status_counts(&pool)?))
    })
    .await??;
    Ok(Json(json!({
        "data": {
            "status": "ok",
            "documents": documents,
            "statuses": statuses,
            "version": env!("CARGO_PKG_VERSION")
        },
        "meta": {
            "timestamp": Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION")
        }
    })))
}

async fn report(
    State(state): State<AppState>,
    Query(params): Query<WindowParams>,
) -> Result<Json<HealthReport>, ApiError> {
    let request = params.to_request()?;
    let report = tokio::task::spawn_blocking(move || {
        state.engine.analyze(&state.source, &request, Utc::now())
    })
    .await??;
    Ok(Json(report))
}

async fn export_failed(
    State(state): State<AppState>,
    Query(params): Query<WindowParams>,
) -> Result<impl IntoResponse, ApiError> {
    let request = params.to_request()?;
    let mut options = FailedExportOptions::from(&state.export);
    if let Some(include) = params.include_cascading {
        options.omit_cascading = !include;
    }

    let body = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, ApiError> {
        let snapshot = state.engine.snapshot(&state.source, &request, Utc::now())?;
        let cfg = state.engine.config();
        Ok(export_failed_jobs(&snapshot.records, &cfg.errors, &cfg.artifact_names, &options)?)
    })
    .await??;

    Ok(attachment(ExportKind::FailedJobs, body))
}

async fn export_jobs(
    State(state): State<AppState>,
    Query(params): Query<WindowParams>,
) -> Result<impl IntoResponse, ApiError> {
    let request = params.to_request()?;
    let body = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, ApiError> {
        let snapshot = state.engine.snapshot(&state.source, &request, Utc::now())?;
        Ok(export_all_jobs(&snapshot.records, &state.engine.config().artifact_names))
    })
    .await??;

    Ok(attachment(ExportKind::AllJobs, body))
}

fn attachment(kind: ExportKind, body: Vec<u8>) -> impl IntoResponse {
    let disposition = format!("attachment; filename=\"{}\"", kind.file_name(Utc::now()));
    (
        [
            (header::CONTENT_TYPE, kind.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
}
