//! Job health analysis: metrics, failure taxonomy, trends.
//!
//! Every report is computed from scratch over one fetched snapshot. The
//! engine holds only immutable configuration, so one instance can serve
//! concurrent requests.

pub mod errors;
pub mod metrics;
pub mod pending;
pub mod summary;
pub mod timeline;

use crate::config::ArtifactTypeNames;
use crate::jobs::JobRecord;
use crate::source::RecordSource;
use crate::window::{TimeWindow, WindowSelection};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use self::errors::{analyze_errors, ErrorBreakdown, ErrorPolicy};
use self::metrics::{aggregate, AggregateMetrics, HealthThresholds};
use self::pending::{pending_by_type, PendingByType};
use self::timeline::{build_timeline, BucketTable, TimelineSeries};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid time range: start {start} is not before end {end}")]
    InvalidRange { start: String, end: String },
    #[error("job records unavailable: {0}")]
    DataUnavailable(String),
}

impl AnalysisError {
    /// Whether re-running the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AnalysisError::DataUnavailable(_))
    }
}

/// Everything the engine needs, fixed at construction.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub fetch_limit: usize,
    pub recent_limit: usize,
    pub thresholds: HealthThresholds,
    pub errors: ErrorPolicy,
    pub buckets: BucketTable,
    pub artifact_names: ArtifactTypeNames,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fetch_limit: 10_000,
            recent_limit: 50,
            thresholds: HealthThresholds::default(),
            errors: ErrorPolicy::default(),
            buckets: BucketTable::default(),
            artifact_names: ArtifactTypeNames::default(),
        }
    }
}

/// One operator request.
#[derive(Debug, Clone, Default)]
pub struct ReportRequest {
    pub selection: WindowSelection,
    /// Restrict the analysis to one artifact type id.
    pub artifact_type: Option<String>,
}

/// How complete the analysed snapshot is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SampleSummary {
    /// Records returned by the source.
    pub returned: usize,
    pub limit: usize,
    /// The source held more matching records than `limit`; every figure
    /// below covers only the `returned` newest ones.
    pub truncated: bool,
    /// Documents the source could not map to a record.
    pub skipped: usize,
    pub outside_window: usize,
    pub filtered_out: usize,
    /// Records actually analysed.
    pub analysed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub report_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub window: TimeWindow,
    pub artifact_type: Option<String>,
    pub sample: SampleSummary,
    pub metrics: AggregateMetrics,
    pub errors: ErrorBreakdown,
    pub timeline: TimelineSeries,
    pub pending_by_type: Vec<PendingByType>,
    /// Newest first.
    pub recent: Vec<JobRecord>,
}

/// A window's records as handed to analysis or export.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub window: TimeWindow,
    pub records: Vec<JobRecord>,
    pub sample: SampleSummary,
}

pub struct HealthEngine {
    config: AnalysisConfig,
}

impl HealthEngine {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Resolve the window and fetch its records. Range errors are raised
    /// before the source is touched.
    pub fn snapshot(
        &self,
        source: &dyn RecordSource,
        request: &ReportRequest,
        now: DateTime<Utc>,
    ) -> Result<Snapshot, AnalysisError> {
        let window = TimeWindow::resolve(&request.selection, now)?;
        debug!(start = %window.start(), end = %window.end(), "fetching job records");

        let fetched = source.fetch(&window, self.config.fetch_limit)?;
        let returned = fetched.records.len();
        if fetched.truncated {
            warn!(
                limit = self.config.fetch_limit,
                "fetch hit the record limit; results cover only the newest jobs"
            );
        }
        if fetched.skipped > 0 {
            warn!(skipped = fetched.skipped, "skipped malformed job documents");
        }

        let (in_window, outside): (Vec<_>, Vec<_>) = fetched
            .records
            .into_iter()
            .partition(|r| window.contains(r.created_at));
        if !outside.is_empty() {
            warn!(count = outside.len(), "source returned records outside the window");
        }

        let before_filter = in_window.len();
        let records: Vec<JobRecord> = match request.artifact_type.as_deref() {
            Some(wanted) => in_window
                .into_iter()
                .filter(|r| r.artifact_type_id.as_deref() == Some(wanted))
                .collect(),
            None => in_window,
        };

        let sample = SampleSummary {
            returned,
            limit: self.config.fetch_limit,
            truncated: fetched.truncated,
            skipped: fetched.skipped,
            outside_window: outside.len(),
            filtered_out: before_filter - records.len(),
            analysed: records.len(),
        };
        Ok(Snapshot { window, records, sample })
    }

    /// Run the full pipeline for one request.
    pub fn analyze(
        &self,
        source: &dyn RecordSource,
        request: &ReportRequest,
        now: DateTime<Utc>,
    ) -> Result<HealthReport, AnalysisError> {
        let snapshot = self.snapshot(source, request, now)?;
        Ok(self.report(snapshot, request.artifact_type.clone(), now))
    }

    /// Derive every report section from an already fetched snapshot.
    pub fn report(&self, snapshot: Snapshot, artifact_type: Option<String>, now: DateTime<Utc>) -> HealthReport {
        let Snapshot { window, records, sample } = snapshot;
        let cfg = &self.config;

        let metrics = aggregate(&records, &cfg.thresholds);
        let errors = analyze_errors(&records, &cfg.errors, &cfg.artifact_names);
        let timeline = build_timeline(&records, &window, &cfg.buckets);
        let pending_by_type = pending_by_type(&records, &cfg.artifact_names);
        debug!(
            total = metrics.total,
            failed = metrics.failed,
            health = %metrics.health_status,
            buckets = timeline.buckets.len(),
            "analysis complete"
        );

        let mut recent = records;
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent.truncate(cfg.recent_limit);

        HealthReport {
            report_id: Uuid::new_v4(),
            generated_at: now,
            window,
            artifact_type,
            sample,
            metrics,
            errors,
            timeline,
            pending_by_type,
            recent,
        }
    }
}
