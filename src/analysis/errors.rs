//! Failure taxonomy: root causes vs cascading failures, ranked causes, and
//! per-activity / per-artifact-type failure breakdowns.
//!
//! Classification is per record and keyed only on the error name. A cascading
//! failure (a parent workflow reporting that a child failed) is counted, but
//! never linked back to the specific root failure that triggered it.

use crate::config::ArtifactTypeNames;
use crate::jobs::{JobRecord, JobStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::metrics::ratio;

/// Bucket label for failures without a cause or activity.
pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorPolicy {
    /// Error names that wrap a failure reported by a child unit of work.
    pub cascading_error_names: Vec<String>,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self {
            cascading_error_names: vec!["ChildWorkflowFailure".to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    Root,
    Cascading,
}

impl ErrorPolicy {
    pub fn classify(&self, record: &JobRecord) -> FailureClass {
        match record.error_name() {
            Some(name) if self.cascading_error_names.iter().any(|c| c == name) => {
                FailureClass::Cascading
            }
            _ => FailureClass::Root,
        }
    }

    pub fn is_cascading(&self, record: &JobRecord) -> bool {
        self.classify(record) == FailureClass::Cascading
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedCount {
    pub key: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactTypeHealth {
    pub artifact_type_id: String,
    pub name: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failure_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBreakdown {
    pub root_failures: usize,
    pub cascading_failures: usize,
    /// Failed records carrying no root cause message.
    pub unclassified: usize,
    /// Root failures grouped by root cause message, most frequent first.
    pub top_causes: Vec<RankedCount>,
    /// Root failures grouped by failed activity, most frequent first.
    pub activities: Vec<RankedCount>,
    /// Every record grouped by artifact type, most failures first.
    pub artifact_types: Vec<ArtifactTypeHealth>,
    /// Records without an artifact type, kept out of `artifact_types`.
    pub unattributed_jobs: usize,
    pub unattributed_failures: usize,
}

impl ErrorBreakdown {
    pub fn total_failures(&self) -> usize {
        self.root_failures + self.cascading_failures
    }
}

/// Break down the failures in `records`. Non-failed records only contribute
/// to the artifact type totals.
pub fn analyze_errors(
    records: &[JobRecord],
    policy: &ErrorPolicy,
    names: &ArtifactTypeNames,
) -> ErrorBreakdown {
    let failures: Vec<&JobRecord> = records.iter().filter(|r| r.is_failed()).collect();

    let mut root_failures = 0;
    let mut cascading_failures = 0;
    let mut causes = Ranking::default();
    let mut activities = Ranking::default();

    for record in &failures {
        match policy.classify(record) {
            FailureClass::Root => {
                root_failures += 1;
                causes.add(record.root_cause_message().unwrap_or(UNKNOWN));
                activities.add(record.failed_activity_name().unwrap_or(UNKNOWN));
            }
            // The wrapped child failure is counted on its own record.
            FailureClass::Cascading => cascading_failures += 1,
        }
    }

    let unclassified = failures
        .iter()
        .filter(|r| r.root_cause_message().is_none())
        .count();

    let (artifact_types, unattributed_jobs, unattributed_failures) =
        artifact_type_health(records, names);

    ErrorBreakdown {
        root_failures,
        cascading_failures,
        unclassified,
        top_causes: causes.into_ranked(),
        activities: activities.into_ranked(),
        artifact_types,
        unattributed_jobs,
        unattributed_failures,
    }
}

fn artifact_type_health(
    records: &[JobRecord],
    names: &ArtifactTypeNames,
) -> (Vec<ArtifactTypeHealth>, usize, usize) {
    let mut groups: Vec<ArtifactTypeHealth> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    let (mut unattributed_jobs, mut unattributed_failures) = (0, 0);

    for record in records {
        let Some(type_id) = record.artifact_type_id.as_deref() else {
            unattributed_jobs += 1;
            if record.is_failed() {
                unattributed_failures += 1;
            }
            continue;
        };
        let slot = *index.entry(type_id).or_insert_with(|| {
            groups.push(ArtifactTypeHealth {
                artifact_type_id: type_id.to_string(),
                name: names.resolve(type_id).to_string(),
                total: 0,
                succeeded: 0,
                failed: 0,
                failure_rate: 0.0,
            });
            groups.len() - 1
        });
        let group = &mut groups[slot];
        group.total += 1;
        match record.status {
            JobStatus::Succeeded => group.succeeded += 1,
            JobStatus::Failed => group.failed += 1,
            JobStatus::Running => {}
        }
    }

    for group in &mut groups {
        group.failure_rate = ratio(group.failed, group.total);
    }
    // Stable: ties keep first-seen order.
    groups.sort_by(|a, b| b.failed.cmp(&a.failed).then(b.total.cmp(&a.total)));

    (groups, unattributed_jobs, unattributed_failures)
}

/// Occurrence counter that remembers first-seen order for tie-breaking.
#[derive(Default)]
struct Ranking {
    entries: Vec<RankedCount>,
    index: HashMap<String, usize>,
}

impl Ranking {
    fn add(&mut self, key: &str) {
        match self.index.get(key) {
            Some(&i) => self.entries[i].count += 1,
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push(RankedCount {
                    key: key.to_string(),
                    count: 1,
                });
            }
        }
    }

    fn into_ranked(mut self) -> Vec<RankedCount> {
        self.entries.sort_by(|a, b| b.count.cmp(&a.count));
        self.entries
    }
}
