//! Queue wait (creation to start) per artifact type.

use crate::config::ArtifactTypeNames;
use crate::jobs::JobRecord;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingByType {
    pub artifact_type_id: String,
    pub name: String,
    pub avg_pending_seconds: f64,
    pub max_pending_seconds: f64,
    pub jobs: usize,
}

/// Groups with the slowest average wait come first. Records without a start
/// time, a positive wait or an artifact type are ignored.
pub fn pending_by_type(records: &[JobRecord], names: &ArtifactTypeNames) -> Vec<PendingByType> {
    let mut order: Vec<&str> = Vec::new();
    let mut waits: HashMap<&str, (f64, f64, usize)> = HashMap::new();

    for record in records {
        let (Some(type_id), Some(wait)) = (record.artifact_type_id.as_deref(), record.pending_seconds())
        else {
            continue;
        };
        let entry = waits.entry(type_id).or_insert_with(|| {
            order.push(type_id);
            (0.0, 0.0, 0)
        });
        entry.0 += wait;
        entry.1 = entry.1.max(wait);
        entry.2 += 1;
    }

    let mut groups: Vec<PendingByType> = order
        .into_iter()
        .map(|type_id| {
            let (sum, max, jobs) = waits[type_id];
            PendingByType {
                artifact_type_id: type_id.to_string(),
                name: names.resolve(type_id).to_string(),
                avg_pending_seconds: sum / jobs as f64,
                max_pending_seconds: max,
                jobs,
            }
        })
        .collect();
    groups.sort_by(|a, b| b.avg_pending_seconds.total_cmp(&a.avg_pending_seconds));
    groups
}
