//! Summary health metrics over a record set.

use crate::jobs::{JobRecord, JobStatus};
use serde::{Deserialize, Serialize};

/// Health classification derived from the failure rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Critical,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Critical => write!(f, "critical"),
        }
    }
}

/// Failure-rate thresholds. A rate below `degraded_failure_rate` is healthy,
/// one at or above `critical_failure_rate` is critical.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthThresholds {
    pub degraded_failure_rate: f64,
    pub critical_failure_rate: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            degraded_failure_rate: 0.05,
            critical_failure_rate: 0.20,
        }
    }
}

impl HealthThresholds {
    pub fn classify(&self, failure_rate: f64) -> HealthStatus {
        if failure_rate >= self.critical_failure_rate {
            HealthStatus::Critical
        } else if failure_rate >= self.degraded_failure_rate {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let (d, c) = (self.degraded_failure_rate, self.critical_failure_rate);
        if !(0.0..=1.0).contains(&d) || !(0.0..=1.0).contains(&c) || d >= c {
            anyhow::bail!(
                "health thresholds must satisfy 0 <= degraded ({}) < critical ({}) <= 1",
                d,
                c
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateMetrics {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub running: usize,
    pub success_rate: f64,
    pub failure_rate: f64,
    /// `None` when no record has both timestamps.
    pub avg_duration_seconds: Option<f64>,
    /// Mean queue wait, `None` when no record carries a positive wait.
    pub avg_pending_seconds: Option<f64>,
    pub health_status: HealthStatus,
}

/// Count, rate and average over `records`.
pub fn aggregate(records: &[JobRecord], thresholds: &HealthThresholds) -> AggregateMetrics {
    let total = records.len();
    let (mut succeeded, mut failed, mut running) = (0, 0, 0);
    for record in records {
        match record.status {
            JobStatus::Succeeded => succeeded += 1,
            JobStatus::Failed => failed += 1,
            JobStatus::Running => running += 1,
        }
    }

    let success_rate = ratio(succeeded, total);
    let failure_rate = ratio(failed, total);

    AggregateMetrics {
        total,
        succeeded,
        failed,
        running,
        success_rate,
        failure_rate,
        avg_duration_seconds: mean(records.iter().filter_map(JobRecord::duration_seconds)),
        avg_pending_seconds: mean(records.iter().filter_map(JobRecord::pending_seconds)),
        health_status: thresholds.classify(failure_rate),
    }
}

/// `part / whole`, zero for an empty whole.
pub(crate) fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

pub(crate) fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}
