//! Fixed-width time buckets of job counts for trend display.

use crate::jobs::{JobRecord, JobStatus};
use crate::window::TimeWindow;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::metrics::ratio;

/// Windows spanning at most `max_span_secs` use buckets `width_secs` wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketStep {
    pub max_span_secs: i64,
    pub width_secs: i64,
}

/// Step function from window span to bucket width, ordered by span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketTable {
    pub steps: Vec<BucketStep>,
    /// Width for windows longer than the last step.
    pub fallback_width_secs: i64,
    /// Widths are scaled up by whole multiples to stay within this many buckets.
    pub max_buckets: usize,
}

impl Default for BucketTable {
    fn default() -> Self {
        const MIN: i64 = 60;
        const HOUR: i64 = 60 * MIN;
        const DAY: i64 = 24 * HOUR;
        Self {
            steps: vec![
                BucketStep { max_span_secs: HOUR, width_secs: MIN },
                BucketStep { max_span_secs: 6 * HOUR, width_secs: 5 * MIN },
                BucketStep { max_span_secs: 2 * DAY, width_secs: 15 * MIN },
                BucketStep { max_span_secs: 7 * DAY, width_secs: HOUR },
                BucketStep { max_span_secs: 60 * DAY, width_secs: 6 * HOUR },
            ],
            fallback_width_secs: DAY,
            max_buckets: 200,
        }
    }
}

impl BucketTable {
    pub fn width_for(&self, span: Duration) -> Duration {
        let span_secs = span.num_seconds();
        let width = self
            .steps
            .iter()
            .find(|s| span_secs <= s.max_span_secs)
            .map(|s| s.width_secs)
            .unwrap_or(self.fallback_width_secs)
            .max(1);

        let width_ms = width * 1000;
        let span_ms = span.num_milliseconds().max(0);
        let needed = (span_ms + width_ms - 1) / width_ms;
        let max = i64::try_from(self.max_buckets.max(1)).unwrap_or(i64::MAX);
        let factor = if needed <= max { 1 } else { (needed - 1) / max + 1 };
        Duration::seconds(width * factor)
    }

    /// Spans must strictly increase and widths must never shrink, so a longer
    /// window never gets finer buckets.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.steps.is_empty() {
            anyhow::bail!("timeline step table is empty");
        }
        if self.max_buckets == 0 {
            anyhow::bail!("timeline.max_buckets must be at least 1");
        }
        let mut prev: Option<BucketStep> = None;
        for step in &self.steps {
            if step.width_secs <= 0 || step.max_span_secs <= 0 {
                anyhow::bail!("timeline step {:?} must have positive span and width", step);
            }
            if let Some(p) = prev {
                if step.max_span_secs <= p.max_span_secs || step.width_secs < p.width_secs {
                    anyhow::bail!("timeline steps are not monotonic at {:?}", step);
                }
            }
            prev = Some(*step);
        }
        let last = self.steps[self.steps.len() - 1];
        if self.fallback_width_secs < last.width_secs {
            anyhow::bail!(
                "fallback bucket width {}s is finer than the last step ({}s)",
                self.fallback_width_secs,
                last.width_secs
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub succeeded: usize,
    pub failed: usize,
    pub running: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.running
    }

    fn add(&mut self, status: JobStatus) {
        match status {
            JobStatus::Succeeded => self.succeeded += 1,
            JobStatus::Failed => self.failed += 1,
            JobStatus::Running => self.running += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineBucket {
    pub start: DateTime<Utc>,
    /// Exclusive. Equals the next bucket's start; the last bucket is clipped to the window end.
    pub end: DateTime<Utc>,
    pub counts: StatusCounts,
    pub total: usize,
    pub failure_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineSeries {
    pub bucket_width_secs: i64,
    /// Every bucket of the window in order, empty ones included.
    pub buckets: Vec<TimelineBucket>,
    /// Records created outside the window, not placed in any bucket.
    pub outside_window: usize,
}

impl TimelineSeries {
    pub fn total(&self) -> usize {
        self.buckets.iter().map(|b| b.total).sum()
    }
}

pub fn build_timeline(records: &[JobRecord], window: &TimeWindow, table: &BucketTable) -> TimelineSeries {
    let width = table.width_for(window.span());
    let width_ms = width.num_milliseconds().max(1);
    let span_ms = window.span().num_milliseconds();
    let bucket_count = ((span_ms + width_ms - 1) / width_ms).max(1) as usize;

    let mut counts = vec![StatusCounts::default(); bucket_count];
    let mut outside_window = 0;
    for record in records {
        if !window.contains(record.created_at) {
            outside_window += 1;
            continue;
        }
        let offset_ms = (record.created_at - window.start()).num_milliseconds();
        let slot = ((offset_ms / width_ms) as usize).min(bucket_count - 1);
        counts[slot].add(record.status);
    }

    let buckets = counts
        .into_iter()
        .enumerate()
        .map(|(i, counts)| {
            let start = window.start() + Duration::milliseconds(width_ms * i as i64);
            let end = (start + Duration::milliseconds(width_ms)).min(window.end());
            TimelineBucket {
                start,
                end,
                counts,
                total: counts.total(),
                failure_rate: ratio(counts.failed, counts.total()),
            }
        })
        .collect();

    TimelineSeries {
        bucket_width_secs: width.num_seconds(),
        buckets,
        outside_window,
    }
}
