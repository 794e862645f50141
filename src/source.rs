//! Record query contract between the analysis engine and whatever store holds job documents.

use crate::analysis::AnalysisError;
use crate::jobs::JobRecord;
use crate::window::TimeWindow;

/// Result of a bounded fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchedRecords {
    /// Newest first.
    pub records: Vec<JobRecord>,
    /// More matching records existed beyond the limit.
    pub truncated: bool,
    /// Documents that matched the window but failed validation.
    pub skipped: usize,
}

/// Returns job records created inside a window, newest first, at most `limit` of them.
///
/// Implementations own retries and timeouts; a failure is reported once as
/// [`AnalysisError::DataUnavailable`].
pub trait RecordSource: Send + Sync {
    fn fetch(&self, window: &TimeWindow, limit: usize) -> Result<FetchedRecords, AnalysisError>;
}

/// A fixed set of records held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: Vec<JobRecord>,
}

impl MemorySource {
    pub fn new(records: Vec<JobRecord>) -> Self {
        Self { records }
    }
}

impl RecordSource for MemorySource {
    fn fetch(&self, window: &TimeWindow, limit: usize) -> Result<FetchedRecords, AnalysisError> {
        let mut matching: Vec<JobRecord> = self
            .records
            .iter()
            .filter(|r| window.contains(r.created_at))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let truncated = matching.len() > limit;
        matching.truncate(limit);
        Ok(FetchedRecords {
            records: matching,
            truncated,
            skipped: 0,
        })
    }
}
