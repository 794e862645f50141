//! Plain-text rendering of a health report for terminals.

use super::HealthReport;
use std::fmt::Write;

/// Format seconds the way operators read them: `45s`, `12.5m`, `2.1h`.
pub fn format_seconds(secs: f64) -> String {
    if secs < 60.0 {
        format!("{:.0}s", secs)
    } else if secs < 3600.0 {
        format!("{:.1}m", secs / 60.0)
    } else {
        format!("{:.1}h", secs / 3600.0)
    }
}

fn optional_seconds(secs: Option<f64>) -> String {
    secs.map(format_seconds).unwrap_or_else(|| "N/A".to_string())
}

fn percent(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

/// Cut `text` to `max` characters, marking the cut with `...`.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max).collect();
    cut.push_str("...");
    cut
}

/// Human-readable summary listing at most `top` entries per ranking.
pub fn format_summary(report: &HealthReport, top: usize) -> String {
    let m = &report.metrics;
    let e = &report.errors;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Job health {} -> {}{}",
        report.window.start().format("%Y-%m-%d %H:%M"),
        report.window.end().format("%Y-%m-%d %H:%M"),
        report
            .artifact_type
            .as_deref()
            .map(|t| format!(" (artifact type {})", t))
            .unwrap_or_default()
    );
    if report.sample.truncated {
        let _ = writeln!(
            out,
            "WARNING: only the newest {} jobs were analysed (fetch limit reached)",
            report.sample.returned
        );
    }
    if report.sample.skipped > 0 {
        let _ = writeln!(out, "WARNING: {} malformed job documents skipped", report.sample.skipped);
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{:<18} | {}", "Status", m.health_status.to_string().to_uppercase());
    let _ = writeln!(out, "{:<18} | {}", "Total jobs", m.total);
    let _ = writeln!(out, "{:<18} | {} ({})", "Succeeded", m.succeeded, percent(m.success_rate));
    let _ = writeln!(out, "{:<18} | {} ({})", "Failed", m.failed, percent(m.failure_rate));
    let _ = writeln!(out, "{:<18} | {}", "Running", m.running);
    let _ = writeln!(out, "{:<18} | {}", "Avg duration", optional_seconds(m.avg_duration_seconds));
    let _ = writeln!(out, "{:<18} | {}", "Avg pending", optional_seconds(m.avg_pending_seconds));

    if m.failed > 0 {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Failures: {} root, {} cascading, {} without a cause",
            e.root_failures, e.cascading_failures, e.unclassified
        );

        let _ = writeln!(out, "\nTop root causes");
        for cause in e.top_causes.iter().take(top) {
            let _ = writeln!(out, "  {:>6}  {}", cause.count, truncate_chars(&cause.key, 80));
        }

        let _ = writeln!(out, "\nFailed activities");
        for activity in e.activities.iter().take(top) {
            let _ = writeln!(out, "  {:>6}  {}", activity.count, activity.key);
        }
    }

    if !e.artifact_types.is_empty() {
        let _ = writeln!(out, "\n{:<32} | {:>7} | {:>7} | {:>8}", "Artifact type", "Jobs", "Failed", "Fail %");
        let _ = writeln!(out, "{:-<32}-|-{:-<7}-|-{:-<7}-|-{:-<8}", "", "", "", "");
        for group in e.artifact_types.iter().take(top) {
            let _ = writeln!(
                out,
                "{:<32} | {:>7} | {:>7} | {:>8}",
                truncate_chars(&group.name, 29),
                group.total,
                group.failed,
                percent(group.failure_rate)
            );
        }
        if e.unattributed_jobs > 0 {
            let _ = writeln!(out, "{:<32} | {:>7} | {:>7} |", "(no artifact type)", e.unattributed_jobs, e.unattributed_failures);
        }
    }

    if !report.pending_by_type.is_empty() {
        let _ = writeln!(out, "\nSlowest queues");
        for group in report.pending_by_type.iter().take(top) {
            let _ = writeln!(
                out,
                "  {:<32} avg {:>7}  max {:>7}  ({} jobs)",
                truncate_chars(&group.name, 29),
                format_seconds(group.avg_pending_seconds),
                format_seconds(group.max_pending_seconds),
                group.jobs
            );
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisConfig, HealthEngine, ReportRequest};
    use crate::jobs::fixtures::*;
    use crate::source::MemorySource;

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(42.0), "42s");
        assert_eq!(format_seconds(750.0), "12.5m");
        assert_eq!(format_seconds(7560.0), "2.1h");
    }

    #[test]
    fn test_truncate_chars_is_char_safe() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("ééééé", 2), "éé...");
    }

    #[test]
    fn test_summary_mentions_causes_and_status() {
        let records = vec![
            succeeded("a", 0, 90),
            failed("b", 1, "ActivityFailure", Some("timeout")),
            failed("c", 2, "ChildWorkflowFailure", Some("child failed")),
        ];
        let engine = HealthEngine::new(AnalysisConfig::default());
        let report = engine
            .analyze(&MemorySource::new(records), &ReportRequest::default(), at(10))
            .unwrap();

        let text = format_summary(&report, 10);
        assert!(text.contains("CRITICAL"));
        assert!(text.contains("1 root, 1 cascading"));
        assert!(text.contains("timeout"));
        assert!(!text.contains("child failed"));
        assert!(text.contains("Avg pending        | N/A"));
    }
}
