//! Time window resolution for analysis requests.
//!
//! A request names either a rolling preset ending "now" or an explicit pair of
//! calendar dates (UTC) covering whole days. Resolution is pure: `now` is an
//! argument, never read from the clock here.

use crate::analysis::AnalysisError;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Operator-selectable rolling windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowPreset {
    LastHour,
    #[serde(rename = "last-6-hours")]
    Last6Hours,
    #[serde(rename = "last-24-hours")]
    Last24Hours,
    #[serde(rename = "last-7-days")]
    Last7Days,
    #[serde(rename = "last-30-days")]
    Last30Days,
}

impl WindowPreset {
    pub const ALL: [WindowPreset; 5] = [
        WindowPreset::LastHour,
        WindowPreset::Last6Hours,
        WindowPreset::Last24Hours,
        WindowPreset::Last7Days,
        WindowPreset::Last30Days,
    ];

    pub fn span(self) -> Duration {
        match self {
            WindowPreset::LastHour => Duration::hours(1),
            WindowPreset::Last6Hours => Duration::hours(6),
            WindowPreset::Last24Hours => Duration::hours(24),
            WindowPreset::Last7Days => Duration::days(7),
            WindowPreset::Last30Days => Duration::days(30),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WindowPreset::LastHour => "last-hour",
            WindowPreset::Last6Hours => "last-6-hours",
            WindowPreset::Last24Hours => "last-24-hours",
            WindowPreset::Last7Days => "last-7-days",
            WindowPreset::Last30Days => "last-30-days",
        }
    }
}

impl std::fmt::Display for WindowPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WindowPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WindowPreset::ALL
            .into_iter()
            .find(|p| p.as_str() == s.trim())
            .ok_or_else(|| {
                let known: Vec<_> = WindowPreset::ALL.iter().map(|p| p.as_str()).collect();
                format!("unknown range '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

/// What the operator asked for, before resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowSelection {
    Preset(WindowPreset),
    /// Inclusive calendar dates; the window ends at the end of `end`.
    Dates { start: NaiveDate, end: NaiveDate },
}

impl Default for WindowSelection {
    fn default() -> Self {
        WindowSelection::Preset(WindowPreset::Last24Hours)
    }
}

/// Half-open `[start, end)` interval with `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, AnalysisError> {
        if start >= end {
            return Err(AnalysisError::InvalidRange {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(Self { start, end })
    }

    /// Rolling window ending at `now`.
    pub fn from_preset(preset: WindowPreset, now: DateTime<Utc>) -> Self {
        Self {
            start: now - preset.span(),
            end: now,
        }
    }

    /// Whole days from the start of `start` to the end of `end`.
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Result<Self, AnalysisError> {
        if start > end {
            return Err(AnalysisError::InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        let day_after = end.succ_opt().ok_or_else(|| AnalysisError::InvalidRange {
            start: start.to_string(),
            end: end.to_string(),
        })?;
        Self::new(
            start.and_time(chrono::NaiveTime::MIN).and_utc(),
            day_after.and_time(chrono::NaiveTime::MIN).and_utc(),
        )
    }

    pub fn resolve(selection: &WindowSelection, now: DateTime<Utc>) -> Result<Self, AnalysisError> {
        match *selection {
            WindowSelection::Preset(preset) => Ok(Self::from_preset(preset, now)),
            WindowSelection::Dates { start, end } => Self::from_dates(start, end),
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn span(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_presets_end_now() {
        for preset in WindowPreset::ALL {
            let w = TimeWindow::from_preset(preset, now());
            assert_eq!(w.end(), now());
            assert_eq!(w.span(), preset.span());
        }
    }

    #[test]
    fn test_preset_parse_round_trip() {
        assert_eq!("last-7-days".parse::<WindowPreset>().unwrap(), WindowPreset::Last7Days);
        let err = "yesterday".parse::<WindowPreset>().unwrap_err();
        assert!(err.contains("last-hour"));
    }

    #[test]
    fn test_explicit_dates_cover_whole_days() {
        let start = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 2, 3).unwrap();
        let w = TimeWindow::from_dates(start, end).unwrap();
        assert_eq!(w.start(), Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap());
        assert_eq!(w.end(), Utc.with_ymd_and_hms(2026, 2, 4, 0, 0, 0).unwrap());
        assert!(w.contains(Utc.with_ymd_and_hms(2026, 2, 3, 23, 59, 59).unwrap()));
        assert!(!w.contains(w.end()));
    }

    #[test]
    fn test_single_day_is_valid() {
        let day = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let w = TimeWindow::from_dates(day, day).unwrap();
        assert_eq!(w.span(), Duration::days(1));
    }

    #[test]
    fn test_inverted_dates_are_rejected() {
        let start = NaiveDate::from_ymd_opt(2026, 2, 5).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let err = TimeWindow::resolve(&WindowSelection::Dates { start, end }, now()).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidRange { .. }));
    }

    #[test]
    fn test_empty_window_is_rejected() {
        assert!(TimeWindow::new(now(), now()).is_err());
    }
}
