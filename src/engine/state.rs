//! Derived State Engine: computes delivery and work status from dates and progress.
//!
//! Nothing here is stored. Every list, dashboard and export recomputes the
//! status from the plan/actual fields it already holds, so the store and the
//! views can never disagree.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;

use super::types::WorkStatus;

/// Delivery status derived from plan end vs. actual end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DeliveryStatus {
    /// Not finished yet, or dates unreadable
    #[serde(rename = "N/A")]
    NotApplicable,
    /// Finished on or before the planned end
    #[serde(rename = "On Time")]
    OnTime,
    /// Finished after the planned end
    Delay,
}

impl DeliveryStatus {
    /// Returns the badge color used when rendering.
    #[must_use]
    pub fn color_hint(&self) -> &'static str {
        match self {
            DeliveryStatus::Delay => "red",
            DeliveryStatus::OnTime => "green",
            DeliveryStatus::NotApplicable => "gray",
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::NotApplicable => write!(f, "N/A"),
            DeliveryStatus::OnTime => write!(f, "On Time"),
            DeliveryStatus::Delay => write!(f, "Delay"),
        }
    }
}

impl std::str::FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['_', '-'], " ").as_str() {
            "n/a" | "na" => Ok(Self::NotApplicable),
            "on time" | "ontime" => Ok(Self::OnTime),
            "delay" | "delayed" => Ok(Self::Delay),
            _ => Err(format!("unknown delivery status '{s}' (expected On Time, Delay or N/A)")),
        }
    }
}

/// Parses a date or timestamp into a comparable instant.
///
/// `YYYY-MM-DD` resolves to midnight. RFC 3339 timestamps resolve to their
/// UTC instant. Blank or malformed input yields `None`.
#[must_use]
pub fn parse_instant(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_utc());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").ok()
}

/// Parses a date or timestamp and keeps the calendar day.
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    parse_instant(raw).map(|ts| ts.date())
}

/// Rewrites any accepted date input as `YYYY-MM-DD`.
#[must_use]
pub fn normalize_date(raw: &str) -> Option<String> {
    parse_date(raw).map(|d| d.format("%Y-%m-%d").to_string())
}

/// Derives On Time / Delay / N/A from the planned and actual end dates.
///
/// Pure: no clock, no I/O. Ties count as On Time.
#[must_use]
pub fn derive_status(plan_end: Option<&str>, actual_end: Option<&str>) -> DeliveryStatus {
    let Some(actual_end) = actual_end.filter(|s| !s.trim().is_empty()) else {
        return DeliveryStatus::NotApplicable;
    };

    let (Some(plan), Some(actual)) = (plan_end.and_then(parse_instant), parse_instant(actual_end))
    else {
        return DeliveryStatus::NotApplicable;
    };

    if actual > plan {
        DeliveryStatus::Delay
    } else {
        DeliveryStatus::OnTime
    }
}

/// Maps progress to the work status sent with every task write.
///
/// Not a ratchet: lowering progress moves the status back.
#[must_use]
pub fn status_from_progress(progress: i64) -> WorkStatus {
    if progress == 100 {
        WorkStatus::Completed
    } else if progress > 0 {
        WorkStatus::InProgress
    } else {
        WorkStatus::ToDo
    }
}

/// True when the planned start has passed and work has not started.
#[must_use]
pub fn is_late_start(plan_start: Option<&str>, actual_start: Option<&str>, today: NaiveDate) -> bool {
    if actual_start.is_some_and(|s| !s.trim().is_empty()) {
        return false;
    }
    plan_start
        .and_then(parse_date)
        .is_some_and(|plan| today > plan)
}

/// Project progress: rounded mean of its task progress, 0 with no tasks.
#[must_use]
pub fn project_progress(task_progress: &[i64]) -> i64 {
    if task_progress.is_empty() {
        return 0;
    }
    let total: i64 = task_progress.iter().map(|p| (*p).clamp(0, 100)).sum();
    let count = i64::try_from(task_progress.len()).unwrap_or(i64::MAX);
    (total * 2 + count) / (count * 2)
}
