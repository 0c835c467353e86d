//! Business-rule validation: effort vs. plan duration, progress vs. actual dates.
//!
//! Rule violations are returned as values. Callers decide how to surface
//! them; the forms attach them to fields and block submission.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use super::state::parse_instant;
use super::types::EffortLevel;

const SECS_PER_DAY: i64 = 24 * 60 * 60;

/// Why a plan range does not fit its effort level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EffortError {
    #[error("Plan start date is not a valid date")]
    InvalidStart,
    #[error("Plan end date is not a valid date")]
    InvalidEnd,
    #[error("Plan start cannot be after plan end")]
    StartAfterEnd,
    #[error("Low effort should be less than 7 days")]
    LowTooLong { diff_days: i64 },
    #[error("Mid effort should be between 7–21 days")]
    MidOutOfRange { diff_days: i64 },
    #[error("High effort should be more than 21 days")]
    HighTooShort { diff_days: i64 },
}

impl EffortError {
    /// Planned duration that broke the level rule, if one was computed.
    #[must_use]
    pub fn diff_days(&self) -> Option<i64> {
        match self {
            Self::LowTooLong { diff_days }
            | Self::MidOutOfRange { diff_days }
            | Self::HighTooShort { diff_days } => Some(*diff_days),
            Self::InvalidStart | Self::InvalidEnd | Self::StartAfterEnd => None,
        }
    }

    /// Form field the message belongs under.
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            Self::InvalidStart | Self::StartAfterEnd => "plan_start_date",
            Self::InvalidEnd
            | Self::LowTooLong { .. }
            | Self::MidOutOfRange { .. }
            | Self::HighTooShort { .. } => "plan_end_date",
        }
    }
}

/// Checks that both plan dates parse and start ≤ end.
///
/// Returns `diffDays = ceil((end - start) / 1 day)`.
///
/// # Errors
/// Returns the ordering or parse violation.
pub fn plan_duration_days(plan_start: &str, plan_end: &str) -> Result<i64, EffortError> {
    let start = parse_instant(plan_start).ok_or(EffortError::InvalidStart)?;
    let end = parse_instant(plan_end).ok_or(EffortError::InvalidEnd)?;
    if start > end {
        return Err(EffortError::StartAfterEnd);
    }
    let secs = (end - start).num_seconds();
    Ok((secs + SECS_PER_DAY - 1) / SECS_PER_DAY)
}

/// Validates an effort level against its planned date range.
///
/// Ordering is checked before, and independently of, the level rule.
///
/// # Errors
/// Returns the first violated rule; level violations carry `diff_days`.
pub fn validate_effort(
    level: EffortLevel,
    plan_start: &str,
    plan_end: &str,
) -> Result<i64, EffortError> {
    let diff_days = plan_duration_days(plan_start, plan_end)?;
    match level {
        EffortLevel::Low if diff_days >= 7 => Err(EffortError::LowTooLong { diff_days }),
        EffortLevel::Mid if !(7..=21).contains(&diff_days) => {
            Err(EffortError::MidOutOfRange { diff_days })
        }
        EffortLevel::High if diff_days <= 21 => Err(EffortError::HighTooShort { diff_days }),
        _ => Ok(diff_days),
    }
}

/// The "Project will do in N days" hint shown beside the plan dates.
#[must_use]
pub fn duration_hint(plan_start: &str, plan_end: &str) -> Option<String> {
    let days = plan_duration_days(plan_start, plan_end).ok()?;
    let plural = if days > 1 { "s" } else { "" };
    Some(format!("Project will do in {days} day{plural}"))
}

/// A violated progress/actual-date constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProgressViolation {
    #[error("Progress must be a number")]
    NotANumber,
    #[error("Progress must be between 0-100")]
    OutOfRange,
    #[error("Actual start is required when progress > 0%")]
    ActualStartRequired,
    #[error("Progress must be > 0% when actual start is filled")]
    ProgressRequired,
    #[error("Actual end is required when progress = 100%")]
    ActualEndRequired,
    #[error("Actual end cannot be before actual start")]
    EndBeforeStart,
}

impl ProgressViolation {
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            Self::NotANumber | Self::OutOfRange | Self::ProgressRequired => "progress",
            Self::ActualStartRequired => "actual_start",
            Self::ActualEndRequired | Self::EndBeforeStart => "actual_end",
        }
    }
}

/// Parses raw progress input at the form boundary.
///
/// # Errors
/// Returns `NotANumber` for anything that is not an integer.
pub fn parse_progress(raw: &str) -> Result<i64, ProgressViolation> {
    raw.trim()
        .trim_end_matches('%')
        .parse::<i64>()
        .map_err(|_| ProgressViolation::NotANumber)
}

/// Checks progress against the actual dates and returns every violation.
///
/// Blank strings count as absent.
#[must_use]
pub fn validate_progress(
    progress: i64,
    actual_start: Option<&str>,
    actual_end: Option<&str>,
) -> Vec<ProgressViolation> {
    let actual_start = actual_start.filter(|s| !s.trim().is_empty());
    let actual_end = actual_end.filter(|s| !s.trim().is_empty());
    let mut violations = Vec::new();

    if !(0..=100).contains(&progress) {
        violations.push(ProgressViolation::OutOfRange);
    }
    if progress > 0 && actual_start.is_none() {
        violations.push(ProgressViolation::ActualStartRequired);
    }
    if actual_start.is_some() && progress == 0 {
        violations.push(ProgressViolation::ProgressRequired);
    }
    if progress == 100 && actual_end.is_none() {
        violations.push(ProgressViolation::ActualEndRequired);
    }
    if let (Some(start), Some(end)) = (
        actual_start.and_then(parse_instant),
        actual_end.and_then(parse_instant),
    ) {
        if end < start {
            violations.push(ProgressViolation::EndBeforeStart);
        }
    }
    violations
}

/// Field name → message, as a form displays them.
///
/// Setting a field twice keeps the later message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<_> = self.iter().map(|(k, v)| format!("{k}: {v}")).collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Flags a non-blank optional date that does not parse.
pub fn check_optional_date(
    errors: &mut FieldErrors,
    field: &'static str,
    label: &str,
    raw: Option<&str>,
) {
    if let Some(raw) = raw.filter(|v| !v.trim().is_empty()) {
        if parse_instant(raw).is_none() {
            errors.set(field, format!("{label} is not a valid date"));
        }
    }
}

/// Runs every progress rule over raw input and records the failures.
///
/// Returns the parsed progress when it is a number. An unparseable actual
/// date is reported on its own field.
pub fn check_progress_fields(
    errors: &mut FieldErrors,
    raw_progress: &str,
    actual_start: Option<&str>,
    actual_end: Option<&str>,
) -> Option<i64> {
    let progress = match parse_progress(raw_progress) {
        Ok(progress) => {
            for v in validate_progress(progress, actual_start, actual_end) {
                errors.set(v.field(), v.to_string());
            }
            Some(progress)
        }
        Err(v) => {
            errors.set(v.field(), v.to_string());
            None
        }
    };
    check_optional_date(errors, "actual_start", "Actual start", actual_start);
    check_optional_date(errors, "actual_end", "Actual end", actual_end);
    progress
}

#[cfg(test)]
mod tests {
    use super::*;

    fn end_after(days: i64) -> String {
        let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (start + chrono::Duration::days(days)).format("%Y-%m-%d").to_string()
    }

    fn check(level: EffortLevel, days: i64) -> Result<i64, EffortError> {
        validate_effort(level, "2024-01-01", &end_after(days))
    }

    #[test]
    fn test_low_boundaries() {
        assert_eq!(check(EffortLevel::Low, 6), Ok(6));
        assert_eq!(check(EffortLevel::Low, 7), Err(EffortError::LowTooLong { diff_days: 7 }));
        assert_eq!(check(EffortLevel::Low, 0), Ok(0));
    }

    #[test]
    fn test_mid_boundaries() {
        assert_eq!(check(EffortLevel::Mid, 7), Ok(7));
        assert_eq!(check(EffortLevel::Mid, 21), Ok(21));
        assert!(check(EffortLevel::Mid, 6).is_err());
        assert_eq!(
            check(EffortLevel::Mid, 22),
            Err(EffortError::MidOutOfRange { diff_days: 22 })
        );
    }

    #[test]
    fn test_high_boundaries() {
        assert_eq!(
            check(EffortLevel::High, 21),
            Err(EffortError::HighTooShort { diff_days: 21 })
        );
        assert_eq!(check(EffortLevel::High, 22), Ok(22));
    }

    #[test]
    fn test_ordering_checked_before_level() {
        for level in [EffortLevel::Low, EffortLevel::Mid, EffortLevel::High] {
            let err = validate_effort(level, "2024-03-10", "2024-03-01").unwrap_err();
            assert_eq!(err, EffortError::StartAfterEnd);
            assert_eq!(err.to_string(), "Plan start cannot be after plan end");
            assert_eq!(err.field(), "plan_start_date");
        }
    }

    #[test]
    fn test_unparseable_dates() {
        assert_eq!(
            validate_effort(EffortLevel::Low, "soon", "2024-03-01"),
            Err(EffortError::InvalidStart)
        );
        assert_eq!(
            validate_effort(EffortLevel::Low, "2024-03-01", ""),
            Err(EffortError::InvalidEnd)
        );
    }

    #[test]
    fn test_low_scenario_message() {
        let err = validate_effort(EffortLevel::Low, "2024-03-01", "2024-03-10").unwrap_err();
        assert_eq!(err.diff_days(), Some(9));
        assert_eq!(err.to_string(), "Low effort should be less than 7 days");
        assert_eq!(err.field(), "plan_end_date");
    }

    #[test]
    fn test_messages_are_exact() {
        assert_eq!(
            EffortError::MidOutOfRange { diff_days: 3 }.to_string(),
            "Mid effort should be between 7–21 days"
        );
        assert_eq!(
            EffortError::HighTooShort { diff_days: 3 }.to_string(),
            "High effort should be more than 21 days"
        );
    }

    #[test]
    fn test_validation_is_idempotent() {
        let first = validate_effort(EffortLevel::Mid, "2024-03-01", "2024-03-05");
        let second = validate_effort(EffortLevel::Mid, "2024-03-01", "2024-03-05");
        assert_eq!(first, second);
    }

    #[test]
    fn test_partial_day_rounds_up() {
        assert_eq!(plan_duration_days("2024-03-01", "2024-03-07T06:00:00Z"), Ok(7));
    }

    #[test]
    fn test_duration_hint() {
        assert_eq!(
            duration_hint("2024-03-01", "2024-03-10").as_deref(),
            Some("Project will do in 9 days")
        );
        assert_eq!(
            duration_hint("2024-03-01", "2024-03-02").as_deref(),
            Some("Project will do in 1 day")
        );
        assert_eq!(duration_hint("2024-03-10", "2024-03-01"), None);
    }

    #[test]
    fn test_progress_without_start() {
        assert_eq!(
            validate_progress(50, None, None),
            vec![ProgressViolation::ActualStartRequired]
        );
    }

    #[test]
    fn test_complete_without_end() {
        let v = validate_progress(100, Some("2024-01-01"), None);
        assert!(v.contains(&ProgressViolation::ActualEndRequired));
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].to_string(), "Actual end is required when progress = 100%");
    }

    #[test]
    fn test_collects_every_violation() {
        let v = validate_progress(0, Some("2024-01-10"), Some("2024-01-05"));
        assert_eq!(
            v,
            vec![ProgressViolation::ProgressRequired, ProgressViolation::EndBeforeStart]
        );

        let v = validate_progress(150, None, None);
        assert_eq!(
            v,
            vec![ProgressViolation::OutOfRange, ProgressViolation::ActualStartRequired]
        );
    }

    #[test]
    fn test_blank_dates_are_absent() {
        assert_eq!(
            validate_progress(10, Some(""), Some(" ")),
            vec![ProgressViolation::ActualStartRequired]
        );
        assert!(validate_progress(0, Some(""), None).is_empty());
    }

    #[test]
    fn test_consistent_task_has_no_violations() {
        assert!(validate_progress(100, Some("2024-01-01"), Some("2024-01-01")).is_empty());
        assert!(validate_progress(0, None, None).is_empty());
    }

    #[test]
    fn test_parse_progress() {
        assert_eq!(parse_progress("45"), Ok(45));
        assert_eq!(parse_progress(" 100% "), Ok(100));
        assert_eq!(parse_progress("half"), Err(ProgressViolation::NotANumber));
        assert_eq!(
            ProgressViolation::NotANumber.to_string(),
            "Progress must be a number"
        );
    }

    #[test]
    fn test_field_errors_last_write_wins() {
        let mut errors = FieldErrors::new();
        errors.set("progress", "Progress must be between 0-100");
        errors.set("progress", "Progress must be > 0% when actual start is filled");
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.get("progress"),
            Some("Progress must be > 0% when actual start is filled")
        );
    }

    #[test]
    fn test_garbage_actual_dates_are_reported() {
        let mut errors = FieldErrors::new();
        let progress = check_progress_fields(&mut errors, "50", Some("garbage"), None);
        assert_eq!(progress, Some(50));
        assert_eq!(errors.get("actual_start"), Some("Actual start is not a valid date"));
        assert_eq!(errors.len(), 1);

        let mut errors = FieldErrors::new();
        check_progress_fields(&mut errors, "100", Some("2024-03-01"), Some("soon"));
        assert_eq!(errors.get("actual_end"), Some("Actual end is not a valid date"));

        let mut errors = FieldErrors::new();
        check_progress_fields(&mut errors, "50", Some("2024-03-01"), Some(" "));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_progress_fields_collect_everything() {
        let mut errors = FieldErrors::new();
        let progress = check_progress_fields(&mut errors, "lots", Some("2024-13-45"), None);
        assert_eq!(progress, None);
        assert!(errors.get("progress").is_some());
        assert_eq!(errors.get("actual_start"), Some("Actual start is not a valid date"));
    }
}
