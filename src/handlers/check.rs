//! Handlers for `check effort|progress|status`: run the rules without saving.

use anyhow::{bail, Result};
use colored::Colorize;
use serde_json::json;
use worktrack::engine::state::{derive_status, status_from_progress};
use worktrack::engine::types::EffortLevel;
use worktrack::engine::validate::{
    check_progress_fields, duration_hint, validate_effort, FieldErrors,
};

/// Checks an effort level against a planned range.
///
/// # Errors
/// Returns error when the range breaks the rule, so scripts see a non-zero exit.
pub fn effort(level: EffortLevel, plan_start: &str, plan_end: &str, json: bool) -> Result<()> {
    let result = validate_effort(level, plan_start, plan_end);

    if json {
        let body = match &result {
            Ok(days) => json!({ "valid": true, "diff_days": days }),
            Err(e) => json!({
                "valid": false,
                "diff_days": e.diff_days(),
                "field": e.field(),
                "message": e.to_string(),
            }),
        };
        super::print_json(&body)?;
    } else {
        match &result {
            Ok(_) => println!("{} {level} effort fits the plan", "✓".green()),
            Err(e) => {
                println!("{} {}", "✗".red(), e);
                if let Some(days) = e.diff_days() {
                    println!("   planned: {days} day(s)");
                }
            }
        }
        if let Some(hint) = duration_hint(plan_start, plan_end) {
            println!("   {}", hint.dimmed());
        }
    }

    if let Err(e) = result {
        bail!(e);
    }
    Ok(())
}

/// Checks progress against actual dates and shows the resulting status.
///
/// # Errors
/// Returns error when any constraint is violated.
pub fn progress(
    raw_progress: &str,
    actual_start: Option<&str>,
    actual_end: Option<&str>,
    json: bool,
) -> Result<()> {
    let mut errors = FieldErrors::new();
    let progress = check_progress_fields(&mut errors, raw_progress, actual_start, actual_end);
    let status = progress.map(status_from_progress);

    if json {
        super::print_json(&json!({
            "valid": errors.is_empty(),
            "errors": errors,
            "status": status.map(|s| s.to_string()),
        }))?;
    } else if errors.is_empty() {
        if let Some(status) = status {
            println!("{} consistent; status would be {}", "✓".green(), super::paint_status(status));
        }
    } else {
        for (field, message) in errors.iter() {
            println!("{} {:<13} {}", "✗".red(), field.yellow(), message);
        }
    }

    if !errors.is_empty() {
        bail!("{} constraint(s) violated", errors.len());
    }
    Ok(())
}

/// Derives the delivery status for a plan/actual end pair.
///
/// # Errors
/// Returns error only if JSON output fails.
pub fn status(plan_end: Option<&str>, actual_end: Option<&str>, json: bool) -> Result<()> {
    let status = derive_status(plan_end, actual_end);
    if json {
        return super::print_json(&json!({
            "status": status,
            "color": status.color_hint(),
        }));
    }
    println!("{}", super::paint_delivery(status));
    Ok(())
}
