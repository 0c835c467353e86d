//! Command handlers for the worktrack CLI.

pub mod auth;
pub mod check;
pub mod dashboard;
pub mod data;
pub mod init;
pub mod kanban;
pub mod project;
pub mod task;
pub mod user;

use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::{ColoredString, Colorize};
use rusqlite::Connection;
use tracing::warn;
use worktrack::engine::access::{Action, Resource};
use worktrack::engine::config::Config;
use worktrack::engine::db::Db;
use worktrack::engine::error::TrackerError;
use worktrack::engine::listing::{self, ListQuery, StatusSummary};
use worktrack::engine::repo::{RefRepo, UserRepo};
use worktrack::engine::resolver::resolve_user;
use worktrack::engine::session::{Session, SessionStore, SessionUser};
use worktrack::engine::state::DeliveryStatus;
use worktrack::engine::types::{HistoryEntry, RefKind, Role, User, WorkStatus};
use worktrack::engine::validate::FieldErrors;

/// Everything a logged-in command needs.
pub struct Ctx {
    pub config: Config,
    pub conn: Connection,
    pub session: Session,
}

impl Ctx {
    /// Opens the store and resumes the session against it.
    ///
    /// # Errors
    /// Returns error if the tracker is not initialized or nobody is logged in.
    pub fn open(config: &Config) -> Result<Self> {
        let conn = Db::connect(config)?;
        let session = SessionStore::new(config.session_path())
            .require()?
            .resume(&conn)?;
        Ok(Self {
            config: config.clone(),
            conn,
            session,
        })
    }

    #[must_use]
    pub fn viewer(&self) -> &SessionUser {
        &self.session.user
    }

    /// Fails with a permission error, logging the denial.
    ///
    /// # Errors
    /// Returns `PermissionDenied` when the role lacks the capability.
    pub fn require(&self, action: Action, resource: Resource) -> Result<()> {
        self.session
            .permissions()
            .require(action, resource)
            .map_err(|e| denied(self.viewer(), e))
    }

    /// Fails unless the session belongs to an administrator.
    ///
    /// # Errors
    /// Returns `PermissionDenied` for every other role.
    pub fn require_admin(&self, action: &str) -> Result<()> {
        if self.session.role() == Role::Admin {
            return Ok(());
        }
        Err(denied(self.viewer(), TrackerError::denied(action)))
    }

    /// The stored record behind the session.
    ///
    /// # Errors
    /// Returns `NotFound` if the account was deleted after login.
    pub fn me(&self) -> Result<User> {
        let sap = self.viewer().sap;
        UserRepo::new(&self.conn)
            .find_by_sap(sap)?
            .ok_or_else(|| TrackerError::not_found("User", sap).into())
    }

    /// Resolves an assignee picked by an administrator.
    ///
    /// The chosen group must be the assignee's role.
    ///
    /// # Errors
    /// Returns error if the user is unknown or belongs to another group.
    pub fn assignee(&self, reference: &str, group: Option<Role>) -> Result<User> {
        let user = resolve_user(&self.conn, reference)?;
        if let Some(group) = group {
            if user.role != group {
                bail!(
                    "{} belongs to {}, not {}",
                    user.username,
                    user.role.label(),
                    group.label()
                );
            }
        }
        Ok(user)
    }

    /// Resolves an optional reference-data argument to its id.
    ///
    /// # Errors
    /// Returns `NotFound` if the reference is given but unknown.
    pub fn ref_id(&self, kind: RefKind, reference: Option<&str>) -> Result<Option<i64>> {
        let refs = RefRepo::new(&self.conn);
        Ok(reference.map(|r| refs.resolve(kind, r)).transpose()?.map(|item| item.id))
    }
}

/// Search, filter, sort and paging flags shared by list commands.
#[derive(Args, Clone, Debug)]
pub struct ListArgs {
    /// Case-insensitive text search
    #[arg(long, short = 's')]
    pub search: Option<String>,
    #[arg(long)]
    pub status: Option<WorkStatus>,
    /// 1-12 or a month name
    #[arg(long, value_parser = parse_month_arg)]
    pub month: Option<u32>,
    #[arg(long)]
    pub year: Option<i32>,
    /// Column to sort by
    #[arg(long)]
    pub sort: Option<String>,
    #[arg(long)]
    pub desc: bool,
    #[arg(long, default_value_t = 1)]
    pub page: usize,
    #[arg(long)]
    pub json: bool,
}

impl ListArgs {
    #[must_use]
    pub fn query(&self, page_size: usize) -> ListQuery {
        ListQuery {
            search: self.search.clone(),
            status: self.status,
            month: self.month,
            year: self.year,
            sort: self.sort.clone(),
            descending: self.desc,
            page: self.page,
            page_size,
        }
    }
}

/// Value parser for `--month`.
///
/// # Errors
/// Returns a message clap shows on an unknown month.
pub fn parse_month_arg(raw: &str) -> std::result::Result<u32, String> {
    listing::parse_month(raw).ok_or_else(|| format!("unknown month: {raw}"))
}

/// Logs a denied action and converts it for the caller.
pub fn denied(viewer: &SessionUser, err: TrackerError) -> anyhow::Error {
    warn!(user = %viewer.username, role = %viewer.role, "{err}");
    err.into()
}

/// Prints every field error before failing on a rejected form.
///
/// # Errors
/// Passes the library error through.
pub fn submit<T>(result: worktrack::engine::error::Result<T>) -> Result<T> {
    result.map_err(|err| {
        if let TrackerError::Validation(errors) = &err {
            print_field_errors(errors);
        }
        err.into()
    })
}

pub fn print_field_errors(errors: &FieldErrors) {
    println!("{} Please fix the following fields:", "✗".red());
    for (field, message) in errors.iter() {
        println!("   {:<16} {}", field.yellow(), message);
    }
}

/// Asks for a yes/no answer unless `yes` was passed.
///
/// # Errors
/// Returns error if stdin cannot be read.
pub fn confirm(prompt: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;
    let accepted = accepts(&answer);
    if !accepted {
        println!("{} Cancelled.", "○".dimmed());
    }
    Ok(accepted)
}

fn accepts(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_page_footer(page: usize, total_pages: usize) {
    if total_pages > 1 {
        println!("   {}", format!("Page {page} of {total_pages}").dimmed());
    }
}

pub fn print_summary(summary: &StatusSummary) {
    println!(
        "   Total: {}   {} {}   {} {}   {} {}",
        summary.total.to_string().bold(),
        "To Do".red(),
        summary.to_do,
        "In Progress".yellow(),
        summary.in_progress,
        "Completed".green(),
        summary.completed
    );
}

pub fn print_history(history: &[HistoryEntry]) {
    for h in history {
        println!(
            "   {} {:<16} {} → {}  {}",
            h.changed_at.dimmed(),
            h.field.yellow(),
            or_dash(h.before.as_deref()).dimmed(),
            or_dash(h.after.as_deref()),
            format!("by {}", h.changed_by).dimmed()
        );
    }
}

/// Colors a delivery status the way the dashboard badges do.
pub fn paint_delivery(status: DeliveryStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        DeliveryStatus::Delay => label.red(),
        DeliveryStatus::OnTime => label.green(),
        DeliveryStatus::NotApplicable => label.dimmed(),
    }
}

pub fn paint_status(status: WorkStatus) -> ColoredString {
    let label = status.label();
    match status {
        WorkStatus::ToDo => label.red(),
        WorkStatus::InProgress => label.yellow(),
        WorkStatus::Completed => label.green(),
    }
}

/// Renders an optional cell.
pub fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or("-")
}

pub fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmation_answers() {
        assert!(accepts("y\n"));
        assert!(accepts(" YES \r\n"));
        assert!(!accepts("\n"));
        assert!(!accepts("no"));
        assert!(!accepts("yep"));
    }

    #[test]
    fn test_confirm_skipped_with_yes_flag() {
        assert!(confirm("Delete everything?", true).unwrap());
    }

    #[test]
    fn test_delivery_colors() {
        assert_eq!(paint_delivery(DeliveryStatus::Delay), "Delay".red());
        assert_eq!(paint_delivery(DeliveryStatus::OnTime), "On Time".green());
        assert_eq!(
            paint_delivery(DeliveryStatus::NotApplicable),
            DeliveryStatus::NotApplicable.to_string().dimmed()
        );
        assert_eq!(paint_status(WorkStatus::InProgress), "In Progress".yellow());
    }
}
