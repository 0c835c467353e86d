//! Repositories: every SQL statement lives under this module.
//!
//! Each repo borrows a `Connection`. Handlers that write more than one row
//! open a transaction and hand `&tx` to the repos, which deref to the same
//! connection type.

mod history;
mod projects;
mod reference;
mod tasks;
mod users;

pub use history::HistoryRepo;
pub use projects::{ProjectRepo, PROJECT_SELECT};
pub use reference::RefRepo;
pub use tasks::{TaskRepo, TASK_SELECT};
pub use users::{UserRepo, USER_SELECT};

use std::str::FromStr;

use rusqlite::types::Type;

use super::types::FieldChange;

/// Parses a text column into one of the closed enums.
pub(crate) fn parse_column<T>(idx: usize, raw: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

/// Appends a change when the rendered values differ.
pub(crate) fn push_change(
    changes: &mut Vec<FieldChange>,
    field: &'static str,
    before: Option<String>,
    after: Option<String>,
) {
    if before != after {
        changes.push(FieldChange {
            field,
            before,
            after,
        });
    }
}
