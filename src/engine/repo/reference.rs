//! Reference data: project types, platforms, task groups and positions.

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use super::parse_column;
use crate::engine::error::{Result, TrackerError};
use crate::engine::types::{RefItem, RefKind, Role};

/// Where a kind of reference data is referenced from.
fn usage(kind: RefKind) -> (&'static str, &'static str) {
    match kind {
        RefKind::ProjectType => ("projects", "type_id"),
        RefKind::Platform => ("tasks", "platform_id"),
        RefKind::TaskGroup => ("tasks", "task_group_id"),
        RefKind::Position => ("users", "position_id"),
    }
}

fn select(kind: RefKind) -> String {
    let role = if kind == RefKind::Position { "role" } else { "NULL" };
    format!("SELECT id, name, {role} FROM {}", kind.table())
}

pub struct RefRepo<'a> {
    conn: &'a Connection,
}

impl<'a> RefRepo<'a> {
    #[must_use]
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// # Errors
    /// Returns error if the query fails.
    pub fn list(&self, kind: RefKind) -> Result<Vec<RefItem>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} ORDER BY name COLLATE NOCASE", select(kind)))?;
        let rows = stmt.query_map([], Self::row_to_item)?;
        let mut items = Vec::new();
        for item in rows {
            items.push(item?);
        }
        Ok(items)
    }

    /// Adds an item. Positions need a role; other kinds ignore it.
    ///
    /// # Errors
    /// Returns `Conflict` for duplicates or incomplete input.
    pub fn add(&self, kind: RefKind, name: &str, role: Option<Role>) -> Result<i64> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TrackerError::Conflict(format!("{} name is required", kind.label())));
        }
        if kind == RefKind::Position {
            let Some(role) = role else {
                return Err(TrackerError::Conflict("Position role is required".to_string()));
            };
            let exists = self.list(kind)?.into_iter().any(|i| {
                i.role == Some(role) && i.name.eq_ignore_ascii_case(name)
            });
            if exists {
                return Err(TrackerError::Conflict(format!(
                    "Position '{name}' already exists for {role}"
                )));
            }
            self.conn.execute(
                "INSERT INTO positions (name, role) VALUES (?1, ?2)",
                params![name, role.to_string()],
            )?;
        } else {
            if self.find_by_name(kind, name)?.is_some() {
                return Err(TrackerError::Conflict(format!(
                    "{} '{name}' already exists",
                    kind.label()
                )));
            }
            self.conn.execute(
                &format!("INSERT INTO {} (name) VALUES (?1)", kind.table()),
                params![name],
            )?;
        }
        let id = self.conn.last_insert_rowid();
        info!(kind = kind.table(), id, "reference data added");
        Ok(id)
    }

    /// # Errors
    /// Returns error if the query fails.
    pub fn find_by_id(&self, kind: RefKind, id: i64) -> Result<Option<RefItem>> {
        let sql = format!("{} WHERE id = ?1", select(kind));
        Ok(self
            .conn
            .query_row(&sql, params![id], Self::row_to_item)
            .optional()?)
    }

    /// Case-insensitive; the lowest id wins when positions share a name.
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn find_by_name(&self, kind: RefKind, name: &str) -> Result<Option<RefItem>> {
        let sql = format!("{} WHERE LOWER(name) = LOWER(?1) ORDER BY id LIMIT 1", select(kind));
        Ok(self
            .conn
            .query_row(&sql, params![name.trim()], Self::row_to_item)
            .optional()?)
    }

    /// Looks an item up by numeric id first, then by name.
    ///
    /// # Errors
    /// Returns `NotFound` when neither matches.
    pub fn resolve(&self, kind: RefKind, reference: &str) -> Result<RefItem> {
        if let Ok(id) = reference.trim().parse::<i64>() {
            if let Some(item) = self.find_by_id(kind, id)? {
                return Ok(item);
            }
        }
        self.find_by_name(kind, reference)?
            .ok_or_else(|| TrackerError::not_found(kind.label(), reference))
    }

    /// Deletes an unused item.
    ///
    /// # Errors
    /// Returns `Conflict` while referenced, `NotFound` if absent.
    pub fn delete(&self, kind: RefKind, id: i64) -> Result<()> {
        let (table, column) = usage(kind);
        let in_use: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {table} WHERE {column} = ?1"),
            params![id],
            |r| r.get(0),
        )?;
        if in_use > 0 {
            return Err(TrackerError::Conflict(format!(
                "Failed to delete {} because it is still used by {in_use} record(s)",
                kind.label()
            )));
        }
        let removed = self.conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", kind.table()),
            params![id],
        )?;
        if removed == 0 {
            return Err(TrackerError::not_found(kind.label(), id));
        }
        Ok(())
    }

    fn row_to_item(row: &Row) -> rusqlite::Result<RefItem> {
        let role: Option<String> = row.get(2)?;
        Ok(RefItem {
            id: row.get(0)?,
            name: row.get(1)?,
            role: role.map(|r| parse_column(2, &r)).transpose()?,
        })
    }
}
