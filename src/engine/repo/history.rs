//! Update history: append-only per-field change log for projects and tasks.

use rusqlite::{params, Connection};

use crate::engine::error::Result;
use crate::engine::types::{Entity, FieldChange, HistoryEntry};

pub struct HistoryRepo<'a> {
    conn: &'a Connection,
}

impl<'a> HistoryRepo<'a> {
    #[must_use]
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Appends one row per change.
    ///
    /// # Errors
    /// Returns error if an insert fails.
    pub fn record(
        &self,
        entity: Entity,
        entity_id: i64,
        changes: &[FieldChange],
        changed_by: &str,
    ) -> Result<()> {
        let mut stmt = self.conn.prepare(
            "INSERT INTO update_history (entity, entity_id, field, before_value, after_value, changed_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for change in changes {
            stmt.execute(params![
                entity.to_string(),
                entity_id,
                change.field,
                change.before,
                change.after,
                changed_by
            ])?;
        }
        Ok(())
    }

    /// History of one record, oldest first.
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn get_history(&self, entity: Entity, entity_id: i64) -> Result<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT field, before_value, after_value, changed_by, changed_at
             FROM update_history WHERE entity = ?1 AND entity_id = ?2
             ORDER BY changed_at, id",
        )?;
        let rows = stmt.query_map(params![entity.to_string(), entity_id], |row| {
            Ok(HistoryEntry {
                field: row.get(0)?,
                before: row.get(1)?,
                after: row.get(2)?,
                changed_by: row.get(3)?,
                changed_at: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            })
        })?;

        let mut history = Vec::new();
        for entry in rows {
            history.push(entry?);
        }
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::db::Db;

    #[test]
    fn test_history_is_scoped_per_record() {
        let conn = Db::open_in_memory().unwrap();
        let repo = HistoryRepo::new(&conn);
        let change = FieldChange {
            field: "progress",
            before: Some("0".to_string()),
            after: Some("40".to_string()),
        };
        repo.record(Entity::Task, 1, &[change.clone()], "kai").unwrap();
        repo.record(Entity::Project, 1, &[change], "ina").unwrap();

        let task_history = repo.get_history(Entity::Task, 1).unwrap();
        assert_eq!(task_history.len(), 1);
        assert_eq!(task_history[0].after.as_deref(), Some("40"));
        assert_eq!(task_history[0].changed_by, "kai");
        assert!(repo.get_history(Entity::Task, 2).unwrap().is_empty());
    }
}
