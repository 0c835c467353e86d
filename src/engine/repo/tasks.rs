//! Task Repository: tasks within projects, and their edit history.

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use super::{parse_column, push_change, HistoryRepo};
use crate::engine::error::{Result, TrackerError};
use crate::engine::forms::TaskDraft;
use crate::engine::types::{Entity, FieldChange, Task, WorkStatus};

pub const TASK_SELECT: &str = "SELECT k.id, k.project_id, p.name, k.assigned_to, u.name, u.role,
            k.task_group_id, g.name, k.platform_id, f.name, k.detail,
            k.plan_start_date, k.plan_end_date, k.actual_start, k.actual_end,
            k.progress, k.status, k.created_at
     FROM tasks k
     LEFT JOIN projects p ON p.id = k.project_id
     LEFT JOIN users u ON u.sap = k.assigned_to
     LEFT JOIN task_groups g ON g.id = k.task_group_id
     LEFT JOIN platforms f ON f.id = k.platform_id";

pub struct TaskRepo<'a> {
    conn: &'a Connection,
}

impl<'a> TaskRepo<'a> {
    /// Creates a new repository instance borrowing the connection.
    #[must_use]
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Adds a task to a project.
    ///
    /// # Errors
    /// Returns error if the insertion fails.
    pub fn add(&self, project_id: i64, draft: &TaskDraft) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO tasks (project_id, assigned_to, task_group_id, platform_id, detail,
                 plan_start_date, plan_end_date, actual_start, actual_end, progress, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                project_id,
                draft.assigned_to,
                draft.task_group_id,
                draft.platform_id,
                draft.detail,
                draft.plan_start_date,
                draft.plan_end_date,
                draft.actual_start,
                draft.actual_end,
                draft.progress,
                draft.status.to_string()
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        info!(task = id, project = project_id, "task created");
        Ok(id)
    }

    /// Retrieves all tasks.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn get_all(&self) -> Result<Vec<Task>> {
        self.query(&format!("{TASK_SELECT} ORDER BY k.id"), params![])
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub fn by_project(&self, project_id: i64) -> Result<Vec<Task>> {
        self.query(
            &format!("{TASK_SELECT} WHERE k.project_id = ?1 ORDER BY k.id"),
            params![project_id],
        )
    }

    fn query(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<Task>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(args, Self::row_to_task)?;
        let mut tasks = Vec::new();
        for task in rows {
            tasks.push(task?);
        }
        Ok(tasks)
    }

    /// Finds a task by its ID.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn find_by_id(&self, id: i64) -> Result<Option<Task>> {
        let sql = format!("{TASK_SELECT} WHERE k.id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![id], Self::row_to_task)
            .optional()?)
    }

    /// Applies an edit and records one history row per changed field.
    ///
    /// # Errors
    /// Returns `NotFound` if the task does not exist.
    pub fn update(&self, id: i64, draft: &TaskDraft, changed_by: &str) -> Result<Vec<FieldChange>> {
        let current = self
            .find_by_id(id)?
            .ok_or_else(|| TrackerError::not_found("Task", id))?;
        let changes = diff(&current, draft);
        if changes.is_empty() {
            return Ok(changes);
        }

        self.conn.execute(
            "UPDATE tasks SET assigned_to = ?1, task_group_id = ?2, platform_id = ?3, detail = ?4,
                 plan_start_date = ?5, plan_end_date = ?6, actual_start = ?7, actual_end = ?8,
                 progress = ?9, status = ?10
             WHERE id = ?11",
            params![
                draft.assigned_to,
                draft.task_group_id,
                draft.platform_id,
                draft.detail,
                draft.plan_start_date,
                draft.plan_end_date,
                draft.actual_start,
                draft.actual_end,
                draft.progress,
                draft.status.to_string(),
                id
            ],
        )?;
        HistoryRepo::new(self.conn).record(Entity::Task, id, &changes, changed_by)?;
        info!(task = id, fields = changes.len(), "task updated");
        Ok(changes)
    }

    /// Deletes a task and returns it so the caller can refresh its project.
    ///
    /// # Errors
    /// Returns `NotFound` if the task does not exist.
    pub fn delete(&self, id: i64) -> Result<Task> {
        let task = self
            .find_by_id(id)?
            .ok_or_else(|| TrackerError::not_found("Task", id))?;
        self.conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        info!(task = id, project = task.project_id, "task deleted");
        Ok(task)
    }

    fn row_to_task(row: &Row) -> rusqlite::Result<Task> {
        let role: Option<String> = row.get(5)?;
        Ok(Task {
            id: row.get(0)?,
            project_id: row.get(1)?,
            project_name: row.get(2)?,
            assigned_to: row.get(3)?,
            assigned_to_name: row.get(4)?,
            assigned_to_role: role.map(|r| parse_column(5, &r)).transpose()?,
            task_group_id: row.get(6)?,
            task_group_name: row.get(7)?,
            platform_id: row.get(8)?,
            platform_name: row.get(9)?,
            detail: row.get(10)?,
            plan_start_date: row.get(11)?,
            plan_end_date: row.get(12)?,
            actual_start: row.get(13)?,
            actual_end: row.get(14)?,
            progress: row.get(15)?,
            status: WorkStatus::from(row.get::<_, String>(16)?),
            created_at: row.get::<_, Option<String>>(17)?.unwrap_or_default(),
        })
    }
}

fn diff(current: &Task, draft: &TaskDraft) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    let num = |n: i64| Some(n.to_string());
    let text = |s: &str| Some(s.to_string());
    push_change(&mut changes, "assigned_to", num(current.assigned_to), num(draft.assigned_to));
    push_change(&mut changes, "task_group_id", num(current.task_group_id), num(draft.task_group_id));
    push_change(&mut changes, "platform_id", num(current.platform_id), num(draft.platform_id));
    push_change(&mut changes, "detail", text(&current.detail), text(&draft.detail));
    push_change(
        &mut changes,
        "plan_start_date",
        text(&current.plan_start_date),
        text(&draft.plan_start_date),
    );
    push_change(
        &mut changes,
        "plan_end_date",
        text(&current.plan_end_date),
        text(&draft.plan_end_date),
    );
    push_change(&mut changes, "actual_start", current.actual_start.clone(), draft.actual_start.clone());
    push_change(&mut changes, "actual_end", current.actual_end.clone(), draft.actual_end.clone());
    push_change(&mut changes, "progress", num(current.progress), num(draft.progress));
    push_change(
        &mut changes,
        "status",
        Some(current.status.to_string()),
        Some(draft.status.to_string()),
    );
    changes
}
