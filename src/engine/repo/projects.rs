//! Project Repository: projects, their rolled-up progress, and edit history.

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use super::{parse_column, push_change, HistoryRepo};
use crate::engine::error::{Result, TrackerError};
use crate::engine::forms::ProjectDraft;
use crate::engine::state::{parse_date, project_progress, status_from_progress};
use crate::engine::types::{Entity, FieldChange, Project, WorkStatus};

pub const PROJECT_SELECT: &str = "SELECT p.id, p.name, p.assigned_to, u.name, u.role, p.type_id, t.name,
            p.level, p.request_date, p.plan_start_date, p.plan_end_date,
            p.actual_start, p.actual_end, p.live_date, p.remark, p.progress, p.status, p.created_at
     FROM projects p
     LEFT JOIN users u ON u.sap = p.assigned_to
     LEFT JOIN project_types t ON t.id = p.type_id";

pub struct ProjectRepo<'a> {
    conn: &'a Connection,
}

impl<'a> ProjectRepo<'a> {
    #[must_use]
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Inserts a new project at 0% / `TO_DO`.
    ///
    /// # Errors
    /// Returns error if the insertion fails.
    pub fn add(&self, draft: &ProjectDraft) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO projects (name, assigned_to, type_id, level, request_date,
                 plan_start_date, plan_end_date, actual_start, actual_end, live_date,
                 remark, progress, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, ?12)",
            params![
                draft.name,
                draft.assigned_to,
                draft.type_id,
                draft.level.to_string(),
                draft.request_date,
                draft.plan_start_date,
                draft.plan_end_date,
                draft.actual_start,
                draft.actual_end,
                draft.live_date,
                draft.remark,
                WorkStatus::ToDo.to_string()
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        info!(project = id, name = %draft.name, "project created");
        Ok(id)
    }

    /// # Errors
    /// Returns error if the query fails.
    pub fn get_all(&self) -> Result<Vec<Project>> {
        let mut stmt = self.conn.prepare(&format!("{PROJECT_SELECT} ORDER BY p.id"))?;
        let rows = stmt.query_map([], Self::row_to_project)?;
        let mut projects = Vec::new();
        for project in rows {
            projects.push(project?);
        }
        Ok(projects)
    }

    /// # Errors
    /// Returns error if the query fails.
    pub fn find_by_id(&self, id: i64) -> Result<Option<Project>> {
        let sql = format!("{PROJECT_SELECT} WHERE p.id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![id], Self::row_to_project)
            .optional()?)
    }

    /// Case-insensitive exact name match; the lowest id wins on duplicates.
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn find_by_name(&self, name: &str) -> Result<Option<Project>> {
        let sql = format!("{PROJECT_SELECT} WHERE LOWER(p.name) = LOWER(?1) ORDER BY p.id LIMIT 1");
        Ok(self
            .conn
            .query_row(&sql, params![name.trim()], Self::row_to_project)
            .optional()?)
    }

    /// Projects whose plan start falls within `from..=to`.
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn in_plan_range(&self, from: chrono::NaiveDate, to: chrono::NaiveDate) -> Result<Vec<Project>> {
        Ok(self
            .get_all()?
            .into_iter()
            .filter(|p| parse_date(&p.plan_start_date).is_some_and(|d| d >= from && d <= to))
            .collect())
    }

    /// Applies an edit and records one history row per changed field.
    ///
    /// Progress and status are not part of the draft; they follow the tasks.
    ///
    /// # Errors
    /// Returns `NotFound` if the project does not exist.
    pub fn update(&self, id: i64, draft: &ProjectDraft, changed_by: &str) -> Result<Vec<FieldChange>> {
        let current = self
            .find_by_id(id)?
            .ok_or_else(|| TrackerError::not_found("Project", id))?;
        let changes = diff(&current, draft);
        if changes.is_empty() {
            return Ok(changes);
        }

        self.conn.execute(
            "UPDATE projects SET name = ?1, assigned_to = ?2, type_id = ?3, level = ?4,
                 request_date = ?5, plan_start_date = ?6, plan_end_date = ?7,
                 actual_start = ?8, actual_end = ?9, live_date = ?10, remark = ?11
             WHERE id = ?12",
            params![
                draft.name,
                draft.assigned_to,
                draft.type_id,
                draft.level.to_string(),
                draft.request_date,
                draft.plan_start_date,
                draft.plan_end_date,
                draft.actual_start,
                draft.actual_end,
                draft.live_date,
                draft.remark,
                id
            ],
        )?;
        HistoryRepo::new(self.conn).record(Entity::Project, id, &changes, changed_by)?;
        info!(project = id, fields = changes.len(), "project updated");
        Ok(changes)
    }

    /// Deletes a project with no tasks.
    ///
    /// # Errors
    /// Returns `Conflict` while tasks remain, `NotFound` if absent.
    pub fn delete(&self, id: i64) -> Result<()> {
        let tasks: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE project_id = ?1",
            params![id],
            |r| r.get(0),
        )?;
        if tasks > 0 {
            return Err(TrackerError::Conflict(
                "Failed to delete project because it contains task list inside".to_string(),
            ));
        }
        let removed = self
            .conn
            .execute("DELETE FROM projects WHERE id = ?1", params![id])?;
        if removed == 0 {
            return Err(TrackerError::not_found("Project", id));
        }
        info!(project = id, "project deleted");
        Ok(())
    }

    /// Recomputes progress and status from the project's tasks.
    ///
    /// # Errors
    /// Returns error if the query or update fails.
    pub fn refresh_progress(&self, id: i64) -> Result<(i64, WorkStatus)> {
        let mut stmt = self
            .conn
            .prepare("SELECT progress FROM tasks WHERE project_id = ?1")?;
        let rows = stmt.query_map(params![id], |r| r.get::<_, i64>(0))?;
        let mut values = Vec::new();
        for v in rows {
            values.push(v?);
        }

        let progress = project_progress(&values);
        let status = status_from_progress(progress);
        self.conn.execute(
            "UPDATE projects SET progress = ?1, status = ?2 WHERE id = ?3",
            params![progress, status.to_string(), id],
        )?;
        debug!(project = id, progress, %status, "project progress refreshed");
        Ok((progress, status))
    }

    fn row_to_project(row: &Row) -> rusqlite::Result<Project> {
        let role: Option<String> = row.get(4)?;
        let level: String = row.get(7)?;
        Ok(Project {
            id: row.get(0)?,
            name: row.get(1)?,
            assigned_to: row.get(2)?,
            assigned_to_name: row.get(3)?,
            assigned_to_role: role.map(|r| parse_column(4, &r)).transpose()?,
            type_id: row.get(5)?,
            type_name: row.get(6)?,
            level: parse_column(7, &level)?,
            request_date: row.get(8)?,
            plan_start_date: row.get(9)?,
            plan_end_date: row.get(10)?,
            actual_start: row.get(11)?,
            actual_end: row.get(12)?,
            live_date: row.get(13)?,
            remark: row.get(14)?,
            progress: row.get(15)?,
            status: WorkStatus::from(row.get::<_, String>(16)?),
            created_at: row.get::<_, Option<String>>(17)?.unwrap_or_default(),
        })
    }
}

fn diff(current: &Project, draft: &ProjectDraft) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    let text = |s: &str| Some(s.to_string());
    push_change(&mut changes, "name", text(&current.name), text(&draft.name));
    push_change(
        &mut changes,
        "assigned_to",
        Some(current.assigned_to.to_string()),
        Some(draft.assigned_to.to_string()),
    );
    push_change(
        &mut changes,
        "type_id",
        Some(current.type_id.to_string()),
        Some(draft.type_id.to_string()),
    );
    push_change(
        &mut changes,
        "level",
        Some(current.level.to_string()),
        Some(draft.level.to_string()),
    );
    push_change(&mut changes, "request_date", text(&current.request_date), text(&draft.request_date));
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
    push_change(&mut changes, "live_date", current.live_date.clone(), draft.live_date.clone());
    push_change(&mut changes, "remark", text(&current.remark), text(&draft.remark));
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::db::Db;
    use crate::engine::forms::UserDraft;
    use crate::engine::repo::{RefRepo, UserRepo};
    use crate::engine::types::{EffortLevel, RefKind, Role};

    fn seed(conn: &Connection) -> ProjectDraft {
        UserRepo::new(conn)
            .add(&UserDraft {
                sap: 10,
                name: "Ina".to_string(),
                username: "ina".to_string(),
                password: Some("pw".to_string()),
                role: Role::Itbp,
                position_id: None,
            })
            .unwrap();
        let type_id = RefRepo::new(conn).add(RefKind::ProjectType, "Enhancement", None).unwrap();
        ProjectDraft {
            name: "Billing".to_string(),
            assigned_to: 10,
            type_id,
            level: EffortLevel::Low,
            request_date: "2024-02-20".to_string(),
            plan_start_date: "2024-03-01".to_string(),
            plan_end_date: "2024-03-05".to_string(),
            actual_start: None,
            actual_end: None,
            live_date: None,
            remark: "urgent".to_string(),
        }
    }

    #[test]
    fn test_add_joins_names() {
        let conn = Db::open_in_memory().unwrap();
        let draft = seed(&conn);
        let repo = ProjectRepo::new(&conn);
        let id = repo.add(&draft).unwrap();

        let project = repo.find_by_id(id).unwrap().unwrap();
        assert_eq!(project.assigned_to_name.as_deref(), Some("Ina"));
        assert_eq!(project.assigned_to_role, Some(Role::Itbp));
        assert_eq!(project.type_name.as_deref(), Some("Enhancement"));
        assert_eq!(project.status, WorkStatus::ToDo);
        assert_eq!(repo.find_by_name("billing").unwrap().unwrap().id, id);
    }

    #[test]
    fn test_update_records_changed_fields_only() {
        let conn = Db::open_in_memory().unwrap();
        let draft = seed(&conn);
        let repo = ProjectRepo::new(&conn);
        let id = repo.add(&draft).unwrap();

        let edited = ProjectDraft {
            remark: "moved".to_string(),
            actual_end: Some("2024-03-06".to_string()),
            ..draft.clone()
        };
        let changes = repo.update(id, &edited, "ina").unwrap();
        let fields: Vec<_> = changes.iter().map(|c| c.field).collect();
        assert_eq!(fields, vec!["actual_end", "remark"]);

        let history = HistoryRepo::new(&conn).get_history(Entity::Project, id).unwrap();
        assert_eq!(history.len(), 2);
        assert!(repo.update(id, &edited, "ina").unwrap().is_empty());

        let project = repo.find_by_id(id).unwrap().unwrap();
        assert_eq!(
            project.delivery_status(),
            crate::engine::state::DeliveryStatus::Delay
        );
    }

    #[test]
    fn test_plan_range() {
        let conn = Db::open_in_memory().unwrap();
        let draft = seed(&conn);
        let repo = ProjectRepo::new(&conn);
        repo.add(&draft).unwrap();
        let day = |s: &str| chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        assert_eq!(repo.in_plan_range(day("2024-03-01"), day("2024-03-31")).unwrap().len(), 1);
        assert!(repo.in_plan_range(day("2024-04-01"), day("2024-04-30")).unwrap().is_empty());
    }

    #[test]
    fn test_missing_project() {
        let conn = Db::open_in_memory().unwrap();
        let draft = seed(&conn);
        let repo = ProjectRepo::new(&conn);
        assert!(matches!(
            repo.update(42, &draft, "ina"),
            Err(TrackerError::NotFound { .. })
        ));
        assert!(matches!(repo.delete(42), Err(TrackerError::NotFound { .. })));
    }
}
