//! Kanban summary: task counts per status column, grouped by project or assignee.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use super::state::parse_date;
use super::types::{Role, Task, WorkStatus};

/// How tasks are grouped inside each column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum KanbanMode {
    Project,
    /// Assignees holding one role; only ITGA, SAP and Data Science.
    Assignee(Role),
}

impl fmt::Display for KanbanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Project => write!(f, "PROJECT"),
            Self::Assignee(role) => write!(f, "{role}"),
        }
    }
}

impl FromStr for KanbanMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("project") {
            return Ok(Self::Project);
        }
        match s.parse::<Role>()? {
            role @ (Role::Itga | Role::Sap | Role::DataScience) => Ok(Self::Assignee(role)),
            other => Err(format!(
                "cannot group by {other} (expected PROJECT, ITGA, SAP or DATA_SCIENCE)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KanbanGroup {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct KanbanColumn {
    pub status: WorkStatus,
    pub groups: Vec<KanbanGroup>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KanbanBoard {
    pub mode: KanbanMode,
    pub columns: Vec<KanbanColumn>,
}

impl KanbanBoard {
    #[must_use]
    pub fn column(&self, status: WorkStatus) -> Option<&KanbanColumn> {
        self.columns.iter().find(|c| c.status == status)
    }
}

/// Actual start when work has begun, plan start otherwise.
#[must_use]
pub fn reference_date(task: &Task) -> Option<NaiveDate> {
    task.actual_start
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .and_then(parse_date)
        .or_else(|| parse_date(&task.plan_start_date))
}

fn in_period(task: &Task, month: Option<u32>, year: Option<i32>) -> bool {
    if month.is_none() && year.is_none() {
        return true;
    }
    let Some(date) = reference_date(task) else {
        return false;
    };
    month.map_or(true, |m| m == date.month()) && year.map_or(true, |y| y == date.year())
}

fn group_key(task: &Task, mode: KanbanMode) -> Option<String> {
    match mode {
        KanbanMode::Project => Some(
            task.project_name
                .clone()
                .unwrap_or_else(|| "Unknown Project".to_string()),
        ),
        KanbanMode::Assignee(role) => (task.assigned_to_role == Some(role)).then(|| {
            task.assigned_to_name
                .clone()
                .unwrap_or_else(|| format!("Unassigned {}", role.label()))
        }),
    }
}

/// Builds the board. Within a column, groups with no tasks are dropped and
/// the rest are ordered by count descending, then by name.
#[must_use]
pub fn build(tasks: &[Task], mode: KanbanMode, month: Option<u32>, year: Option<i32>) -> KanbanBoard {
    let mut counts: BTreeMap<(String, usize), usize> = BTreeMap::new();
    for task in tasks.iter().filter(|t| in_period(t, month, year)) {
        let Some(key) = group_key(task, mode) else {
            continue;
        };
        let column = WorkStatus::ALL
            .iter()
            .position(|s| *s == task.status)
            .unwrap_or_default();
        *counts.entry((key, column)).or_default() += 1;
    }

    let columns = WorkStatus::ALL
        .iter()
        .enumerate()
        .map(|(idx, status)| {
            let mut groups: Vec<KanbanGroup> = counts
                .iter()
                .filter(|((_, col), count)| *col == idx && **count > 0)
                .map(|((name, _), count)| KanbanGroup {
                    name: name.clone(),
                    count: *count,
                })
                .collect();
            groups.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
            KanbanColumn {
                status: *status,
                groups,
            }
        })
        .collect();

    KanbanBoard { mode, columns }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(project: Option<&str>, assignee: Option<(&str, Role)>, status: WorkStatus) -> Task {
        Task {
            id: 1,
            project_id: 1,
            project_name: project.map(str::to_string),
            assigned_to: 1,
            assigned_to_name: assignee.map(|(n, _)| n.to_string()),
            assigned_to_role: assignee.map(|(_, r)| r),
            task_group_id: 1,
            task_group_name: None,
            platform_id: 1,
            platform_name: None,
            detail: "work".to_string(),
            plan_start_date: "2024-05-10".to_string(),
            plan_end_date: "2024-05-20".to_string(),
            actual_start: None,
            actual_end: None,
            progress: 0,
            status,
            created_at: String::new(),
        }
    }

    fn names(board: &KanbanBoard, status: WorkStatus) -> Vec<(String, usize)> {
        board
            .column(status)
            .map(|c| c.groups.iter().map(|g| (g.name.clone(), g.count)).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_project_mode_counts_desc() {
        let tasks = vec![
            task(Some("Alpha"), None, WorkStatus::ToDo),
            task(Some("Beta"), None, WorkStatus::ToDo),
            task(Some("Beta"), None, WorkStatus::ToDo),
            task(None, None, WorkStatus::Completed),
        ];
        let board = build(&tasks, KanbanMode::Project, None, None);
        assert_eq!(
            names(&board, WorkStatus::ToDo),
            vec![("Beta".to_string(), 2), ("Alpha".to_string(), 1)]
        );
        assert!(names(&board, WorkStatus::InProgress).is_empty());
        assert_eq!(
            names(&board, WorkStatus::Completed),
            vec![("Unknown Project".to_string(), 1)]
        );
    }

    #[test]
    fn test_assignee_mode_filters_by_role() {
        let tasks = vec![
            task(Some("A"), Some(("Kai", Role::Itga)), WorkStatus::InProgress),
            task(Some("A"), Some(("Sam", Role::Sap)), WorkStatus::InProgress),
        ];
        let board = build(&tasks, KanbanMode::Assignee(Role::Itga), None, None);
        assert_eq!(
            names(&board, WorkStatus::InProgress),
            vec![("Kai".to_string(), 1)]
        );
    }

    #[test]
    fn test_reference_date_prefers_actual_start() {
        let mut started = task(Some("A"), None, WorkStatus::InProgress);
        started.actual_start = Some("2024-06-02".to_string());
        let planned = task(Some("B"), None, WorkStatus::ToDo);

        assert_eq!(reference_date(&started), NaiveDate::from_ymd_opt(2024, 6, 2));

        let tasks = vec![started, planned];
        let june = build(&tasks, KanbanMode::Project, Some(6), Some(2024));
        assert_eq!(names(&june, WorkStatus::InProgress).len(), 1);
        assert!(names(&june, WorkStatus::ToDo).is_empty());

        let may = build(&tasks, KanbanMode::Project, Some(5), None);
        assert_eq!(names(&may, WorkStatus::ToDo).len(), 1);
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("project".parse::<KanbanMode>(), Ok(KanbanMode::Project));
        assert_eq!(
            "data_science".parse::<KanbanMode>(),
            Ok(KanbanMode::Assignee(Role::DataScience))
        );
        assert!("itbp".parse::<KanbanMode>().is_err());
        assert_eq!(KanbanMode::Assignee(Role::Sap).to_string(), "SAP");
    }
}
