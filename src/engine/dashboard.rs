//! Dashboard: task totals, per-project summary, monthly chart, reminders.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use super::access::visible_projects;
use super::listing::StatusSummary;
use super::session::SessionUser;
use super::state::{parse_date, DeliveryStatus};
use super::types::{Project, Role, Task, WorkStatus};

/// Filters for the chart series.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChartFilter {
    pub month: Option<u32>,
    pub year: Option<i32>,
    /// Only count records with this delivery status. N/A never matches.
    pub delivery: Option<DeliveryStatus>,
    /// Only count projects touching this role and tasks assigned to it.
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectRow {
    pub id: i64,
    pub name: String,
    pub assigned_to: Option<String>,
    pub plan_start_date: String,
    pub plan_end_date: String,
    pub actual_end: Option<String>,
    pub delivery: DeliveryStatus,
    pub tasks: StatusSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartPoint {
    /// e.g. "Mar 2024"
    pub label: String,
    pub year: i32,
    pub month: u32,
    pub projects: usize,
    pub tasks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Reminder {
    pub task_id: i64,
    pub detail: String,
    pub plan_end_date: String,
    pub days_left: i64,
    pub is_delay: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReminderGroup {
    pub project: String,
    pub tasks: Vec<Reminder>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub totals: StatusSummary,
    pub projects: Vec<ProjectRow>,
    pub chart: Vec<ChartPoint>,
    pub reminders: Vec<ReminderGroup>,
}

/// Tasks of one project the viewer's chart counts.
fn relevant_tasks<'a>(viewer: &SessionUser, own: &[&'a Task]) -> Vec<&'a Task> {
    match viewer.role {
        Role::Admin | Role::Itbp => own.to_vec(),
        Role::Itga | Role::Sap | Role::DataScience => own
            .iter()
            .copied()
            .filter(|t| t.assigned_to == viewer.sap)
            .collect(),
    }
}

fn delivery_matches(filter: Option<DeliveryStatus>, status: DeliveryStatus) -> bool {
    match filter {
        None => true,
        Some(wanted) => status != DeliveryStatus::NotApplicable && status == wanted,
    }
}

/// Month-by-month series keyed on plan start. Empty months are dropped.
#[must_use]
pub fn chart_series(
    viewer: &SessionUser,
    projects: &[&Project],
    tasks: &[Task],
    filter: &ChartFilter,
) -> Vec<ChartPoint> {
    let mut buckets: BTreeMap<(i32, u32), (usize, usize)> = BTreeMap::new();

    for project in projects {
        let Some(start) = parse_date(&project.plan_start_date) else {
            continue;
        };
        if filter.month.is_some_and(|m| m != start.month())
            || filter.year.is_some_and(|y| y != start.year())
        {
            continue;
        }

        let own: Vec<&Task> = tasks.iter().filter(|t| t.project_id == project.id).collect();
        if let Some(role) = filter.role {
            let touches_role = project.assigned_to_role == Some(role)
                || own.iter().any(|t| t.assigned_to_role == Some(role));
            if !touches_role {
                continue;
            }
        }

        let project_count = usize::from(delivery_matches(filter.delivery, project.delivery_status()));
        let task_count = relevant_tasks(viewer, &own)
            .into_iter()
            .filter(|t| filter.role.is_none() || t.assigned_to_role == filter.role)
            .filter(|t| delivery_matches(filter.delivery, t.delivery_status()))
            .count();

        let bucket = buckets.entry((start.year(), start.month())).or_default();
        bucket.0 += project_count;
        bucket.1 += task_count;
    }

    buckets
        .into_iter()
        .filter(|(_, (p, t))| *p > 0 || *t > 0)
        .filter_map(|((year, month), (projects, tasks))| {
            let label = NaiveDate::from_ymd_opt(year, month, 1)?
                .format("%b %Y")
                .to_string();
            Some(ChartPoint {
                label,
                year,
                month,
                projects,
                tasks,
            })
        })
        .collect()
}

/// The viewer's unfinished tasks due within `window_days`, grouped by project.
///
/// Overdue tasks are included and flagged as delayed.
#[must_use]
pub fn reminders(
    viewer: &SessionUser,
    tasks: &[Task],
    today: NaiveDate,
    window_days: i64,
) -> Vec<ReminderGroup> {
    let horizon = today + Duration::days(window_days);
    let mut groups: BTreeMap<String, Vec<Reminder>> = BTreeMap::new();

    for task in tasks {
        if task.assigned_to != viewer.sap || task.status == WorkStatus::Completed {
            continue;
        }
        let Some(plan_end) = parse_date(&task.plan_end_date) else {
            continue;
        };
        if plan_end > horizon {
            continue;
        }
        let project = task
            .project_name
            .clone()
            .unwrap_or_else(|| format!("Project #{}", task.project_id));
        groups.entry(project).or_default().push(Reminder {
            task_id: task.id,
            detail: task.detail.clone(),
            plan_end_date: task.plan_end_date.clone(),
            days_left: (plan_end - today).num_days(),
            is_delay: plan_end < today,
        });
    }

    groups
        .into_iter()
        .map(|(project, mut tasks)| {
            tasks.sort_by(|a, b| a.plan_end_date.cmp(&b.plan_end_date));
            ReminderGroup { project, tasks }
        })
        .collect()
}

/// Assembles everything the dashboard shows for one viewer.
#[must_use]
pub fn build(
    viewer: &SessionUser,
    projects: &[Project],
    tasks: &[Task],
    filter: &ChartFilter,
    today: NaiveDate,
    window_days: i64,
) -> Dashboard {
    let visible = visible_projects(viewer, projects, tasks);

    let rows: Vec<ProjectRow> = visible
        .iter()
        .map(|p| ProjectRow {
            id: p.id,
            name: p.name.clone(),
            assigned_to: p.assigned_to_name.clone(),
            plan_start_date: p.plan_start_date.clone(),
            plan_end_date: p.plan_end_date.clone(),
            actual_end: p.actual_end.clone(),
            delivery: p.delivery_status(),
            tasks: StatusSummary::from_statuses(
                tasks.iter().filter(|t| t.project_id == p.id).map(|t| t.status),
            ),
        })
        .collect();

    let totals = StatusSummary::from_statuses(
        tasks
            .iter()
            .filter(|t| visible.iter().any(|p| p.id == t.project_id))
            .map(|t| t.status),
    );

    let reminders = if viewer.role == Role::Admin {
        Vec::new()
    } else {
        reminders(viewer, tasks, today, window_days)
    };

    Dashboard {
        totals,
        projects: rows,
        chart: chart_series(viewer, &visible, tasks, filter),
        reminders,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::EffortLevel;

    fn viewer(sap: i64, role: Role) -> SessionUser {
        SessionUser {
            sap,
            name: format!("user{sap}"),
            username: format!("user{sap}"),
            role,
        }
    }

    fn project(id: i64, start: &str, end: &str, actual_end: Option<&str>) -> Project {
        Project {
            id,
            name: format!("P{id}"),
            assigned_to: 10,
            assigned_to_name: Some("Ina".to_string()),
            assigned_to_role: Some(Role::Itbp),
            type_id: 1,
            type_name: None,
            level: EffortLevel::Low,
            request_date: start.to_string(),
            plan_start_date: start.to_string(),
            plan_end_date: end.to_string(),
            actual_start: None,
            actual_end: actual_end.map(str::to_string),
            live_date: None,
            remark: "-".to_string(),
            progress: 0,
            status: WorkStatus::ToDo,
            created_at: String::new(),
        }
    }

    fn task(id: i64, project_id: i64, assignee: (i64, Role), end: &str, status: WorkStatus) -> Task {
        Task {
            id,
            project_id,
            project_name: Some(format!("P{project_id}")),
            assigned_to: assignee.0,
            assigned_to_name: None,
            assigned_to_role: Some(assignee.1),
            task_group_id: 1,
            task_group_name: None,
            platform_id: 1,
            platform_name: None,
            detail: format!("task {id}"),
            plan_start_date: "2024-03-01".to_string(),
            plan_end_date: end.to_string(),
            actual_start: None,
            actual_end: None,
            progress: 0,
            status,
            created_at: String::new(),
        }
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_chart_buckets_by_plan_start_month() {
        let projects = vec![
            project(1, "2024-03-01", "2024-03-05", Some("2024-03-05")),
            project(2, "2024-03-20", "2024-03-22", Some("2024-03-25")),
            project(3, "2024-01-10", "2024-01-12", None),
        ];
        let tasks = vec![task(1, 1, (30, Role::Itga), "2024-03-04", WorkStatus::ToDo)];
        let refs: Vec<&Project> = projects.iter().collect();

        let series = chart_series(&viewer(1, Role::Admin), &refs, &tasks, &ChartFilter::default());
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].label, "Jan 2024");
        assert_eq!(series[1].label, "Mar 2024");
        assert_eq!((series[1].projects, series[1].tasks), (2, 1));
    }

    #[test]
    fn test_chart_delivery_filter_skips_na() {
        let projects = vec![
            project(1, "2024-03-01", "2024-03-05", Some("2024-03-05")),
            project(2, "2024-03-20", "2024-03-22", Some("2024-03-25")),
            project(3, "2024-01-10", "2024-01-12", None),
        ];
        let refs: Vec<&Project> = projects.iter().collect();
        let filter = ChartFilter {
            delivery: Some(DeliveryStatus::Delay),
            ..ChartFilter::default()
        };
        let series = chart_series(&viewer(1, Role::Admin), &refs, &[], &filter);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].projects, 1);
    }

    #[test]
    fn test_chart_role_filter() {
        let projects = vec![
            project(1, "2024-03-01", "2024-03-05", None),
            project(2, "2024-04-01", "2024-04-05", None),
        ];
        let tasks = vec![
            task(1, 1, (30, Role::Sap), "2024-03-04", WorkStatus::ToDo),
            task(2, 1, (31, Role::Itga), "2024-03-04", WorkStatus::ToDo),
        ];
        let refs: Vec<&Project> = projects.iter().collect();
        let filter = ChartFilter {
            role: Some(Role::Sap),
            ..ChartFilter::default()
        };
        let series = chart_series(&viewer(1, Role::Admin), &refs, &tasks, &filter);
        assert_eq!(series.len(), 1);
        assert_eq!((series[0].projects, series[0].tasks), (1, 1));
    }

    #[test]
    fn test_reminders_window_and_delay() {
        let me = viewer(30, Role::Itga);
        let tasks = vec![
            task(1, 1, (30, Role::Itga), "2024-03-08", WorkStatus::InProgress),
            task(2, 1, (30, Role::Itga), "2024-03-01", WorkStatus::ToDo),
            task(3, 2, (30, Role::Itga), "2024-03-20", WorkStatus::ToDo),
            task(4, 2, (30, Role::Itga), "2024-03-06", WorkStatus::Completed),
            task(5, 2, (31, Role::Itga), "2024-03-06", WorkStatus::ToDo),
        ];
        let groups = reminders(&me, &tasks, day("2024-03-05"), 7);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].project, "P1");
        let ids: Vec<i64> = groups[0].tasks.iter().map(|r| r.task_id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert!(groups[0].tasks[0].is_delay);
        assert_eq!(groups[0].tasks[1].days_left, 3);
    }

    #[test]
    fn test_build_scopes_to_visible_projects() {
        let mut other = project(2, "2024-03-01", "2024-03-05", None);
        other.assigned_to = 20;
        other.assigned_to_role = Some(Role::Sap);
        let projects = vec![project(1, "2024-03-01", "2024-03-05", None), other];
        let tasks = vec![
            task(1, 1, (30, Role::Itga), "2024-03-04", WorkStatus::ToDo),
            task(2, 2, (20, Role::Sap), "2024-03-04", WorkStatus::Completed),
        ];

        let admin = build(
            &viewer(1, Role::Admin),
            &projects,
            &tasks,
            &ChartFilter::default(),
            day("2024-03-02"),
            7,
        );
        assert_eq!(admin.projects.len(), 2);
        assert_eq!(admin.totals.total, 2);
        assert!(admin.reminders.is_empty());

        let itga = build(
            &viewer(30, Role::Itga),
            &projects,
            &tasks,
            &ChartFilter::default(),
            day("2024-03-02"),
            7,
        );
        assert_eq!(itga.projects.len(), 1);
        assert_eq!(itga.totals.to_do, 1);
        assert_eq!(itga.reminders.len(), 1);
    }
}
