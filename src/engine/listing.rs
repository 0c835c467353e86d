//! List views: search, filter by status and month/year, sort, paginate.

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{Datelike, Month, NaiveDate};
use serde::Serialize;

use super::error::{Result, TrackerError};
use super::state::parse_date;
use super::types::{Project, Task, WorkStatus};

/// A comparable cell value. Text compares case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortValue {
    Int(i64),
    Text(String),
}

impl SortValue {
    fn text(s: &str) -> Option<Self> {
        if s.trim().is_empty() {
            None
        } else {
            Some(Self::Text(s.to_lowercase()))
        }
    }

    fn opt_text(s: Option<&str>) -> Option<Self> {
        s.and_then(Self::text)
    }
}

/// A row type that can be shown in a list view.
pub trait Listable {
    /// Sortable column names; the first is the default.
    const COLUMNS: &'static [&'static str];

    /// Text the search box matches against.
    fn search_text(&self) -> &str;

    fn work_status(&self) -> WorkStatus;

    /// Date the month/year filter looks at.
    fn month_anchor(&self) -> Option<NaiveDate>;

    /// Value of a column in `COLUMNS`; `None` when the cell is empty.
    fn sort_value(&self, column: &str) -> Option<SortValue>;
}

impl Listable for Project {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "assigned_to",
        "type",
        "level",
        "request_date",
        "plan_start_date",
        "plan_end_date",
        "actual_start",
        "actual_end",
        "live_date",
        "progress",
        "status",
    ];

    fn search_text(&self) -> &str {
        &self.name
    }

    fn work_status(&self) -> WorkStatus {
        self.status
    }

    fn month_anchor(&self) -> Option<NaiveDate> {
        parse_date(&self.plan_start_date)
    }

    fn sort_value(&self, column: &str) -> Option<SortValue> {
        match column {
            "id" => Some(SortValue::Int(self.id)),
            "name" => SortValue::text(&self.name),
            "assigned_to" => SortValue::opt_text(self.assigned_to_name.as_deref()),
            "type" => SortValue::opt_text(self.type_name.as_deref()),
            "level" => SortValue::text(&self.level.to_string()),
            "request_date" => SortValue::text(&self.request_date),
            "plan_start_date" => SortValue::text(&self.plan_start_date),
            "plan_end_date" => SortValue::text(&self.plan_end_date),
            "actual_start" => SortValue::opt_text(self.actual_start.as_deref()),
            "actual_end" => SortValue::opt_text(self.actual_end.as_deref()),
            "live_date" => SortValue::opt_text(self.live_date.as_deref()),
            "progress" => Some(SortValue::Int(self.progress)),
            "status" => SortValue::text(&self.status.to_string()),
            _ => None,
        }
    }
}

impl Listable for Task {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "detail",
        "assigned_to",
        "task_group",
        "platform",
        "plan_start_date",
        "plan_end_date",
        "actual_start",
        "actual_end",
        "progress",
        "status",
    ];

    fn search_text(&self) -> &str {
        &self.detail
    }

    fn work_status(&self) -> WorkStatus {
        self.status
    }

    fn month_anchor(&self) -> Option<NaiveDate> {
        self.actual_start.as_deref().and_then(parse_date)
    }

    fn sort_value(&self, column: &str) -> Option<SortValue> {
        match column {
            "id" => Some(SortValue::Int(self.id)),
            "detail" => SortValue::text(&self.detail),
            "assigned_to" => SortValue::opt_text(self.assigned_to_name.as_deref()),
            "task_group" => SortValue::opt_text(self.task_group_name.as_deref()),
            "platform" => SortValue::opt_text(self.platform_name.as_deref()),
            "plan_start_date" => SortValue::text(&self.plan_start_date),
            "plan_end_date" => SortValue::text(&self.plan_end_date),
            "actual_start" => SortValue::opt_text(self.actual_start.as_deref()),
            "actual_end" => SortValue::opt_text(self.actual_end.as_deref()),
            "progress" => Some(SortValue::Int(self.progress)),
            "status" => SortValue::text(&self.status.to_string()),
            _ => None,
        }
    }
}

/// Accepts `1`..`12` or a month name (`mar`, `March`).
#[must_use]
pub fn parse_month(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<u32>() {
        return (1..=12).contains(&n).then_some(n);
    }
    Month::from_str(raw).ok().map(|m| m.number_from_month())
}

#[derive(Debug, Clone)]
pub struct ListQuery {
    pub search: Option<String>,
    pub status: Option<WorkStatus>,
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub sort: Option<String>,
    pub descending: bool,
    /// 1-based.
    pub page: usize,
    pub page_size: usize,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            search: None,
            status: None,
            month: None,
            year: None,
            sort: None,
            descending: false,
            page: 1,
            page_size: super::config::DEFAULT_PAGE_SIZE,
        }
    }
}

impl ListQuery {
    fn matches<T: Listable>(&self, item: &T) -> bool {
        if let Some(needle) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let needle = needle.trim().to_lowercase();
            if !item.search_text().to_lowercase().contains(&needle) {
                return false;
            }
        }
        if self.status.is_some_and(|s| s != item.work_status()) {
            return false;
        }
        if self.month.is_some() || self.year.is_some() {
            let Some(anchor) = item.month_anchor() else {
                return false;
            };
            if self.month.is_some_and(|m| m != anchor.month())
                || self.year.is_some_and(|y| y != anchor.year())
            {
                return false;
            }
        }
        true
    }

    fn sort_column<T: Listable>(&self) -> Result<&'static str> {
        let Some(requested) = self.sort.as_deref() else {
            return Ok(T::COLUMNS[0]);
        };
        let requested = requested.trim().to_lowercase().replace('-', "_");
        T::COLUMNS
            .iter()
            .copied()
            .find(|c| *c == requested)
            .ok_or_else(|| TrackerError::InvalidSortKey(requested))
    }
}

/// Counts shown above every list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub total: usize,
    pub to_do: usize,
    pub in_progress: usize,
    pub completed: usize,
}

impl StatusSummary {
    pub fn from_statuses(statuses: impl IntoIterator<Item = WorkStatus>) -> Self {
        let mut summary = Self::default();
        for status in statuses {
            summary.total += 1;
            match status {
                WorkStatus::ToDo => summary.to_do += 1,
                WorkStatus::InProgress => summary.in_progress += 1,
                WorkStatus::Completed => summary.completed += 1,
            }
        }
        summary
    }
}

/// One page of a filtered, sorted list.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub summary: StatusSummary,
}

/// Filters, sorts and paginates. Empty cells sort first when ascending.
///
/// The summary counts the whole filtered set; a page past the end is
/// clamped to the last page.
///
/// # Errors
/// Returns `InvalidSortKey` for a column the row type does not have.
pub fn apply<T: Listable + Clone>(items: &[T], query: &ListQuery) -> Result<Page<T>> {
    let column = query.sort_column::<T>()?;
    let mut filtered: Vec<&T> = items.iter().filter(|i| query.matches(*i)).collect();

    filtered.sort_by(|a, b| {
        let ord = a.sort_value(column).cmp(&b.sort_value(column));
        let ord = if query.descending { ord.reverse() } else { ord };
        ord.then_with(|| tiebreak(*a, *b))
    });

    let summary = StatusSummary::from_statuses(filtered.iter().map(|i| i.work_status()));
    let page_size = query.page_size.max(1);
    let total_pages = filtered.len().div_ceil(page_size).max(1);
    let page = query.page.clamp(1, total_pages);

    let items = filtered
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .cloned()
        .collect();

    Ok(Page {
        items,
        page,
        page_size,
        total_pages,
        summary,
    })
}

fn tiebreak<T: Listable>(a: &T, b: &T) -> Ordering {
    a.sort_value("id").cmp(&b.sort_value("id"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::{EffortLevel, Role};

    fn project(id: i64, name: &str, start: &str, status: WorkStatus) -> Project {
        Project {
            id,
            name: name.to_string(),
            assigned_to: 1,
            assigned_to_name: (id % 2 == 0).then(|| format!("Owner {id}")),
            assigned_to_role: Some(Role::Itbp),
            type_id: 1,
            type_name: None,
            level: EffortLevel::Mid,
            request_date: "2024-01-01".to_string(),
            plan_start_date: start.to_string(),
            plan_end_date: start.to_string(),
            actual_start: None,
            actual_end: None,
            live_date: None,
            remark: "-".to_string(),
            progress: id * 10,
            status,
            created_at: String::new(),
        }
    }

    fn sample() -> Vec<Project> {
        vec![
            project(1, "alpha portal", "2024-03-02", WorkStatus::ToDo),
            project(2, "Beta Billing", "2024-03-20", WorkStatus::InProgress),
            project(3, "gamma", "2024-04-01", WorkStatus::Completed),
            project(4, "Delta billing", "2023-03-15", WorkStatus::InProgress),
        ]
    }

    fn ids(page: &Page<Project>) -> Vec<i64> {
        page.items.iter().map(|p| p.id).collect()
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let query = ListQuery {
            search: Some("BILLING".to_string()),
            ..ListQuery::default()
        };
        let page = apply(&sample(), &query).unwrap();
        assert_eq!(ids(&page), vec![2, 4]);
        assert_eq!(page.summary.total, 2);
        assert_eq!(page.summary.in_progress, 2);
    }

    #[test]
    fn test_month_and_year_filter() {
        let query = ListQuery {
            month: Some(3),
            year: Some(2024),
            ..ListQuery::default()
        };
        assert_eq!(ids(&apply(&sample(), &query).unwrap()), vec![1, 2]);

        let query = ListQuery {
            month: Some(3),
            ..ListQuery::default()
        };
        assert_eq!(ids(&apply(&sample(), &query).unwrap()), vec![1, 2, 4]);
    }

    #[test]
    fn test_status_filter_and_summary() {
        let query = ListQuery {
            status: Some(WorkStatus::Completed),
            ..ListQuery::default()
        };
        let page = apply(&sample(), &query).unwrap();
        assert_eq!(ids(&page), vec![3]);
        assert_eq!(page.summary.completed, 1);
        assert_eq!(page.summary.to_do, 0);
    }

    #[test]
    fn test_sort_by_name_ignores_case() {
        let query = ListQuery {
            sort: Some("name".to_string()),
            ..ListQuery::default()
        };
        assert_eq!(ids(&apply(&sample(), &query).unwrap()), vec![1, 2, 4, 3]);

        let query = ListQuery {
            descending: true,
            ..query
        };
        assert_eq!(ids(&apply(&sample(), &query).unwrap()), vec![3, 4, 2, 1]);
    }

    #[test]
    fn test_missing_values_sort_first() {
        let query = ListQuery {
            sort: Some("assigned-to".to_string()),
            ..ListQuery::default()
        };
        assert_eq!(ids(&apply(&sample(), &query).unwrap()), vec![1, 3, 2, 4]);
    }

    #[test]
    fn test_unknown_sort_key() {
        let query = ListQuery {
            sort: Some("color".to_string()),
            ..ListQuery::default()
        };
        assert!(matches!(
            apply(&sample(), &query),
            Err(TrackerError::InvalidSortKey(k)) if k == "color"
        ));
    }

    #[test]
    fn test_pagination_clamps() {
        let query = ListQuery {
            page_size: 3,
            page: 2,
            ..ListQuery::default()
        };
        let page = apply(&sample(), &query).unwrap();
        assert_eq!(ids(&page), vec![4]);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.summary.total, 4);

        let query = ListQuery { page: 9, ..query };
        assert_eq!(apply(&sample(), &query).unwrap().page, 2);

        let empty: Vec<Project> = Vec::new();
        let page = apply(&empty, &ListQuery::default()).unwrap();
        assert_eq!(page.total_pages, 1);
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_parse_month() {
        assert_eq!(parse_month("3"), Some(3));
        assert_eq!(parse_month("13"), None);
        assert_eq!(parse_month("mar"), Some(3));
        assert_eq!(parse_month("December"), Some(12));
        assert_eq!(parse_month("smarch"), None);
    }
}
