//! Core types for worktrack.
//!
//! Note: `DeliveryStatus` (On Time / Delay / N/A) is derived and lives in
//! `state.rs`. `WorkStatus` here is the stored status, recomputed from
//! progress on every write.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::state::{self, DeliveryStatus};

/// Closed set of roles a user can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Itbp,
    Itga,
    Sap,
    DataScience,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Itbp,
        Role::Itga,
        Role::Sap,
        Role::DataScience,
    ];

    /// Human label used in menus and tables.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::Itbp => "ITBP",
            Self::Itga => "ITGA",
            Self::Sap => "SAP",
            Self::DataScience => "Data Science",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => write!(f, "ADMIN"),
            Self::Itbp => write!(f, "ITBP"),
            Self::Itga => write!(f, "ITGA"),
            Self::Sap => write!(f, "SAP"),
            Self::DataScience => write!(f, "DATA_SCIENCE"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "ADMIN" => Ok(Self::Admin),
            "ITBP" => Ok(Self::Itbp),
            // Engineers are the ITGA group.
            "ITGA" | "ENGINEER" => Ok(Self::Itga),
            "SAP" => Ok(Self::Sap),
            "DATA_SCIENCE" => Ok(Self::DataScience),
            _ => Err(format!(
                "unknown role '{s}' (expected ADMIN, ITBP, ITGA, SAP or DATA_SCIENCE)"
            )),
        }
    }
}

/// Coarse sizing of a project, constraining its planned duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EffortLevel {
    Low,
    Mid,
    High,
}

impl fmt::Display for EffortLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Mid => write!(f, "MID"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

impl FromStr for EffortLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MID" | "MEDIUM" => Ok(Self::Mid),
            "HIGH" => Ok(Self::High),
            _ => Err(format!("unknown effort level '{s}' (expected LOW, MID or HIGH)")),
        }
    }
}

/// Stored work status, driven by progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkStatus {
    ToDo,
    InProgress,
    Completed,
}

impl WorkStatus {
    pub const ALL: [WorkStatus; 3] = [Self::ToDo, Self::InProgress, Self::Completed];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::ToDo => "To Do",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
        }
    }
}

impl fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ToDo => write!(f, "TO_DO"),
            Self::InProgress => write!(f, "IN_PROGRESS"),
            Self::Completed => write!(f, "COMPLETED"),
        }
    }
}

impl From<String> for WorkStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "IN_PROGRESS" => Self::InProgress,
            "COMPLETED" => Self::Completed,
            _ => Self::ToDo,
        }
    }
}

impl FromStr for WorkStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace([' ', '-'], "_").as_str() {
            "TO_DO" | "TODO" => Ok(Self::ToDo),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "COMPLETED" | "DONE" => Ok(Self::Completed),
            _ => Err(format!(
                "unknown status '{s}' (expected TO_DO, IN_PROGRESS or COMPLETED)"
            )),
        }
    }
}

/// A registered user. `sap` is the staff number and primary key.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub sap: i64,
    pub name: String,
    pub username: String,
    pub role: Role,
    pub position_id: Option<i64>,
    pub position_name: Option<String>,
}

/// A project as stored, joined with its assignee and type names.
#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub assigned_to: i64,
    pub assigned_to_name: Option<String>,
    pub assigned_to_role: Option<Role>,
    pub type_id: i64,
    pub type_name: Option<String>,
    pub level: EffortLevel,
    pub request_date: String,
    pub plan_start_date: String,
    pub plan_end_date: String,
    pub actual_start: Option<String>,
    pub actual_end: Option<String>,
    pub live_date: Option<String>,
    pub remark: String,
    pub progress: i64,
    pub status: WorkStatus,
    pub created_at: String,
}

impl Project {
    /// On Time / Delay / N/A for this project.
    #[must_use]
    pub fn delivery_status(&self) -> DeliveryStatus {
        state::derive_status(Some(&self.plan_end_date), self.actual_end.as_deref())
    }
}

/// A task as stored, joined with the names the list views display.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: i64,
    pub project_id: i64,
    pub project_name: Option<String>,
    pub assigned_to: i64,
    pub assigned_to_name: Option<String>,
    pub assigned_to_role: Option<Role>,
    pub task_group_id: i64,
    pub task_group_name: Option<String>,
    pub platform_id: i64,
    pub platform_name: Option<String>,
    pub detail: String,
    pub plan_start_date: String,
    pub plan_end_date: String,
    pub actual_start: Option<String>,
    pub actual_end: Option<String>,
    pub progress: i64,
    pub status: WorkStatus,
    pub created_at: String,
}

impl Task {
    /// On Time / Delay / N/A for this task.
    #[must_use]
    pub fn delivery_status(&self) -> DeliveryStatus {
        state::derive_status(Some(&self.plan_end_date), self.actual_end.as_deref())
    }
}

/// The four kinds of reference data managed by administrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefKind {
    ProjectType,
    Platform,
    TaskGroup,
    Position,
}

impl RefKind {
    pub const ALL: [RefKind; 4] = [
        Self::ProjectType,
        Self::Platform,
        Self::TaskGroup,
        Self::Position,
    ];

    /// Backing table. Static so it can be spliced into SQL safely.
    #[must_use]
    pub fn table(self) -> &'static str {
        match self {
            Self::ProjectType => "project_types",
            Self::Platform => "platforms",
            Self::TaskGroup => "task_groups",
            Self::Position => "positions",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::ProjectType => "Project Type",
            Self::Platform => "Platform Task",
            Self::TaskGroup => "Task Group",
            Self::Position => "Position User",
        }
    }
}

impl FromStr for RefKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['_', ' '], "-").as_str() {
            "project-type" | "project-types" | "type" | "types" => Ok(Self::ProjectType),
            "platform" | "platforms" => Ok(Self::Platform),
            "task-group" | "task-groups" | "group" | "groups" => Ok(Self::TaskGroup),
            "position" | "positions" => Ok(Self::Position),
            _ => Err(format!(
                "unknown data kind '{s}' (expected project-type, platform, task-group or position)"
            )),
        }
    }
}

/// One row of reference data. Only positions carry a role.
#[derive(Debug, Clone, Serialize)]
pub struct RefItem {
    pub id: i64,
    pub name: String,
    pub role: Option<Role>,
}

/// Which entity an update-history row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Entity {
    Project,
    Task,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Project => write!(f, "project"),
            Self::Task => write!(f, "task"),
        }
    }
}

/// A single field change recorded by an edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub field: &'static str,
    pub before: Option<String>,
    pub after: Option<String>,
}

/// A stored update-history row.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub field: String,
    pub before: Option<String>,
    pub after: Option<String>,
    pub changed_by: String,
    pub changed_at: String,
}
