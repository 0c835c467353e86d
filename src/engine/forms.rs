//! Add/edit forms: collect every field error, then hand back a normalized draft.
//!
//! A form holds raw input the way a user typed it. `validate` never stops at
//! the first problem; `into_draft` refuses to produce a draft while any field
//! error remains.

use super::error::{Result, TrackerError};
use super::state::{normalize_date, parse_instant, status_from_progress};
use super::types::{EffortLevel, Project, Role, Task, User, WorkStatus};
use super::validate::{self, FieldErrors};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Add,
    Edit,
}

fn blank(s: &str) -> bool {
    s.trim().is_empty()
}

fn present(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !blank(v))
}

fn optional_date(raw: Option<&str>) -> Option<String> {
    present(raw).and_then(normalize_date)
}

fn required_date(raw: &str) -> String {
    normalize_date(raw).unwrap_or_else(|| raw.trim().to_string())
}

#[derive(Debug, Clone, Default)]
pub struct ProjectForm {
    pub name: String,
    pub assigned_to: Option<i64>,
    pub assigned_group: Option<Role>,
    pub type_id: Option<i64>,
    pub level: Option<EffortLevel>,
    pub request_date: String,
    pub plan_start_date: String,
    pub plan_end_date: String,
    pub actual_start: Option<String>,
    pub actual_end: Option<String>,
    pub live_date: Option<String>,
    pub remark: String,
}

/// A validated project ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDraft {
    pub name: String,
    pub assigned_to: i64,
    pub type_id: i64,
    pub level: EffortLevel,
    pub request_date: String,
    pub plan_start_date: String,
    pub plan_end_date: String,
    pub actual_start: Option<String>,
    pub actual_end: Option<String>,
    pub live_date: Option<String>,
    pub remark: String,
}

impl ProjectForm {
    /// Pre-fills an edit form from the stored project.
    #[must_use]
    pub fn from_project(project: &Project) -> Self {
        Self {
            name: project.name.clone(),
            assigned_to: Some(project.assigned_to),
            assigned_group: project.assigned_to_role,
            type_id: Some(project.type_id),
            level: Some(project.level),
            request_date: project.request_date.clone(),
            plan_start_date: project.plan_start_date.clone(),
            plan_end_date: project.plan_end_date.clone(),
            actual_start: project.actual_start.clone(),
            actual_end: project.actual_end.clone(),
            live_date: project.live_date.clone(),
            remark: project.remark.clone(),
        }
    }

    /// Non-admin creators always own what they create.
    pub fn assign_to_self(&mut self, creator: &User) {
        self.assigned_to = Some(creator.sap);
        self.assigned_group = Some(creator.role);
    }

    #[must_use]
    pub fn validate(&self, creator: Role) -> FieldErrors {
        let mut errors = FieldErrors::new();

        if blank(&self.name) {
            errors.set("name", "Project name is required");
        }
        if self.assigned_to.is_none() {
            errors.set("assigned_to", "Assigned To is required");
        }
        if creator == Role::Admin && self.assigned_group.is_none() {
            errors.set("assigned_group", "Assigned To Group is required");
        }
        if self.type_id.is_none() {
            errors.set("type_id", "Project type is required");
        }
        if self.level.is_none() {
            errors.set("level", "Effort level is required");
        }
        if blank(&self.request_date) {
            errors.set("request_date", "Request date is required");
        } else if parse_instant(&self.request_date).is_none() {
            errors.set("request_date", "Request date is not a valid date");
        }
        if blank(&self.plan_start_date) {
            errors.set("plan_start_date", "Plan start date is required");
        }
        if blank(&self.plan_end_date) {
            errors.set("plan_end_date", "Plan end date is required");
        }
        if blank(&self.remark) {
            errors.set("remark", "Remark is required");
        }

        if !blank(&self.plan_start_date) && !blank(&self.plan_end_date) {
            let checked = match self.level {
                Some(level) => {
                    validate::validate_effort(level, &self.plan_start_date, &self.plan_end_date)
                }
                None => validate::plan_duration_days(&self.plan_start_date, &self.plan_end_date),
            };
            if let Err(e) = checked {
                errors.set(e.field(), e.to_string());
            }
        }

        for (field, label, raw) in [
            ("actual_start", "Actual start", &self.actual_start),
            ("actual_end", "Actual end", &self.actual_end),
            ("live_date", "Live date", &self.live_date),
        ] {
            validate::check_optional_date(&mut errors, field, label, raw.as_deref());
        }
        errors
    }

    /// Validates and normalizes into a draft.
    ///
    /// # Errors
    /// Returns `Validation` carrying every field error.
    pub fn into_draft(self, creator: Role) -> Result<ProjectDraft> {
        let errors = self.validate(creator);
        let (Some(assigned_to), Some(type_id), Some(level), true) =
            (self.assigned_to, self.type_id, self.level, errors.is_empty())
        else {
            return Err(TrackerError::Validation(errors));
        };
        Ok(ProjectDraft {
            name: self.name.trim().to_string(),
            assigned_to,
            type_id,
            level,
            request_date: required_date(&self.request_date),
            plan_start_date: required_date(&self.plan_start_date),
            plan_end_date: required_date(&self.plan_end_date),
            actual_start: optional_date(self.actual_start.as_deref()),
            actual_end: optional_date(self.actual_end.as_deref()),
            live_date: optional_date(self.live_date.as_deref()),
            remark: self.remark.trim().to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct TaskForm {
    pub mode: FormMode,
    pub assigned_to: Option<i64>,
    pub assigned_group: Option<Role>,
    pub task_group_id: Option<i64>,
    pub platform_id: Option<i64>,
    pub detail: String,
    pub plan_start_date: String,
    pub plan_end_date: String,
    pub actual_start: Option<String>,
    pub actual_end: Option<String>,
    /// Raw progress input; parsed during validation.
    pub progress: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub assigned_to: i64,
    pub task_group_id: i64,
    pub platform_id: i64,
    pub detail: String,
    pub plan_start_date: String,
    pub plan_end_date: String,
    pub actual_start: Option<String>,
    pub actual_end: Option<String>,
    pub progress: i64,
    pub status: WorkStatus,
}

impl TaskForm {
    #[must_use]
    pub fn new_add() -> Self {
        Self {
            mode: FormMode::Add,
            assigned_to: None,
            assigned_group: None,
            task_group_id: None,
            platform_id: None,
            detail: String::new(),
            plan_start_date: String::new(),
            plan_end_date: String::new(),
            actual_start: None,
            actual_end: None,
            progress: "0".to_string(),
        }
    }

    /// Pre-fills an edit form from the stored task.
    #[must_use]
    pub fn from_task(task: &Task) -> Self {
        Self {
            mode: FormMode::Edit,
            assigned_to: Some(task.assigned_to),
            assigned_group: task.assigned_to_role,
            task_group_id: Some(task.task_group_id),
            platform_id: Some(task.platform_id),
            detail: task.detail.clone(),
            plan_start_date: task.plan_start_date.clone(),
            plan_end_date: task.plan_end_date.clone(),
            actual_start: task.actual_start.clone(),
            actual_end: task.actual_end.clone(),
            progress: task.progress.to_string(),
        }
    }

    pub fn assign_to_self(&mut self, creator: &User) {
        self.assigned_to = Some(creator.sap);
        self.assigned_group = Some(creator.role);
    }

    #[must_use]
    pub fn validate(&self, creator: Role) -> FieldErrors {
        let mut errors = FieldErrors::new();

        if creator == Role::Admin && self.assigned_group.is_none() {
            errors.set("assigned_group", "Assigned group is required");
        }
        if self.assigned_to.is_none() {
            errors.set("assigned_to", "Assigned user is required");
        }
        if self.task_group_id.is_none() {
            errors.set("task_group_id", "Task group is required");
        }
        if blank(&self.detail) {
            errors.set("detail", "Task detail is required");
        }
        if blank(&self.plan_start_date) {
            errors.set("plan_start_date", "Plan start date is required");
        }
        if blank(&self.plan_end_date) {
            errors.set("plan_end_date", "Plan end date is required");
        }
        if self.platform_id.is_none() {
            errors.set("platform_id", "Platform is required");
        }

        if !blank(&self.plan_start_date) && !blank(&self.plan_end_date) {
            match validate::plan_duration_days(&self.plan_start_date, &self.plan_end_date) {
                Err(validate::EffortError::StartAfterEnd) => {
                    errors.set("plan_start_date", "Plan start cannot be after plan end");
                    errors.set("plan_end_date", "Plan end cannot be before plan start");
                }
                Err(e) => errors.set(e.field(), e.to_string()),
                Ok(_) => {}
            }
        }

        if self.mode == FormMode::Edit {
            validate::check_progress_fields(
                &mut errors,
                &self.progress,
                self.actual_start.as_deref(),
                self.actual_end.as_deref(),
            );
        }
        errors
    }

    /// Validates and normalizes into a draft. Adds always start at 0%.
    ///
    /// # Errors
    /// Returns `Validation` carrying every field error.
    pub fn into_draft(self, creator: Role) -> Result<TaskDraft> {
        let errors = self.validate(creator);
        let (Some(assigned_to), Some(task_group_id), Some(platform_id), true) = (
            self.assigned_to,
            self.task_group_id,
            self.platform_id,
            errors.is_empty(),
        ) else {
            return Err(TrackerError::Validation(errors));
        };

        let (progress, actual_start, actual_end) = match self.mode {
            FormMode::Add => (0, None, None),
            FormMode::Edit => (
                validate::parse_progress(&self.progress).unwrap_or_default(),
                optional_date(self.actual_start.as_deref()),
                optional_date(self.actual_end.as_deref()),
            ),
        };

        Ok(TaskDraft {
            assigned_to,
            task_group_id,
            platform_id,
            detail: self.detail.trim().to_string(),
            plan_start_date: required_date(&self.plan_start_date),
            plan_end_date: required_date(&self.plan_end_date),
            actual_start,
            actual_end,
            progress,
            status: status_from_progress(progress),
        })
    }
}

#[derive(Debug, Clone)]
pub struct UserForm {
    pub mode: FormMode,
    pub sap: Option<i64>,
    pub name: String,
    pub username: String,
    /// On edit, blank keeps the stored password.
    pub password: String,
    pub role: Option<Role>,
    pub position_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDraft {
    pub sap: i64,
    pub name: String,
    pub username: String,
    pub password: Option<String>,
    pub role: Role,
    pub position_id: Option<i64>,
}

impl UserForm {
    #[must_use]
    pub fn from_user(user: &User) -> Self {
        Self {
            mode: FormMode::Edit,
            sap: Some(user.sap),
            name: user.name.clone(),
            username: user.username.clone(),
            password: String::new(),
            role: Some(user.role),
            position_id: user.position_id,
        }
    }

    #[must_use]
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        match self.sap {
            None => errors.set("sap", "SAP is required"),
            Some(sap) if sap <= 0 => errors.set("sap", "SAP must be a positive number"),
            Some(_) => {}
        }
        if blank(&self.name) {
            errors.set("name", "Name is required");
        }
        if blank(&self.username) {
            errors.set("username", "Username is required");
        }
        if self.mode == FormMode::Add && self.password.is_empty() {
            errors.set("password", "Password is required");
        }
        match self.role {
            None => errors.set("role", "Role is required"),
            Some(role) if role != Role::Admin && self.position_id.is_none() => {
                errors.set("position_id", "Position is required");
            }
            Some(_) => {}
        }
        errors
    }

    /// # Errors
    /// Returns `Validation` carrying every field error.
    pub fn into_draft(self) -> Result<UserDraft> {
        let errors = self.validate();
        let (Some(sap), Some(role), true) = (self.sap, self.role, errors.is_empty()) else {
            return Err(TrackerError::Validation(errors));
        };
        Ok(UserDraft {
            sap,
            name: self.name.trim().to_string(),
            username: self.username.trim().to_string(),
            password: (!self.password.is_empty()).then_some(self.password),
            role,
            // Admins carry no position.
            position_id: if role == Role::Admin { None } else { self.position_id },
        })
    }
}
