//! Role-based access: capability table, project visibility, task ownership, menu.

use serde::Serialize;

use super::error::{Result, TrackerError};
use super::session::SessionUser;
use super::types::{Project, Role, Task};

/// What a role may do with one kind of record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Capabilities {
    pub can_add: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_download: bool,
}

impl Capabilities {
    pub const NONE: Self = Self {
        can_add: false,
        can_edit: false,
        can_delete: false,
        can_download: false,
    };

    const CRUD: Self = Self {
        can_add: true,
        can_edit: true,
        can_delete: true,
        can_download: false,
    };

    const ALL: Self = Self {
        can_add: true,
        can_edit: true,
        can_delete: true,
        can_download: true,
    };

    #[must_use]
    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::Add => self.can_add,
            Action::Edit => self.can_edit,
            Action::Delete => self.can_delete,
            Action::Download => self.can_download,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Add,
    Edit,
    Delete,
    Download,
}

impl Action {
    fn verb(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Edit => "edit",
            Self::Delete => "delete",
            Self::Download => "download",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Project,
    Task,
    User,
    ReferenceData,
}

impl Resource {
    fn plural(self) -> &'static str {
        match self {
            Self::Project => "projects",
            Self::Task => "tasks",
            Self::User => "users",
            Self::ReferenceData => "reference data",
        }
    }
}

/// The full capability table for one role, computed once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Permissions {
    pub role: Role,
    pub project: Capabilities,
    pub task: Capabilities,
    pub user: Capabilities,
    pub reference_data: Capabilities,
}

impl Permissions {
    #[must_use]
    pub fn for_role(role: Role) -> Self {
        let (project, task, admin) = match role {
            Role::Admin => (Capabilities::ALL, Capabilities::CRUD, Capabilities::CRUD),
            Role::Itbp => (Capabilities::CRUD, Capabilities::NONE, Capabilities::NONE),
            Role::Itga => (Capabilities::NONE, Capabilities::CRUD, Capabilities::NONE),
            Role::Sap | Role::DataScience => {
                (Capabilities::CRUD, Capabilities::CRUD, Capabilities::NONE)
            }
        };
        Self {
            role,
            project,
            task,
            user: admin,
            reference_data: admin,
        }
    }

    #[must_use]
    pub fn of(&self, resource: Resource) -> Capabilities {
        match resource {
            Resource::Project => self.project,
            Resource::Task => self.task,
            Resource::User => self.user,
            Resource::ReferenceData => self.reference_data,
        }
    }

    /// Fails with `PermissionDenied` unless the action is allowed.
    ///
    /// # Errors
    /// Returns `PermissionDenied` naming the action.
    pub fn require(&self, action: Action, resource: Resource) -> Result<()> {
        if self.of(resource).allows(action) {
            Ok(())
        } else {
            Err(TrackerError::denied(format!(
                "{} {}",
                action.verb(),
                resource.plural()
            )))
        }
    }
}

/// Project edit/delete needs the project capability and, for non-admins, ownership.
#[must_use]
pub fn can_modify_project(viewer: &SessionUser, project: &Project, action: Action) -> bool {
    if !Permissions::for_role(viewer.role).project.allows(action) {
        return false;
    }
    viewer.role == Role::Admin || project.assigned_to == viewer.sap
}

/// Task edit/delete needs the task capability and, for non-admins, ownership.
#[must_use]
pub fn can_modify_task(viewer: &SessionUser, task: &Task, action: Action) -> bool {
    if !Permissions::for_role(viewer.role).task.allows(action) {
        return false;
    }
    viewer.role == Role::Admin || task.assigned_to == viewer.sap
}

/// Whether a project appears in the viewer's lists and dashboard.
///
/// `tasks` are the project's own tasks.
#[must_use]
pub fn is_project_visible(viewer: &SessionUser, project: &Project, tasks: &[&Task]) -> bool {
    let assigned_to_itbp = project.assigned_to_role == Some(Role::Itbp);
    match viewer.role {
        Role::Admin => true,
        Role::Itga => assigned_to_itbp,
        Role::Itbp | Role::Sap | Role::DataScience => {
            project.assigned_to == viewer.sap
                || tasks.iter().any(|t| t.assigned_to == viewer.sap)
                || (viewer.role != Role::Itbp && assigned_to_itbp)
        }
    }
}

/// Filters projects down to the ones the viewer may see.
#[must_use]
pub fn visible_projects<'a>(
    viewer: &SessionUser,
    projects: &'a [Project],
    tasks: &[Task],
) -> Vec<&'a Project> {
    projects
        .iter()
        .filter(|p| {
            let own: Vec<&Task> = tasks.iter().filter(|t| t.project_id == p.id).collect();
            is_project_visible(viewer, p, &own)
        })
        .collect()
}

/// A navigation entry; admin entries nest under "Administration".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuItem {
    pub name: &'static str,
    pub command: &'static str,
    pub children: Vec<MenuItem>,
}

impl MenuItem {
    fn leaf(name: &'static str, command: &'static str) -> Self {
        Self {
            name,
            command,
            children: Vec::new(),
        }
    }
}

/// Role-based navigation menu.
#[must_use]
pub fn menu_for(role: Role) -> Vec<MenuItem> {
    let mut items = vec![
        MenuItem::leaf("Dashboard", "worktrack dashboard"),
        MenuItem::leaf("Project", "worktrack project list"),
    ];
    if role == Role::Admin {
        items.push(MenuItem {
            name: "Administration",
            command: "",
            children: vec![
                MenuItem::leaf("User Management", "worktrack user list"),
                MenuItem::leaf("Data Management", "worktrack data list"),
            ],
        });
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::{EffortLevel, WorkStatus};

    fn viewer(sap: i64, role: Role) -> SessionUser {
        SessionUser {
            sap,
            name: format!("user{sap}"),
            username: format!("user{sap}"),
            role,
        }
    }

    fn project(id: i64, assigned_to: i64, role: Role) -> Project {
        Project {
            id,
            name: format!("Project {id}"),
            assigned_to,
            assigned_to_name: None,
            assigned_to_role: Some(role),
            type_id: 1,
            type_name: None,
            level: EffortLevel::Low,
            request_date: "2024-01-01".to_string(),
            plan_start_date: "2024-01-02".to_string(),
            plan_end_date: "2024-01-05".to_string(),
            actual_start: None,
            actual_end: None,
            live_date: None,
            remark: "-".to_string(),
            progress: 0,
            status: WorkStatus::ToDo,
            created_at: String::new(),
        }
    }

    fn task(id: i64, project_id: i64, assigned_to: i64) -> Task {
        Task {
            id,
            project_id,
            project_name: None,
            assigned_to,
            assigned_to_name: None,
            assigned_to_role: None,
            task_group_id: 1,
            task_group_name: None,
            platform_id: 1,
            platform_name: None,
            detail: "work".to_string(),
            plan_start_date: "2024-01-02".to_string(),
            plan_end_date: "2024-01-03".to_string(),
            actual_start: None,
            actual_end: None,
            progress: 0,
            status: WorkStatus::ToDo,
            created_at: String::new(),
        }
    }

    #[test]
    fn test_capability_table() {
        let admin = Permissions::for_role(Role::Admin);
        assert!(admin.project.can_download);
        assert!(admin.user.can_add && admin.reference_data.can_delete);

        let itbp = Permissions::for_role(Role::Itbp);
        assert!(itbp.project.can_add && itbp.project.can_edit && itbp.project.can_delete);
        assert!(!itbp.project.can_download);
        assert_eq!(itbp.task, Capabilities::NONE);

        let itga = Permissions::for_role(Role::Itga);
        assert_eq!(itga.project, Capabilities::NONE);
        assert!(itga.task.can_add);

        for role in [Role::Sap, Role::DataScience] {
            let p = Permissions::for_role(role);
            assert!(p.project.can_edit && p.task.can_edit);
            assert!(!p.project.can_download && !p.user.can_add);
        }
    }

    #[test]
    fn test_require_names_the_action() {
        let err = Permissions::for_role(Role::Itga)
            .require(Action::Delete, Resource::Project)
            .unwrap_err();
        assert_eq!(err.to_string(), "You do not have permission to delete projects");
    }

    #[test]
    fn test_task_ownership() {
        let t = task(1, 1, 7);
        assert!(can_modify_task(&viewer(1, Role::Admin), &t, Action::Edit));
        assert!(can_modify_task(&viewer(7, Role::Itga), &t, Action::Edit));
        assert!(!can_modify_task(&viewer(8, Role::Itga), &t, Action::Delete));
        assert!(!can_modify_task(&viewer(7, Role::Itbp), &t, Action::Edit));
    }

    #[test]
    fn test_project_ownership() {
        let p = project(1, 10, Role::Itbp);
        assert!(can_modify_project(&viewer(1, Role::Admin), &p, Action::Delete));
        assert!(can_modify_project(&viewer(10, Role::Itbp), &p, Action::Edit));
        assert!(can_modify_project(&viewer(10, Role::Itbp), &p, Action::Delete));
        assert!(!can_modify_project(&viewer(11, Role::Itbp), &p, Action::Delete));
        assert!(!can_modify_project(&viewer(20, Role::Sap), &p, Action::Edit));
        assert!(!can_modify_project(&viewer(10, Role::Itga), &p, Action::Edit));
    }

    #[test]
    fn test_visibility_rules() {
        let itbp_project = project(1, 10, Role::Itbp);
        let sap_project = project(2, 20, Role::Sap);
        let projects = vec![itbp_project, sap_project];
        let tasks = vec![task(1, 2, 30)];

        let ids = |v: &SessionUser| -> Vec<i64> {
            visible_projects(v, &projects, &tasks).iter().map(|p| p.id).collect()
        };

        assert_eq!(ids(&viewer(99, Role::Admin)), vec![1, 2]);
        assert_eq!(ids(&viewer(10, Role::Itbp)), vec![1]);
        assert_eq!(ids(&viewer(11, Role::Itbp)), Vec::<i64>::new());
        assert_eq!(ids(&viewer(30, Role::Itga)), vec![1]);
        assert_eq!(ids(&viewer(20, Role::Sap)), vec![1, 2]);
        assert_eq!(ids(&viewer(30, Role::DataScience)), vec![1, 2]);
        assert_eq!(ids(&viewer(31, Role::DataScience)), vec![1]);
    }

    #[test]
    fn test_menu_by_role() {
        assert_eq!(menu_for(Role::Itga).len(), 2);
        let admin = menu_for(Role::Admin);
        assert_eq!(admin.len(), 3);
        assert_eq!(admin[2].children.len(), 2);
    }
}
