//! End-to-end flows through the library: forms, repos, derived state.

use chrono::NaiveDate;
use rusqlite::Connection;
use worktrack::engine::access::{can_modify_project, can_modify_task, visible_projects, Action};
use worktrack::engine::config::Config;
use worktrack::engine::db::Db;
use worktrack::engine::error::TrackerError;
use worktrack::engine::forms::{ProjectForm, TaskForm, UserDraft};
use worktrack::engine::listing::{self, ListQuery};
use worktrack::engine::repo::{HistoryRepo, ProjectRepo, RefRepo, TaskRepo, UserRepo};
use worktrack::engine::session::{verify_password, Session, SessionStore, SessionUser};
use worktrack::engine::state::{derive_status, is_late_start, DeliveryStatus};
use worktrack::engine::types::{EffortLevel, Entity, RefKind, Role, User, WorkStatus};
use worktrack::engine::validate::validate_effort;

struct Fixture {
    conn: Connection,
    owner: User,
    engineer: User,
    type_id: i64,
    group_id: i64,
    platform_id: i64,
}

fn fixture() -> Fixture {
    let conn = Db::open_in_memory().unwrap();
    let refs = RefRepo::new(&conn);
    let analyst = refs.add(RefKind::Position, "Analyst", Some(Role::Itbp)).unwrap();
    let support = refs.add(RefKind::Position, "Support", Some(Role::Itga)).unwrap();
    let type_id = refs.add(RefKind::ProjectType, "Enhancement", None).unwrap();
    let group_id = refs.add(RefKind::TaskGroup, "Development", None).unwrap();
    let platform_id = refs.add(RefKind::Platform, "Web", None).unwrap();

    let users = UserRepo::new(&conn);
    for (sap, username, role, position) in [
        (1, "root", Role::Admin, None),
        (100, "ina", Role::Itbp, Some(analyst)),
        (101, "budi", Role::Itbp, Some(analyst)),
        (200, "gita", Role::Itga, Some(support)),
    ] {
        users
            .add(&UserDraft {
                sap,
                name: username.to_uppercase(),
                username: username.to_string(),
                password: Some(format!("{username}-pw")),
                role,
                position_id: position,
            })
            .unwrap();
    }
    let owner = users.find_by_sap(100).unwrap().unwrap();
    let engineer = users.find_by_sap(200).unwrap().unwrap();

    Fixture {
        conn,
        owner,
        engineer,
        type_id,
        group_id,
        platform_id,
    }
}

fn project_form(f: &Fixture, start: &str, end: &str) -> ProjectForm {
    let mut form = ProjectForm {
        name: "Billing revamp".to_string(),
        type_id: Some(f.type_id),
        level: Some(EffortLevel::Low),
        request_date: "2024-02-20".to_string(),
        plan_start_date: start.to_string(),
        plan_end_date: end.to_string(),
        remark: "quarterly".to_string(),
        ..ProjectForm::default()
    };
    form.assign_to_self(&f.owner);
    form
}

fn add_task(f: &Fixture, project_id: i64) -> i64 {
    let mut form = TaskForm::new_add();
    form.assign_to_self(&f.engineer);
    form.task_group_id = Some(f.group_id);
    form.platform_id = Some(f.platform_id);
    form.detail = "Build invoice API".to_string();
    form.plan_start_date = "2024-03-01".to_string();
    form.plan_end_date = "2024-03-04".to_string();
    let draft = form.into_draft(Role::Itga).unwrap();

    let tx = f.conn.unchecked_transaction().unwrap();
    let id = TaskRepo::new(&tx).add(project_id, &draft).unwrap();
    ProjectRepo::new(&tx).refresh_progress(project_id).unwrap();
    tx.commit().unwrap();
    id
}

#[test]
fn low_effort_over_a_week_is_rejected() {
    let f = fixture();
    assert_eq!(
        validate_effort(EffortLevel::Low, "2024-03-01", "2024-03-10")
            .unwrap_err()
            .diff_days(),
        Some(9)
    );

    let Err(TrackerError::Validation(errors)) =
        project_form(&f, "2024-03-01", "2024-03-10").into_draft(Role::Itbp)
    else {
        panic!("expected a validation error");
    };
    assert_eq!(
        errors.get("plan_end_date"),
        Some("Low effort should be less than 7 days")
    );
}

#[test]
fn task_progress_drives_project_status() {
    let f = fixture();
    let draft = project_form(&f, "2024-03-01", "2024-03-05")
        .into_draft(Role::Itbp)
        .unwrap();
    let project_id = ProjectRepo::new(&f.conn).add(&draft).unwrap();
    let task_id = add_task(&f, project_id);

    let task = TaskRepo::new(&f.conn).find_by_id(task_id).unwrap().unwrap();
    assert_eq!(task.progress, 0);
    assert_eq!(task.status, WorkStatus::ToDo);

    // Progress without an actual start is refused.
    let mut form = TaskForm::from_task(&task);
    form.progress = "50".to_string();
    let Err(TrackerError::Validation(errors)) = form.clone().into_draft(Role::Itga) else {
        panic!("expected a validation error");
    };
    assert_eq!(
        errors.get("actual_start"),
        Some("Actual start is required when progress > 0%")
    );

    form.actual_start = Some("2024-03-02".to_string());
    let draft = form.into_draft(Role::Itga).unwrap();
    let changes = TaskRepo::new(&f.conn)
        .update(task_id, &draft, "gita")
        .unwrap();
    assert!(changes.iter().any(|c| c.field == "progress"));

    let (progress, status) = ProjectRepo::new(&f.conn)
        .refresh_progress(project_id)
        .unwrap();
    assert_eq!((progress, status), (50, WorkStatus::InProgress));

    let history = HistoryRepo::new(&f.conn)
        .get_history(Entity::Task, task_id)
        .unwrap();
    assert!(history.iter().any(|h| h.field == "progress" && h.changed_by == "gita"));
}

#[test]
fn project_with_tasks_cannot_be_deleted() {
    let f = fixture();
    let draft = project_form(&f, "2024-03-01", "2024-03-05")
        .into_draft(Role::Itbp)
        .unwrap();
    let projects = ProjectRepo::new(&f.conn);
    let project_id = projects.add(&draft).unwrap();
    let task_id = add_task(&f, project_id);

    let err = projects.delete(project_id).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Failed to delete project because it contains task list inside"
    );

    TaskRepo::new(&f.conn).delete(task_id).unwrap();
    projects.delete(project_id).unwrap();
    assert!(projects.find_by_id(project_id).unwrap().is_none());
}

#[test]
fn visibility_and_ownership() {
    let f = fixture();
    let draft = project_form(&f, "2024-03-01", "2024-03-05")
        .into_draft(Role::Itbp)
        .unwrap();
    let project_id = ProjectRepo::new(&f.conn).add(&draft).unwrap();
    let task_id = add_task(&f, project_id);

    let projects = ProjectRepo::new(&f.conn).get_all().unwrap();
    let tasks = TaskRepo::new(&f.conn).get_all().unwrap();
    let users = UserRepo::new(&f.conn);
    let admin = SessionUser::from(&users.find_by_sap(1).unwrap().unwrap());
    let owner = SessionUser::from(&f.owner);
    let peer = SessionUser::from(&users.find_by_sap(101).unwrap().unwrap());
    let engineer = SessionUser::from(&f.engineer);

    assert_eq!(visible_projects(&admin, &projects, &tasks).len(), 1);
    assert_eq!(visible_projects(&owner, &projects, &tasks).len(), 1);
    assert_eq!(visible_projects(&engineer, &projects, &tasks).len(), 1);
    assert!(visible_projects(&peer, &projects, &tasks).is_empty());

    let task = tasks.iter().find(|t| t.id == task_id).unwrap();
    assert!(can_modify_task(&engineer, task, Action::Edit));
    assert!(can_modify_task(&engineer, task, Action::Delete));
    assert!(!can_modify_task(&owner, task, Action::Edit));
    assert!(!can_modify_task(&peer, task, Action::Edit));
    assert!(can_modify_task(&admin, task, Action::Delete));

    let project = projects.iter().find(|p| p.id == project_id).unwrap();
    assert!(can_modify_project(&owner, project, Action::Edit));
    assert!(can_modify_project(&owner, project, Action::Delete));
    assert!(!can_modify_project(&peer, project, Action::Delete));
    assert!(!can_modify_project(&engineer, project, Action::Edit));
    assert!(can_modify_project(&admin, project, Action::Delete));
}

#[test]
fn listing_rejects_unknown_sort_columns() {
    let f = fixture();
    let draft = project_form(&f, "2024-03-01", "2024-03-05")
        .into_draft(Role::Itbp)
        .unwrap();
    ProjectRepo::new(&f.conn).add(&draft).unwrap();
    let projects = ProjectRepo::new(&f.conn).get_all().unwrap();

    let page = listing::apply(&projects, &ListQuery::default()).unwrap();
    assert_eq!(page.summary.total, 1);
    assert_eq!(page.summary.to_do, 1);

    let query = ListQuery {
        sort: Some("colour".to_string()),
        ..ListQuery::default()
    };
    assert!(matches!(
        listing::apply(&projects, &query),
        Err(TrackerError::InvalidSortKey(_))
    ));
}

#[test]
fn delivery_status_and_late_start() {
    assert_eq!(
        derive_status(Some("2024-03-10"), Some("2024-03-10")),
        DeliveryStatus::OnTime
    );
    assert_eq!(
        derive_status(Some("2024-03-10"), Some("2024-03-12")),
        DeliveryStatus::Delay
    );
    assert_eq!(derive_status(Some("2024-03-10"), None), DeliveryStatus::NotApplicable);

    let today = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
    assert!(is_late_start(Some("2024-03-01"), None, today));
    assert!(!is_late_start(Some("2024-03-01"), Some("2024-03-02"), today));
}

#[test]
fn login_session_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::new(Some(dir.path().to_path_buf()));
    let conn = Db::init(&config).unwrap();
    UserRepo::new(&conn)
        .add(&UserDraft {
            sap: 7,
            name: "Root".to_string(),
            username: "root".to_string(),
            password: Some("s3cret".to_string()),
            role: Role::Admin,
            position_id: None,
        })
        .unwrap();

    let (user, hash) = UserRepo::new(&conn).credentials("ROOT").unwrap().unwrap();
    assert!(verify_password(user.sap, "s3cret", &hash));
    assert!(!verify_password(user.sap, "wrong", &hash));

    let store = SessionStore::new(config.session_path());
    assert!(matches!(store.require(), Err(TrackerError::NotLoggedIn)));
    store.save(&Session::start(&user, &hash)).unwrap();
    let resumed = store.require().unwrap().resume(&conn).unwrap();
    assert_eq!((resumed.user.sap, resumed.role()), (7, Role::Admin));
    assert!(store.clear().unwrap());
    assert!(store.load().unwrap().is_none());
}

#[test]
fn edited_session_file_gains_no_rights() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::new(Some(dir.path().to_path_buf()));
    let conn = Db::init(&config).unwrap();
    UserRepo::new(&conn)
        .add(&UserDraft {
            sap: 42,
            name: "Budi".to_string(),
            username: "budi".to_string(),
            password: Some("pw".to_string()),
            role: Role::DataScience,
            position_id: None,
        })
        .unwrap();
    let (user, hash) = UserRepo::new(&conn).credentials("budi").unwrap().unwrap();
    let store = SessionStore::new(config.session_path());
    store.save(&Session::start(&user, &hash)).unwrap();

    // Promote the stored role by hand.
    let raw = std::fs::read_to_string(store.path()).unwrap();
    let promoted = raw.replace("\"DATA_SCIENCE\"", "\"ADMIN\"");
    assert_ne!(raw, promoted);
    std::fs::write(store.path(), promoted).unwrap();
    let resumed = store.require().unwrap().resume(&conn).unwrap();
    assert_eq!(resumed.role(), Role::DataScience);
    assert!(!resumed.permissions().user.can_delete);

    // A session for an account that was never issued one.
    let mut forged = store.require().unwrap();
    forged.user.sap = 1;
    forged.user.role = Role::Admin;
    store.save(&forged).unwrap();
    assert!(matches!(
        store.require().unwrap().resume(&conn),
        Err(TrackerError::NotLoggedIn)
    ));
}
