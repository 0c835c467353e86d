//! Handlers for `task add|list|info|edit|delete`.
//!
//! Every write recomputes the parent project's progress in the same transaction.

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;
use worktrack::engine::access::{can_modify_task, is_project_visible, Action, Resource};
use worktrack::engine::config::Config;
use worktrack::engine::error::TrackerError;
use worktrack::engine::forms::TaskForm;
use worktrack::engine::listing;
use worktrack::engine::repo::{HistoryRepo, ProjectRepo, TaskRepo};
use worktrack::engine::resolver::ProjectResolver;
use worktrack::engine::state::{is_late_start, DeliveryStatus};
use worktrack::engine::types::{Entity, HistoryEntry, Project, RefKind, Role, Task};
use worktrack::engine::validate::duration_hint;

use super::{or_dash, paint_delivery, paint_status, Ctx, ListArgs};

#[derive(Subcommand, Clone)]
pub enum TaskCommand {
    /// Add a task to a project
    Add(AddArgs),
    /// List tasks of visible projects
    List {
        #[command(flatten)]
        list: ListArgs,
        /// Only tasks of this project (id or name)
        #[arg(long, short = 'p')]
        project: Option<String>,
        /// Only tasks assigned to me
        #[arg(long)]
        mine: bool,
    },
    /// Show a task and its change history
    Info {
        id: i64,
        #[arg(long)]
        json: bool,
    },
    /// Change fields of a task
    Edit(EditArgs),
    /// Delete a task
    Delete {
        id: i64,
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Args, Clone)]
pub struct AddArgs {
    /// Project id or name
    pub project: String,
    pub detail: String,
    /// Assignee SAP or username (administrators only)
    #[arg(long)]
    pub assigned_to: Option<String>,
    /// Assignee group (administrators only)
    #[arg(long)]
    pub group: Option<Role>,
    /// Task group id or name
    #[arg(long)]
    pub task_group: Option<String>,
    /// Platform id or name
    #[arg(long)]
    pub platform: Option<String>,
    #[arg(long)]
    pub plan_start: Option<String>,
    #[arg(long)]
    pub plan_end: Option<String>,
    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

/// Only the given flags change; pass an empty value to clear an actual date.
#[derive(Args, Clone)]
pub struct EditArgs {
    pub id: i64,
    #[arg(long)]
    pub detail: Option<String>,
    #[arg(long)]
    pub assigned_to: Option<String>,
    #[arg(long)]
    pub group: Option<Role>,
    #[arg(long)]
    pub task_group: Option<String>,
    #[arg(long)]
    pub platform: Option<String>,
    #[arg(long)]
    pub plan_start: Option<String>,
    #[arg(long)]
    pub plan_end: Option<String>,
    #[arg(long)]
    pub actual_start: Option<String>,
    #[arg(long)]
    pub actual_end: Option<String>,
    /// 0-100
    #[arg(long)]
    pub progress: Option<String>,
    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Serialize)]
struct TaskView<'a> {
    #[serde(flatten)]
    task: &'a Task,
    delivery: DeliveryStatus,
    late_start: bool,
}

impl<'a> TaskView<'a> {
    fn new(task: &'a Task) -> Self {
        Self {
            task,
            delivery: task.delivery_status(),
            late_start: late_start(task),
        }
    }
}

fn late_start(task: &Task) -> bool {
    is_late_start(
        Some(&task.plan_start_date),
        task.actual_start.as_deref(),
        super::today(),
    )
}

/// Runs a task subcommand.
///
/// # Errors
/// Returns error if the command fails.
pub fn handle(config: &Config, cmd: TaskCommand) -> Result<()> {
    let ctx = Ctx::open(config)?;
    match cmd {
        TaskCommand::Add(args) => add(&ctx, args),
        TaskCommand::List {
            list: args,
            project,
            mine,
        } => list(&ctx, &args, project.as_deref(), mine),
        TaskCommand::Info { id, json } => show(&ctx, id, json),
        TaskCommand::Edit(args) => edit(&ctx, args),
        TaskCommand::Delete { id, yes } => delete(&ctx, id, yes),
    }
}

fn project_visible(ctx: &Ctx, project: &Project) -> Result<bool> {
    let tasks = TaskRepo::new(&ctx.conn).by_project(project.id)?;
    let own: Vec<&Task> = tasks.iter().collect();
    Ok(is_project_visible(ctx.viewer(), project, &own))
}

fn add(ctx: &Ctx, args: AddArgs) -> Result<()> {
    ctx.require(Action::Add, Resource::Task)?;
    let role = ctx.session.role();

    let resolved = ProjectResolver::new(&ctx.conn).resolve(&args.project)?;
    let project = resolved.project;
    if !project_visible(ctx, &project)? {
        return Err(TrackerError::not_found("Project", &args.project).into());
    }
    if resolved.confidence < 1.0 {
        println!("{} Closest match: \"{}\"", "?".yellow(), project.name);
    }

    let mut form = TaskForm::new_add();
    form.detail = args.detail;
    form.task_group_id = ctx.ref_id(RefKind::TaskGroup, args.task_group.as_deref())?;
    form.platform_id = ctx.ref_id(RefKind::Platform, args.platform.as_deref())?;
    form.plan_start_date = args.plan_start.unwrap_or_default();
    form.plan_end_date = args.plan_end.unwrap_or_default();

    if role == Role::Admin {
        if let Some(reference) = args.assigned_to.as_deref() {
            form.assigned_to = Some(ctx.assignee(reference, args.group)?.sap);
        }
        form.assigned_group = args.group;
    } else {
        if args.assigned_to.is_some() || args.group.is_some() {
            bail!("Only administrators can assign tasks to someone else");
        }
        form.assign_to_self(&ctx.me()?);
    }

    let draft = super::submit(form.into_draft(role))?;
    let prompt = format!(
        "Add task \"{}\" to project #{} \"{}\"?",
        draft.detail, project.id, project.name
    );
    if !super::confirm(&prompt, args.yes)? {
        return Ok(());
    }
    let tx = ctx.conn.unchecked_transaction()?;
    let id = TaskRepo::new(&tx).add(project.id, &draft)?;
    let (progress, status) = ProjectRepo::new(&tx).refresh_progress(project.id)?;
    tx.commit()?;

    println!(
        "{} Added task #{} to {}",
        "✓".green(),
        id,
        project.name.yellow()
    );
    println!("   Project progress: {progress}% {}", paint_status(status));
    Ok(())
}

fn list(ctx: &Ctx, args: &ListArgs, project: Option<&str>, mine: bool) -> Result<()> {
    let viewer = ctx.viewer();
    let projects = ProjectRepo::new(&ctx.conn).get_all()?;
    let all = TaskRepo::new(&ctx.conn).get_all()?;

    let only_project = project
        .map(|p| ProjectResolver::new(&ctx.conn).resolve(p))
        .transpose()?
        .map(|r| r.project.id);

    let visible: Vec<Task> = projects
        .iter()
        .filter(|p| only_project.map_or(true, |id| id == p.id))
        .filter(|p| {
            let own: Vec<&Task> = all.iter().filter(|t| t.project_id == p.id).collect();
            is_project_visible(viewer, p, &own)
        })
        .flat_map(|p| all.iter().filter(move |t| t.project_id == p.id))
        .filter(|t| !mine || t.assigned_to == viewer.sap)
        .cloned()
        .collect();

    let page = listing::apply(&visible, &args.query(ctx.config.page_size))?;

    if args.json {
        let items: Vec<TaskView> = page.items.iter().map(TaskView::new).collect();
        return super::print_json(&serde_json::json!({
            "items": items,
            "page": page.page,
            "page_size": page.page_size,
            "total_pages": page.total_pages,
            "summary": page.summary,
        }));
    }

    println!("{} Tasks", "📋".cyan());
    super::print_summary(&page.summary);
    println!();
    if page.items.is_empty() {
        println!("   {}", "No tasks match.".dimmed());
    }
    for t in &page.items {
        let flag = if late_start(t) { "late start".red().to_string() } else { String::new() };
        println!(
            "   #{:<4} {:<20} {:<28} {:<16} {} → {}  {:>3}%  {}  {}",
            t.id,
            or_dash(t.project_name.as_deref()),
            t.detail,
            or_dash(t.assigned_to_name.as_deref()),
            t.plan_start_date,
            t.plan_end_date,
            t.progress,
            paint_status(t.status),
            flag
        );
    }
    super::print_page_footer(page.page, page.total_pages);
    Ok(())
}

/// Loads a task whose project the viewer can see.
fn visible_task(ctx: &Ctx, id: i64) -> Result<Task> {
    let task = TaskRepo::new(&ctx.conn)
        .find_by_id(id)?
        .ok_or_else(|| TrackerError::not_found("Task", id))?;
    let project = ProjectRepo::new(&ctx.conn)
        .find_by_id(task.project_id)?
        .ok_or_else(|| TrackerError::not_found("Project", task.project_id))?;
    if !project_visible(ctx, &project)? {
        return Err(TrackerError::not_found("Task", id).into());
    }
    Ok(task)
}

#[derive(Serialize)]
struct TaskDetail<'a> {
    #[serde(flatten)]
    view: TaskView<'a>,
    history: &'a [HistoryEntry],
}

fn show(ctx: &Ctx, id: i64, json: bool) -> Result<()> {
    let task = visible_task(ctx, id)?;
    let history = HistoryRepo::new(&ctx.conn).get_history(Entity::Task, task.id)?;

    if json {
        return super::print_json(&TaskDetail {
            view: TaskView::new(&task),
            history: &history,
        });
    }

    println!("{} #{} {}", "📋".cyan(), task.id, task.detail.bold());
    println!("   Project:    {}", or_dash(task.project_name.as_deref()));
    println!(
        "   Assigned:   {} ({})",
        or_dash(task.assigned_to_name.as_deref()),
        task.assigned_to_role.map_or("-", Role::label)
    );
    println!("   Group:      {}", or_dash(task.task_group_name.as_deref()));
    println!("   Platform:   {}", or_dash(task.platform_name.as_deref()));
    println!("   Plan:       {} → {}", task.plan_start_date, task.plan_end_date);
    if let Some(hint) = duration_hint(&task.plan_start_date, &task.plan_end_date) {
        println!("               {}", hint.dimmed());
    }
    println!(
        "   Actual:     {} → {}",
        or_dash(task.actual_start.as_deref()),
        or_dash(task.actual_end.as_deref())
    );
    println!(
        "   Progress:   {}% {}  {}",
        task.progress,
        paint_status(task.status),
        paint_delivery(task.delivery_status())
    );
    if late_start(&task) {
        println!("   {}", "Started late (or not yet started past plan start)".red());
    }

    if !history.is_empty() {
        println!();
        println!("{} History", "🕘".cyan());
        super::print_history(&history);
    }
    Ok(())
}

fn require_owner(ctx: &Ctx, task: &Task, action: Action) -> Result<()> {
    ctx.require(action, Resource::Task)?;
    if can_modify_task(ctx.viewer(), task, action) {
        return Ok(());
    }
    Err(super::denied(
        ctx.viewer(),
        TrackerError::denied("change tasks assigned to someone else"),
    ))
}

fn edit(ctx: &Ctx, args: EditArgs) -> Result<()> {
    let role = ctx.session.role();
    let task = visible_task(ctx, args.id)?;
    require_owner(ctx, &task, Action::Edit)?;

    let mut form = TaskForm::from_task(&task);
    if let Some(reference) = args.assigned_to.as_deref() {
        if role != Role::Admin {
            bail!("Only administrators can reassign tasks");
        }
        let user = ctx.assignee(reference, args.group.or(form.assigned_group))?;
        form.assigned_to = Some(user.sap);
        form.assigned_group = Some(user.role);
    }
    if let Some(detail) = args.detail {
        form.detail = detail;
    }
    if let Some(id) = ctx.ref_id(RefKind::TaskGroup, args.task_group.as_deref())? {
        form.task_group_id = Some(id);
    }
    if let Some(id) = ctx.ref_id(RefKind::Platform, args.platform.as_deref())? {
        form.platform_id = Some(id);
    }
    if let Some(d) = args.plan_start {
        form.plan_start_date = d;
    }
    if let Some(d) = args.plan_end {
        form.plan_end_date = d;
    }
    if args.actual_start.is_some() {
        form.actual_start = args.actual_start;
    }
    if args.actual_end.is_some() {
        form.actual_end = args.actual_end;
    }
    if let Some(progress) = args.progress {
        form.progress = progress;
    }

    let draft = super::submit(form.into_draft(role))?;
    let prompt = format!("Save changes to task #{} \"{}\"?", task.id, task.detail);
    if !super::confirm(&prompt, args.yes)? {
        return Ok(());
    }
    let tx = ctx.conn.unchecked_transaction()?;
    let changes = TaskRepo::new(&tx).update(task.id, &draft, &ctx.viewer().username)?;
    let (progress, status) = ProjectRepo::new(&tx).refresh_progress(task.project_id)?;
    tx.commit()?;

    super::project::print_changes(&format!("task #{}", task.id), &changes);
    if !changes.is_empty() {
        println!("   Project progress: {progress}% {}", paint_status(status));
    }
    Ok(())
}

fn delete(ctx: &Ctx, id: i64, yes: bool) -> Result<()> {
    let task = visible_task(ctx, id)?;
    require_owner(ctx, &task, Action::Delete)?;

    if !super::confirm(&format!("Delete task #{} \"{}\"?", task.id, task.detail), yes)? {
        return Ok(());
    }
    let tx = ctx.conn.unchecked_transaction()?;
    let removed = TaskRepo::new(&tx).delete(task.id)?;
    let (progress, status) = ProjectRepo::new(&tx).refresh_progress(removed.project_id)?;
    tx.commit()?;

    println!("{} Deleted task #{}", "✓".green(), removed.id);
    println!("   Project progress: {progress}% {}", paint_status(status));
    Ok(())
}
