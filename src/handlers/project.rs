//! Handlers for `project add|list|info|edit|delete|export`.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;
use tracing::info;
use worktrack::engine::access::{
    can_modify_project, is_project_visible, visible_projects, Action, Resource,
};
use worktrack::engine::config::Config;
use worktrack::engine::error::TrackerError;
use worktrack::engine::forms::ProjectForm;
use worktrack::engine::listing;
use worktrack::engine::repo::{HistoryRepo, ProjectRepo, TaskRepo};
use worktrack::engine::resolver::ProjectResolver;
use worktrack::engine::state::{parse_date, DeliveryStatus};
use worktrack::engine::types::{
    EffortLevel, Entity, FieldChange, HistoryEntry, Project, RefKind, Role, Task,
};
use worktrack::engine::validate::duration_hint;

use super::{or_dash, paint_delivery, paint_status, Ctx, ListArgs};

#[derive(Subcommand, Clone)]
pub enum ProjectCommand {
    /// Create a project
    Add(AddArgs),
    /// List visible projects
    List(ListArgs),
    /// Show a project with its tasks and change history
    Info {
        /// Id or name
        project: String,
        #[arg(long)]
        json: bool,
    },
    /// Change fields of a project
    Edit(EditArgs),
    /// Delete a project that has no tasks
    Delete {
        /// Id or exact name
        project: String,
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Export projects planned within a date range
    Export(ExportArgs),
}

#[derive(Args, Clone)]
pub struct AddArgs {
    pub name: String,
    /// Assignee SAP or username (administrators only)
    #[arg(long)]
    pub assigned_to: Option<String>,
    /// Assignee group (administrators only)
    #[arg(long)]
    pub group: Option<Role>,
    /// Project type id or name
    #[arg(long = "type")]
    pub project_type: Option<String>,
    #[arg(long)]
    pub level: Option<EffortLevel>,
    /// Defaults to today
    #[arg(long)]
    pub request_date: Option<String>,
    #[arg(long)]
    pub plan_start: Option<String>,
    #[arg(long)]
    pub plan_end: Option<String>,
    #[arg(long)]
    pub actual_start: Option<String>,
    #[arg(long)]
    pub actual_end: Option<String>,
    #[arg(long)]
    pub live_date: Option<String>,
    #[arg(long)]
    pub remark: Option<String>,
    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

/// Only the given flags change; pass an empty value to clear an optional date.
#[derive(Args, Clone)]
pub struct EditArgs {
    /// Id or name
    pub project: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub assigned_to: Option<String>,
    #[arg(long)]
    pub group: Option<Role>,
    #[arg(long = "type")]
    pub project_type: Option<String>,
    #[arg(long)]
    pub level: Option<EffortLevel>,
    #[arg(long)]
    pub request_date: Option<String>,
    #[arg(long)]
    pub plan_start: Option<String>,
    #[arg(long)]
    pub plan_end: Option<String>,
    #[arg(long)]
    pub actual_start: Option<String>,
    #[arg(long)]
    pub actual_end: Option<String>,
    #[arg(long)]
    pub live_date: Option<String>,
    #[arg(long)]
    pub remark: Option<String>,
    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Args, Clone)]
pub struct ExportArgs {
    /// First plan start date included
    #[arg(long)]
    pub from: String,
    /// Last plan start date included
    #[arg(long)]
    pub to: String,
    /// Write to a file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

/// A project with its derived delivery status, as list and export print it.
#[derive(Serialize)]
struct ProjectView<'a> {
    #[serde(flatten)]
    project: &'a Project,
    delivery: DeliveryStatus,
}

impl<'a> From<&'a Project> for ProjectView<'a> {
    fn from(project: &'a Project) -> Self {
        Self {
            project,
            delivery: project.delivery_status(),
        }
    }
}

/// Runs a project subcommand.
///
/// # Errors
/// Returns error if the command fails.
pub fn handle(config: &Config, cmd: ProjectCommand) -> Result<()> {
    let ctx = Ctx::open(config)?;
    match cmd {
        ProjectCommand::Add(args) => add(&ctx, args),
        ProjectCommand::List(args) => list(&ctx, &args),
        ProjectCommand::Info { project, json } => show(&ctx, &project, json),
        ProjectCommand::Edit(args) => edit(&ctx, args),
        ProjectCommand::Delete { project, yes } => delete(&ctx, &project, yes),
        ProjectCommand::Export(args) => export(&ctx, &args),
    }
}

fn add(ctx: &Ctx, args: AddArgs) -> Result<()> {
    ctx.require(Action::Add, Resource::Project)?;
    let role = ctx.session.role();

    let mut form = ProjectForm {
        name: args.name,
        type_id: ctx.ref_id(RefKind::ProjectType, args.project_type.as_deref())?,
        level: args.level,
        request_date: args
            .request_date
            .unwrap_or_else(|| super::today().format("%Y-%m-%d").to_string()),
        plan_start_date: args.plan_start.unwrap_or_default(),
        plan_end_date: args.plan_end.unwrap_or_default(),
        actual_start: args.actual_start,
        actual_end: args.actual_end,
        live_date: args.live_date,
        remark: args.remark.unwrap_or_default(),
        ..ProjectForm::default()
    };

    if role == Role::Admin {
        if let Some(reference) = args.assigned_to.as_deref() {
            form.assigned_to = Some(ctx.assignee(reference, args.group)?.sap);
        }
        form.assigned_group = args.group;
    } else {
        if args.assigned_to.is_some() || args.group.is_some() {
            bail!("Only administrators can assign projects to someone else");
        }
        form.assign_to_self(&ctx.me()?);
    }

    let draft = super::submit(form.into_draft(role))?;
    let prompt = format!(
        "Create project \"{}\" ({} → {})?",
        draft.name, draft.plan_start_date, draft.plan_end_date
    );
    if !super::confirm(&prompt, args.yes)? {
        return Ok(());
    }
    let id = ProjectRepo::new(&ctx.conn).add(&draft)?;

    println!("{} Created project #{}: {}", "✓".green(), id, draft.name.yellow());
    if let Some(hint) = duration_hint(&draft.plan_start_date, &draft.plan_end_date) {
        println!("   {}", hint.dimmed());
    }
    Ok(())
}

fn list(ctx: &Ctx, args: &ListArgs) -> Result<()> {
    let projects = ProjectRepo::new(&ctx.conn).get_all()?;
    let tasks = TaskRepo::new(&ctx.conn).get_all()?;
    let visible: Vec<Project> = visible_projects(ctx.viewer(), &projects, &tasks)
        .into_iter()
        .cloned()
        .collect();

    let page = listing::apply(&visible, &args.query(ctx.config.page_size))?;

    if args.json {
        let items: Vec<ProjectView> = page.items.iter().map(ProjectView::from).collect();
        return super::print_json(&serde_json::json!({
            "items": items,
            "page": page.page,
            "page_size": page.page_size,
            "total_pages": page.total_pages,
            "summary": page.summary,
        }));
    }

    println!("{} Projects", "📁".cyan());
    super::print_summary(&page.summary);
    println!();
    if page.items.is_empty() {
        println!("   {}", "No projects match.".dimmed());
    }
    for p in &page.items {
        println!(
            "   #{:<4} {:<28} {:<16} {:<5} {} → {}  {:>3}%  {}  {}",
            p.id,
            p.name,
            or_dash(p.assigned_to_name.as_deref()),
            p.level.to_string(),
            p.plan_start_date,
            p.plan_end_date,
            p.progress,
            paint_status(p.status),
            paint_delivery(p.delivery_status())
        );
    }
    super::print_page_footer(page.page, page.total_pages);
    Ok(())
}

/// Resolves a project the viewer is allowed to see.
fn visible_project(ctx: &Ctx, reference: &str, strict: bool) -> Result<(Project, Vec<Task>)> {
    let resolver = if strict {
        ProjectResolver::strict(&ctx.conn)
    } else {
        ProjectResolver::new(&ctx.conn)
    };
    let resolved = resolver.resolve(reference)?;
    if resolved.confidence < 1.0 {
        println!(
            "{} Matched \"{}\" ({:.0}% confidence)",
            "?".yellow(),
            resolved.project.name,
            resolved.confidence * 100.0
        );
    }

    let project = resolved.project;
    let tasks = TaskRepo::new(&ctx.conn).by_project(project.id)?;
    let own: Vec<&Task> = tasks.iter().collect();
    if !is_project_visible(ctx.viewer(), &project, &own) {
        // Hidden projects look the same as missing ones.
        return Err(TrackerError::not_found("Project", reference).into());
    }
    Ok((project, tasks))
}

#[derive(Serialize)]
struct ProjectDetail<'a> {
    #[serde(flatten)]
    view: ProjectView<'a>,
    tasks: &'a [Task],
    history: &'a [HistoryEntry],
}

fn show(ctx: &Ctx, reference: &str, json: bool) -> Result<()> {
    let (project, tasks) = visible_project(ctx, reference, false)?;
    let history = HistoryRepo::new(&ctx.conn).get_history(Entity::Project, project.id)?;

    if json {
        return super::print_json(&ProjectDetail {
            view: ProjectView::from(&project),
            tasks: &tasks,
            history: &history,
        });
    }

    println!("{} #{} {}", "📁".cyan(), project.id, project.name.bold());
    println!(
        "   Assigned:   {} ({})",
        or_dash(project.assigned_to_name.as_deref()),
        project.assigned_to_role.map_or("-", Role::label)
    );
    println!("   Type:       {}", or_dash(project.type_name.as_deref()));
    println!("   Effort:     {}", project.level);
    println!("   Requested:  {}", project.request_date);
    println!(
        "   Plan:       {} → {}",
        project.plan_start_date, project.plan_end_date
    );
    if let Some(hint) = duration_hint(&project.plan_start_date, &project.plan_end_date) {
        println!("               {}", hint.dimmed());
    }
    println!(
        "   Actual:     {} → {}",
        or_dash(project.actual_start.as_deref()),
        or_dash(project.actual_end.as_deref())
    );
    println!("   Live:       {}", or_dash(project.live_date.as_deref()));
    println!(
        "   Progress:   {}% {}  {}",
        project.progress,
        paint_status(project.status),
        paint_delivery(project.delivery_status())
    );
    println!("   Remark:     {}", project.remark);

    println!();
    println!("{} Tasks ({})", "📋".cyan(), tasks.len());
    for t in &tasks {
        println!(
            "   #{:<4} {:<32} {:<16} {:>3}%  {}",
            t.id,
            t.detail,
            or_dash(t.assigned_to_name.as_deref()),
            t.progress,
            paint_status(t.status)
        );
    }

    if !history.is_empty() {
        println!();
        println!("{} History", "🕘".cyan());
        super::print_history(&history);
    }
    Ok(())
}

fn require_owner(ctx: &Ctx, project: &Project, action: Action) -> Result<()> {
    if can_modify_project(ctx.viewer(), project, action) {
        return Ok(());
    }
    Err(super::denied(
        ctx.viewer(),
        TrackerError::denied("change projects assigned to someone else"),
    ))
}

fn edit(ctx: &Ctx, args: EditArgs) -> Result<()> {
    ctx.require(Action::Edit, Resource::Project)?;
    let role = ctx.session.role();
    let (project, _) = visible_project(ctx, &args.project, true)?;
    require_owner(ctx, &project, Action::Edit)?;

    let mut form = ProjectForm::from_project(&project);
    if let Some(reference) = args.assigned_to.as_deref() {
        if role != Role::Admin {
            bail!("Only administrators can reassign projects");
        }
        let group = args.group.or(form.assigned_group);
        let user = ctx.assignee(reference, group)?;
        form.assigned_to = Some(user.sap);
        form.assigned_group = Some(user.role);
    }
    if let Some(name) = args.name {
        form.name = name;
    }
    if let Some(type_id) = ctx.ref_id(RefKind::ProjectType, args.project_type.as_deref())? {
        form.type_id = Some(type_id);
    }
    if let Some(level) = args.level {
        form.level = Some(level);
    }
    if let Some(d) = args.request_date {
        form.request_date = d;
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
    if args.live_date.is_some() {
        form.live_date = args.live_date;
    }
    if let Some(remark) = args.remark {
        form.remark = remark;
    }

    let draft = super::submit(form.into_draft(role))?;
    let prompt = format!("Save changes to project #{} \"{}\"?", project.id, project.name);
    if !super::confirm(&prompt, args.yes)? {
        return Ok(());
    }
    let tx = ctx.conn.unchecked_transaction()?;
    let changes = ProjectRepo::new(&tx).update(project.id, &draft, &ctx.viewer().username)?;
    tx.commit()?;

    print_changes(&format!("project #{}", project.id), &changes);
    Ok(())
}

pub(super) fn print_changes(what: &str, changes: &[FieldChange]) {
    if changes.is_empty() {
        println!("{} Nothing changed on {what}.", "○".dimmed());
        return;
    }
    println!("{} Updated {what}", "✓".green());
    for c in changes {
        println!(
            "   {:<16} {} → {}",
            c.field.yellow(),
            or_dash(c.before.as_deref()).dimmed(),
            or_dash(c.after.as_deref())
        );
    }
}

fn delete(ctx: &Ctx, reference: &str, yes: bool) -> Result<()> {
    ctx.require(Action::Delete, Resource::Project)?;
    let (project, _) = visible_project(ctx, reference, true)?;
    require_owner(ctx, &project, Action::Delete)?;

    if !super::confirm(&format!("Delete project #{} \"{}\"?", project.id, project.name), yes)? {
        return Ok(());
    }
    ProjectRepo::new(&ctx.conn).delete(project.id)?;
    println!("{} Deleted project #{}", "✓".green(), project.id);
    Ok(())
}

fn export(ctx: &Ctx, args: &ExportArgs) -> Result<()> {
    ctx.require(Action::Download, Resource::Project)?;
    let (Some(from), Some(to)) = (parse_date(&args.from), parse_date(&args.to)) else {
        bail!("--from and --to must be valid dates");
    };
    if from > to {
        bail!("--from must not be after --to");
    }

    let projects = ProjectRepo::new(&ctx.conn).in_plan_range(from, to)?;
    let tasks = TaskRepo::new(&ctx.conn).get_all()?;
    let rows: Vec<ProjectView> = visible_projects(ctx.viewer(), &projects, &tasks)
        .into_iter()
        .map(ProjectView::from)
        .collect();
    let body = serde_json::to_string_pretty(&rows)?;

    match &args.output {
        Some(path) => {
            fs::write(path, body)?;
            info!(path = %path.display(), rows = rows.len(), "projects exported");
            println!(
                "{} Exported {} project(s) to {}",
                "✓".green(),
                rows.len(),
                path.display()
            );
        }
        None => println!("{body}"),
    }
    Ok(())
}
