//! Handler for `kanban`.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use worktrack::engine::access::visible_projects;
use worktrack::engine::config::Config;
use worktrack::engine::kanban::{self, KanbanMode};
use worktrack::engine::repo::{ProjectRepo, TaskRepo};
use worktrack::engine::types::Task;

use super::{paint_status, Ctx};

#[derive(Args, Clone)]
pub struct KanbanArgs {
    /// PROJECT, ITGA, SAP or DATA_SCIENCE
    #[arg(long, default_value = "PROJECT")]
    pub by: KanbanMode,
    /// 1-12 or a month name
    #[arg(long, value_parser = super::parse_month_arg)]
    pub month: Option<u32>,
    #[arg(long)]
    pub year: Option<i32>,
    #[arg(long)]
    pub json: bool,
}

/// Prints task counts per status column, grouped by project or assignee.
///
/// # Errors
/// Returns error if the tracker is not initialized or nobody is logged in.
pub fn handle(config: &Config, args: &KanbanArgs) -> Result<()> {
    let ctx = Ctx::open(config)?;
    let projects = ProjectRepo::new(&ctx.conn).get_all()?;
    let tasks = TaskRepo::new(&ctx.conn).get_all()?;

    let visible = visible_projects(ctx.viewer(), &projects, &tasks);
    let tasks: Vec<Task> = tasks
        .iter()
        .filter(|t| visible.iter().any(|p| p.id == t.project_id))
        .cloned()
        .collect();

    let board = kanban::build(&tasks, args.by, args.month, args.year);
    if args.json {
        return super::print_json(&board);
    }

    println!("{} Kanban by {}", "🗂".cyan(), board.mode);
    for column in &board.columns {
        let total: usize = column.groups.iter().map(|g| g.count).sum();
        println!();
        println!("{} ({total})", paint_status(column.status).bold());
        if column.groups.is_empty() {
            println!("   {}", "empty".dimmed());
        }
        for group in &column.groups {
            println!("   {:<32} {}", group.name, group.count);
        }
    }
    Ok(())
}
