//! Handler for `dashboard`.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use worktrack::engine::config::Config;
use worktrack::engine::dashboard::{self, ChartFilter};
use worktrack::engine::repo::{ProjectRepo, TaskRepo};
use worktrack::engine::state::DeliveryStatus;
use worktrack::engine::types::Role;

use super::{or_dash, paint_delivery, Ctx};

#[derive(Args, Clone)]
pub struct DashboardArgs {
    /// Chart month: 1-12 or a month name
    #[arg(long, value_parser = super::parse_month_arg)]
    pub month: Option<u32>,
    #[arg(long)]
    pub year: Option<i32>,
    /// ON_TIME or DELAY
    #[arg(long)]
    pub delivery: Option<DeliveryStatus>,
    /// Only work touching this role
    #[arg(long)]
    pub role: Option<Role>,
    #[arg(long)]
    pub json: bool,
}

/// Prints totals, per-project rows, the monthly chart and due-soon reminders.
///
/// # Errors
/// Returns error if the tracker is not initialized or nobody is logged in.
pub fn handle(config: &Config, args: &DashboardArgs) -> Result<()> {
    let ctx = Ctx::open(config)?;
    let projects = ProjectRepo::new(&ctx.conn).get_all()?;
    let tasks = TaskRepo::new(&ctx.conn).get_all()?;
    let filter = ChartFilter {
        month: args.month,
        year: args.year,
        delivery: args.delivery,
        role: args.role,
    };

    let board = dashboard::build(
        ctx.viewer(),
        &projects,
        &tasks,
        &filter,
        super::today(),
        ctx.config.reminder_days,
    );

    if args.json {
        return super::print_json(&board);
    }

    println!("{} Dashboard for {}", "📊".cyan(), ctx.viewer().name.bold());
    super::print_summary(&board.totals);

    println!();
    println!("{} Projects ({})", "📁".cyan(), board.projects.len());
    for row in &board.projects {
        println!(
            "   #{:<4} {:<28} {:<16} {} → {}  {:<10} {}",
            row.id,
            row.name,
            or_dash(row.assigned_to.as_deref()),
            row.plan_start_date,
            row.plan_end_date,
            paint_delivery(row.delivery).to_string(),
            format!(
                "{}/{}/{}",
                row.tasks.to_do, row.tasks.in_progress, row.tasks.completed
            )
            .dimmed()
        );
    }

    println!();
    println!("{} By month (projects / tasks)", "📈".cyan());
    if board.chart.is_empty() {
        println!("   {}", "No data for this filter.".dimmed());
    }
    let widest = board
        .chart
        .iter()
        .map(|p| p.projects.max(p.tasks))
        .max()
        .unwrap_or(0);
    for point in &board.chart {
        println!(
            "   {:<9} {:>3} {:<20} {:>3} {}",
            point.label,
            point.projects,
            bar(point.projects, widest).blue(),
            point.tasks,
            bar(point.tasks, widest).green()
        );
    }

    if !board.reminders.is_empty() {
        println!();
        println!(
            "{} Due within {} days",
            "⏰".yellow(),
            ctx.config.reminder_days
        );
        for group in &board.reminders {
            println!("   {}", group.project.bold());
            for r in &group.tasks {
                let due = if r.is_delay {
                    format!("overdue {}d", -r.days_left).red()
                } else if r.days_left == 0 {
                    "due today".yellow()
                } else {
                    format!("in {}d", r.days_left).normal()
                };
                println!("     #{:<4} {:<32} {}  {}", r.task_id, r.detail, r.plan_end_date, due);
            }
        }
    }
    Ok(())
}

fn bar(value: usize, widest: usize) -> String {
    const WIDTH: usize = 20;
    if widest == 0 {
        return String::new();
    }
    "█".repeat((value * WIDTH).div_ceil(widest).min(WIDTH))
}
