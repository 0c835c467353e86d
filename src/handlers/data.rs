//! Handlers for `data list|add|delete`: project types, platforms, task groups
//! and positions.

use anyhow::{bail, Result};
use clap::Subcommand;
use colored::Colorize;
use serde::Serialize;
use tracing::info;
use worktrack::engine::access::{Action, Resource};
use worktrack::engine::config::Config;
use worktrack::engine::repo::RefRepo;
use worktrack::engine::types::{RefItem, RefKind, Role};

use super::Ctx;

#[derive(Subcommand, Clone)]
pub enum DataCommand {
    /// List reference data, all kinds unless one is given
    List {
        /// project-type, platform, task-group or position
        kind: Option<RefKind>,
        #[arg(long)]
        json: bool,
    },
    /// Add an entry
    Add {
        kind: RefKind,
        name: String,
        /// Role a position belongs to
        #[arg(long)]
        role: Option<Role>,
    },
    /// Delete an entry that nothing uses
    Delete {
        kind: RefKind,
        /// Id or name
        item: String,
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Serialize)]
struct Section {
    kind: &'static str,
    items: Vec<RefItem>,
}

/// Runs a data subcommand.
///
/// # Errors
/// Returns error if the command fails or the session may not change data.
pub fn handle(config: &Config, cmd: DataCommand) -> Result<()> {
    let ctx = Ctx::open(config)?;
    match cmd {
        DataCommand::List { kind, json } => list(&ctx, kind, json),
        DataCommand::Add { kind, name, role } => add(&ctx, kind, &name, role),
        DataCommand::Delete { kind, item, yes } => delete(&ctx, kind, &item, yes),
    }
}

fn list(ctx: &Ctx, kind: Option<RefKind>, json: bool) -> Result<()> {
    let refs = RefRepo::new(&ctx.conn);
    let kinds: Vec<RefKind> = kind.map_or_else(|| RefKind::ALL.to_vec(), |k| vec![k]);

    let mut sections = Vec::with_capacity(kinds.len());
    for kind in kinds {
        sections.push(Section {
            kind: kind.label(),
            items: refs.list(kind)?,
        });
    }
    if json {
        return super::print_json(&sections);
    }

    for section in &sections {
        println!("{} {} ({})", "▸".cyan(), section.kind.bold(), section.items.len());
        if section.items.is_empty() {
            println!("   {}", "none".dimmed());
        }
        for item in &section.items {
            match item.role {
                Some(role) => println!("   {:<5} {:<28} {}", item.id, item.name, role.label().dimmed()),
                None => println!("   {:<5} {}", item.id, item.name),
            }
        }
    }
    Ok(())
}

fn add(ctx: &Ctx, kind: RefKind, name: &str, role: Option<Role>) -> Result<()> {
    ctx.require(Action::Add, Resource::ReferenceData)?;
    if kind != RefKind::Position && role.is_some() {
        bail!("Only positions carry a role");
    }
    let id = RefRepo::new(&ctx.conn).add(kind, name, role)?;
    info!(kind = kind.label(), id, by = %ctx.viewer().username, "reference data added");
    println!("{} Added {} #{}: {}", "✓".green(), kind.label(), id, name.yellow());
    Ok(())
}

fn delete(ctx: &Ctx, kind: RefKind, reference: &str, yes: bool) -> Result<()> {
    ctx.require(Action::Delete, Resource::ReferenceData)?;
    let refs = RefRepo::new(&ctx.conn);
    let item = refs.resolve(kind, reference)?;

    if !super::confirm(&format!("Delete {} \"{}\"?", kind.label(), item.name), yes)? {
        return Ok(());
    }
    refs.delete(kind, item.id)?;
    info!(kind = kind.label(), id = item.id, by = %ctx.viewer().username, "reference data deleted");
    println!("{} Deleted {} #{}", "✓".green(), kind.label(), item.id);
    Ok(())
}
