//! Handlers for `user add|list|edit|delete`. Administrators only.

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use tracing::info;
use worktrack::engine::access::{Action, Resource};
use worktrack::engine::config::Config;
use worktrack::engine::forms::{FormMode, UserForm};
use worktrack::engine::repo::{RefRepo, UserRepo};
use worktrack::engine::resolver::resolve_user;
use worktrack::engine::types::{RefKind, Role};

use super::{or_dash, Ctx};

#[derive(Subcommand, Clone)]
pub enum UserCommand {
    /// Register a user
    Add(AddArgs),
    /// List users
    List {
        #[arg(long)]
        role: Option<Role>,
        #[arg(long)]
        json: bool,
    },
    /// Change a user's details
    Edit(EditArgs),
    /// Delete a user with no assigned work
    Delete {
        /// SAP or username
        user: String,
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Args, Clone)]
pub struct AddArgs {
    #[arg(long)]
    pub sap: i64,
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub username: String,
    #[arg(long, env = "WORKTRACK_NEW_PASSWORD")]
    pub password: String,
    #[arg(long)]
    pub role: Role,
    /// Position id or name; required for every role except ADMIN
    #[arg(long)]
    pub position: Option<String>,
    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Args, Clone)]
pub struct EditArgs {
    /// SAP or username
    pub user: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub username: Option<String>,
    /// Leave out to keep the current password
    #[arg(long, env = "WORKTRACK_NEW_PASSWORD")]
    pub password: Option<String>,
    #[arg(long)]
    pub role: Option<Role>,
    #[arg(long)]
    pub position: Option<String>,
    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

/// Runs a user subcommand.
///
/// # Errors
/// Returns error if the session is not an administrator's or the command fails.
pub fn handle(config: &Config, cmd: UserCommand) -> Result<()> {
    let ctx = Ctx::open(config)?;
    match cmd {
        UserCommand::Add(args) => add(&ctx, args),
        UserCommand::List { role, json } => list(&ctx, role, json),
        UserCommand::Edit(args) => edit(&ctx, args),
        UserCommand::Delete { user, yes } => delete(&ctx, &user, yes),
    }
}

/// Resolves a position and checks it belongs to the role.
fn position_for(ctx: &Ctx, role: Role, reference: Option<&str>) -> Result<Option<i64>> {
    let Some(reference) = reference else {
        return Ok(None);
    };
    let position = RefRepo::new(&ctx.conn).resolve(RefKind::Position, reference)?;
    if position.role.is_some_and(|r| r != role) {
        bail!(
            "Position \"{}\" belongs to {}, not {}",
            position.name,
            position.role.map_or("-", Role::label),
            role.label()
        );
    }
    Ok(Some(position.id))
}

fn add(ctx: &Ctx, args: AddArgs) -> Result<()> {
    ctx.require(Action::Add, Resource::User)?;
    let form = UserForm {
        mode: FormMode::Add,
        sap: Some(args.sap),
        name: args.name,
        username: args.username,
        password: args.password,
        role: Some(args.role),
        position_id: position_for(ctx, args.role, args.position.as_deref())?,
    };
    let draft = super::submit(form.into_draft())?;
    let prompt = format!(
        "Add user {} ({}, {})?",
        draft.username,
        draft.sap,
        draft.role.label()
    );
    if !super::confirm(&prompt, args.yes)? {
        return Ok(());
    }
    UserRepo::new(&ctx.conn).add(&draft)?;
    info!(sap = draft.sap, role = %draft.role, by = %ctx.viewer().username, "user added");

    println!(
        "{} Added {} ({}, {})",
        "✓".green(),
        draft.username.yellow(),
        draft.sap,
        draft.role.label()
    );
    Ok(())
}

fn list(ctx: &Ctx, role: Option<Role>, json: bool) -> Result<()> {
    ctx.require_admin("view users")?;
    let users = UserRepo::new(&ctx.conn).get_all(role)?;
    if json {
        return super::print_json(&users);
    }

    println!("{} Users ({})", "👥".cyan(), users.len());
    for u in &users {
        println!(
            "   {:<10} {:<16} {:<24} {:<13} {}",
            u.sap,
            u.username,
            u.name,
            u.role.label(),
            or_dash(u.position_name.as_deref()).dimmed()
        );
    }
    Ok(())
}

fn edit(ctx: &Ctx, args: EditArgs) -> Result<()> {
    ctx.require(Action::Edit, Resource::User)?;
    let user = resolve_user(&ctx.conn, &args.user)?;

    let mut form = UserForm::from_user(&user);
    if let Some(name) = args.name {
        form.name = name;
    }
    if let Some(username) = args.username {
        form.username = username;
    }
    if let Some(password) = args.password {
        form.password = password;
    }
    let role = args.role.unwrap_or(user.role);
    form.role = Some(role);
    if args.position.is_some() {
        form.position_id = position_for(ctx, role, args.position.as_deref())?;
    } else if role != user.role {
        // The old position belongs to the old role.
        form.position_id = None;
    }

    let draft = super::submit(form.into_draft())?;
    let prompt = format!("Save changes to user {} ({})?", user.username, user.sap);
    if !super::confirm(&prompt, args.yes)? {
        return Ok(());
    }
    UserRepo::new(&ctx.conn).update(&draft)?;
    info!(sap = draft.sap, by = %ctx.viewer().username, "user updated");

    println!("{} Updated {} ({})", "✓".green(), draft.username.yellow(), draft.sap);
    if draft.sap == ctx.viewer().sap && draft.password.is_some() {
        println!("   {}", "Your password changed; log in again.".dimmed());
    }
    Ok(())
}

fn delete(ctx: &Ctx, reference: &str, yes: bool) -> Result<()> {
    ctx.require(Action::Delete, Resource::User)?;
    let user = resolve_user(&ctx.conn, reference)?;
    if user.sap == ctx.viewer().sap {
        bail!("You cannot delete your own account");
    }

    if !super::confirm(&format!("Delete user {} ({})?", user.username, user.sap), yes)? {
        return Ok(());
    }
    UserRepo::new(&ctx.conn).delete(user.sap)?;
    info!(sap = user.sap, by = %ctx.viewer().username, "user deleted");
    println!("{} Deleted {}", "✓".green(), user.username);
    Ok(())
}
