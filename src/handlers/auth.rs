//! Handlers for `login`, `logout`, `whoami` and `menu`.

use std::io::{self, BufRead, Write};

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tracing::{info, warn};
use worktrack::engine::access::{menu_for, MenuItem, Permissions};
use worktrack::engine::config::Config;
use worktrack::engine::db::Db;
use worktrack::engine::error::TrackerError;
use worktrack::engine::repo::UserRepo;
use worktrack::engine::session::{verify_password, Session, SessionStore};

use super::Ctx;

#[derive(Args, Clone)]
pub struct LoginArgs {
    pub username: String,
    /// Read from stdin when omitted
    #[arg(long, env = "WORKTRACK_PASSWORD")]
    pub password: Option<String>,
}

/// Verifies credentials and stores the session.
///
/// # Errors
/// Returns `InvalidCredentials` on a wrong username or password.
pub fn login(config: &Config, args: LoginArgs) -> Result<()> {
    let conn = Db::connect(config)?;
    let password = match args.password {
        Some(p) => p,
        None => prompt_password()?,
    };

    let Some((user, hash)) = UserRepo::new(&conn).credentials(&args.username)? else {
        warn!(username = %args.username, "login failed: unknown user");
        return Err(TrackerError::InvalidCredentials.into());
    };
    if !verify_password(user.sap, &password, &hash) {
        warn!(username = %args.username, "login failed: wrong password");
        return Err(TrackerError::InvalidCredentials.into());
    }

    let session = Session::start(&user, &hash);
    SessionStore::new(config.session_path()).save(&session)?;
    info!(user = %user.username, role = %user.role, "logged in");

    println!(
        "{} Logged in as {} ({})",
        "✓".green(),
        user.name.yellow(),
        user.role.label()
    );
    Ok(())
}

fn prompt_password() -> Result<String> {
    print!("Password: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Clears the stored session.
///
/// # Errors
/// Returns error if the session file cannot be removed.
pub fn logout(config: &Config) -> Result<()> {
    if SessionStore::new(config.session_path()).clear()? {
        println!("{} Logged out.", "✓".green());
    } else {
        println!("{} No active session.", "○".dimmed());
    }
    Ok(())
}

#[derive(Serialize)]
struct WhoAmI<'a> {
    session: &'a Session,
    permissions: Permissions,
}

/// Prints the logged-in user and what they may do.
///
/// # Errors
/// Returns `NotLoggedIn` when there is no valid session.
pub fn whoami(config: &Config, json: bool) -> Result<()> {
    let ctx = Ctx::open(config)?;
    let session = &ctx.session;
    let permissions = session.permissions();

    if json {
        return super::print_json(&WhoAmI {
            session,
            permissions,
        });
    }

    let user = &session.user;
    println!("{} {} ({})", "👤".cyan(), user.name.bold(), user.username.dimmed());
    println!("   SAP:       {}", user.sap);
    println!("   Role:      {}", user.role.label().yellow());
    println!("   Since:     {}", session.issued_at.dimmed());
    println!();
    for (label, caps) in [
        ("project", permissions.project),
        ("task", permissions.task),
        ("user", permissions.user),
        ("data", permissions.reference_data),
    ] {
        let flags: Vec<&str> = [
            (caps.can_add, "add"),
            (caps.can_edit, "edit"),
            (caps.can_delete, "delete"),
            (caps.can_download, "download"),
        ]
        .into_iter()
        .filter_map(|(allowed, name)| allowed.then_some(name))
        .collect();
        let flags = if flags.is_empty() {
            "view".dimmed().to_string()
        } else {
            flags.join(", ")
        };
        println!("   {label:<10} {flags}");
    }
    Ok(())
}

/// Prints the navigation menu for the session's role.
///
/// # Errors
/// Returns error if the tracker is not initialized or nobody is logged in.
pub fn menu(config: &Config, json: bool) -> Result<()> {
    let ctx = Ctx::open(config)?;
    let items = menu_for(ctx.session.role());
    if json {
        return super::print_json(&items);
    }

    println!("{} Menu ({})", "☰".cyan(), ctx.session.role().label());
    print_items(&items, 1);
    Ok(())
}

fn print_items(items: &[MenuItem], depth: usize) {
    let indent = "   ".repeat(depth);
    for item in items {
        if item.command.is_empty() {
            println!("{indent}{}", item.name.bold());
        } else {
            println!("{indent}{:<18} {}", item.name, item.command.dimmed());
        }
        print_items(&item.children, depth + 1);
    }
}
