//! Handler for the `init` command.

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use tracing::info;
use worktrack::engine::config::Config;
use worktrack::engine::db::Db;
use worktrack::engine::forms::{FormMode, UserForm};
use worktrack::engine::repo::UserRepo;
use worktrack::engine::types::Role;

#[derive(Args, Clone)]
pub struct InitArgs {
    /// SAP number of the first administrator
    #[arg(long)]
    pub sap: i64,
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub username: String,
    #[arg(long, env = "WORKTRACK_PASSWORD")]
    pub password: String,
}

/// Creates the store and its first administrator.
///
/// # Errors
/// Returns error if database initialization fails or the store already has users.
pub fn handle(config: &Config, args: InitArgs) -> Result<()> {
    let conn = Db::init(config)?;
    let users = UserRepo::new(&conn);
    if users.count()? > 0 {
        bail!(
            "Tracker at {} is already initialized",
            config.data_dir().display()
        );
    }

    let draft = super::submit(
        UserForm {
            mode: FormMode::Add,
            sap: Some(args.sap),
            name: args.name,
            username: args.username,
            password: args.password,
            role: Some(Role::Admin),
            position_id: None,
        }
        .into_draft(),
    )?;
    users.add(&draft)?;
    info!(sap = draft.sap, "tracker initialized");

    println!(
        "{} Initialized {}",
        "✓".green(),
        config.db_path().display()
    );
    println!("   Administrator: {} ({})", draft.username.yellow(), draft.sap);
    println!("   Next: worktrack login {}", draft.username);
    Ok(())
}
