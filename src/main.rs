mod handlers;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use worktrack::engine::config::Config;
use worktrack::engine::types::EffortLevel;

use handlers::auth::LoginArgs;
use handlers::dashboard::DashboardArgs;
use handlers::data::DataCommand;
use handlers::init::InitArgs;
use handlers::kanban::KanbanArgs;
use handlers::project::ProjectCommand;
use handlers::task::TaskCommand;
use handlers::user::UserCommand;

#[derive(Parser)]
#[command(name = "worktrack", version, about = "Track projects and tasks, with derived delivery status")]
struct Cli {
    /// Data directory holding the database and session
    #[arg(long, global = true, env = "WORKTRACK_DIR")]
    dir: Option<PathBuf>,
    /// Rows per page in list views
    #[arg(long, global = true, env = "WORKTRACK_PAGE_SIZE")]
    page_size: Option<usize>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone)]
enum Commands {
    /// Create the store and its first administrator
    Init(InitArgs),
    /// Log in
    Login(LoginArgs),
    /// Log out
    Logout,
    /// Show the logged-in user and their permissions
    Whoami {
        #[arg(long)]
        json: bool,
    },
    /// Show the menu for your role
    Menu {
        #[arg(long)]
        json: bool,
    },
    /// Totals, project rows, monthly chart and reminders
    Dashboard(DashboardArgs),
    /// Task counts per status, grouped by project or assignee
    Kanban(KanbanArgs),
    /// Manage users (administrators)
    #[command(subcommand)]
    User(UserCommand),
    /// Manage projects
    #[command(subcommand)]
    Project(ProjectCommand),
    /// Manage tasks
    #[command(subcommand)]
    Task(TaskCommand),
    /// Manage reference data
    #[command(subcommand)]
    Data(DataCommand),
    /// Run a validation rule without saving anything
    #[command(subcommand)]
    Check(CheckCommand),
}

#[derive(Subcommand, Clone)]
enum CheckCommand {
    /// Effort level against planned duration
    Effort {
        level: EffortLevel,
        plan_start: String,
        plan_end: String,
        #[arg(long)]
        json: bool,
    },
    /// Progress against actual dates
    Progress {
        progress: String,
        #[arg(long)]
        actual_start: Option<String>,
        #[arg(long)]
        actual_end: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Delivery status from plan end and actual end
    Status {
        #[arg(long)]
        plan_end: Option<String>,
        #[arg(long)]
        actual_end: Option<String>,
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let log_json = std::env::var("WORKTRACK_LOG_JSON").is_ok_and(|v| v == "1" || v == "true");
    if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::new(cli.dir).with_page_size(cli.page_size);

    match cli.command {
        Commands::Init(_)
        | Commands::Login(_)
        | Commands::Logout
        | Commands::User(_)
        | Commands::Project(_)
        | Commands::Task(_)
        | Commands::Data(_) => dispatch_write_ops(&config, cli.command),
        Commands::Whoami { .. }
        | Commands::Menu { .. }
        | Commands::Dashboard(_)
        | Commands::Kanban(_)
        | Commands::Check(_) => dispatch_read_ops(&config, cli.command),
    }
}

fn dispatch_write_ops(config: &Config, cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Init(args) => handlers::init::handle(config, args),
        Commands::Login(args) => handlers::auth::login(config, args),
        Commands::Logout => handlers::auth::logout(config),
        Commands::User(cmd) => handlers::user::handle(config, cmd),
        Commands::Project(cmd) => handlers::project::handle(config, cmd),
        Commands::Task(cmd) => handlers::task::handle(config, cmd),
        Commands::Data(cmd) => handlers::data::handle(config, cmd),
        _ => unreachable!("Invalid write command dispatch"),
    }
}

fn dispatch_read_ops(config: &Config, cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Whoami { json } => handlers::auth::whoami(config, json),
        Commands::Menu { json } => handlers::auth::menu(config, json),
        Commands::Dashboard(args) => handlers::dashboard::handle(config, &args),
        Commands::Kanban(args) => handlers::kanban::handle(config, &args),
        Commands::Check(cmd) => dispatch_check(cmd),
        _ => unreachable!("Invalid read command dispatch"),
    }
}

fn dispatch_check(cmd: CheckCommand) -> Result<()> {
    match cmd {
        CheckCommand::Effort {
            level,
            plan_start,
            plan_end,
            json,
        } => handlers::check::effort(level, &plan_start, &plan_end, json),
        CheckCommand::Progress {
            progress,
            actual_start,
            actual_end,
            json,
        } => handlers::check::progress(
            &progress,
            actual_start.as_deref(),
            actual_end.as_deref(),
            json,
        ),
        CheckCommand::Status {
            plan_end,
            actual_end,
            json,
        } => handlers::check::status(plan_end.as_deref(), actual_end.as_deref(), json),
    }
}
