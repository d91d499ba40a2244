#![forbid(unsafe_code)]

mod cmd;
mod http;
mod output;

use std::env;

use clap::{Parser, Subcommand};
use output::{CliError, OutputMode};
use tasksync_core::config::load_user_config;
use tasksync_core::error::ErrorCode;
use tasksync_core::prefs::default_preferences_path;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "tsk: task tracker client with an optimistic local cache",
    long_about = None
)]
struct Cli {
    /// Output format: pretty, text or json.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// API base URL (overrides TASKSYNC_BASE_URL and the config file).
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Bearer token (overrides TASKSYNC_TOKEN).
    #[arg(long, global = true)]
    token: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Read",
        about = "List tasks",
        long_about = "List one page of tasks. Filters start from the saved preferences unless --fresh is given.",
        after_help = "EXAMPLES:\n    # Tasks due in March, oldest first\n    tsk list --from 01-03-2025 --to 31-03-2025 --asc\n\n    # Search and remember the filters\n    tsk list --search invoice --save\n\n    # Emit machine-readable output\n    tsk list --format json"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show tasks grouped by status",
        long_about = "Show the current list view as To Do, In Progress and Done columns.",
        after_help = "EXAMPLES:\n    # Board of everything due this week\n    tsk board --from 2025-03-10 --to 2025-03-16\n\n    # Make the board the default view\n    tsk board --save"
    )]
    Board(cmd::board::BoardArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show one task",
        after_help = "EXAMPLES:\n    tsk show 12\n    tsk show 12 --format json"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Write",
        about = "Create a task",
        after_help = "EXAMPLES:\n    # A task due next Friday\n    tsk create \"Send invoice\" --due 14-03-2025\n\n    # Start it in progress\n    tsk create \"Draft roadmap\" --status in-progress -d \"Q3 themes\""
    )]
    Create(cmd::create::CreateArgs),

    #[command(
        next_help_heading = "Write",
        about = "Change fields of a task",
        after_help = "EXAMPLES:\n    # Rename\n    tsk update 12 --name \"Send final invoice\"\n\n    # Drop the due date\n    tsk update 12 --clear-due"
    )]
    Update(cmd::update::UpdateArgs),

    #[command(
        next_help_heading = "Write",
        about = "Move a task to another board column",
        after_help = "EXAMPLES:\n    tsk move 12 done\n    tsk move 12 in-progress"
    )]
    Move(cmd::move_cmd::MoveArgs),

    #[command(
        next_help_heading = "Write",
        about = "Delete a task",
        after_help = "EXAMPLES:\n    tsk delete 12"
    )]
    Delete(cmd::delete::DeleteArgs),

    #[command(
        next_help_heading = "Settings",
        subcommand,
        about = "Inspect configuration"
    )]
    Config(cmd::config::ConfigCommand),

    #[command(
        next_help_heading = "Settings",
        subcommand,
        about = "Manage the saved view and filters",
        after_help = "EXAMPLES:\n    tsk prefs show\n    tsk prefs view board\n    tsk prefs reset"
    )]
    Prefs(cmd::prefs::PrefsCommand),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("TASKSYNC_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "tasksync_core=debug,tsk=debug,info"
        } else {
            "tasksync_core=warn,tsk=warn,error"
        })
    });

    let format = env::var("TASKSYNC_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

async fn run(command: &Commands, ctx: &cmd::Context) -> anyhow::Result<()> {
    match command {
        Commands::List(args) => cmd::list::run_list(args, ctx).await,
        Commands::Board(args) => cmd::board::run_board(args, ctx).await,
        Commands::Show(args) => cmd::show::run_show(args, ctx).await,
        Commands::Create(args) => cmd::create::run_create(args, ctx).await,
        Commands::Update(args) => cmd::update::run_update(args, ctx).await,
        Commands::Move(args) => cmd::move_cmd::run_move(args, ctx).await,
        Commands::Delete(args) => cmd::delete::run_delete(args, ctx).await,
        Commands::Config(command) => cmd::config::run_config(command, ctx),
        Commands::Prefs(command) => cmd::prefs::run_prefs(command, ctx),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match load_user_config() {
        Ok(config) => config,
        Err(err) => {
            let output = output::resolve_output_mode(cli.format, cli.json, None);
            let error = CliError::coded(ErrorCode::ConfigParseError, format!("{err:#}"));
            output::render_error(output, &error)?;
            return Err(err);
        }
    };
    if let Some(url) = cli.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
        config.client.base_url = url.trim().to_string();
    }
    if let Some(token) = cli.token.clone() {
        config.client.token = Some(token);
    }

    let output = output::resolve_output_mode(cli.format, cli.json, config.output.as_deref());
    debug!(output = output.as_str(), base_url = %config.client.base_url, "starting");

    let ctx = cmd::Context {
        config,
        output,
        prefs_path: default_preferences_path(),
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(&cli.command, &ctx))
}
