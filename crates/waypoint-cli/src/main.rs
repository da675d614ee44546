#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use output::OutputMode;
use std::env;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use waypoint_core::config::resolve_config;

use cmd::Context;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "waypoint: quarterly roadmap planner backed by a hosted table",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Output format (overrides FORMAT and the user config).
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Suppress notices and other non-essential output.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Work against the local snapshot instead of the hosted table.
    #[arg(long, global = true)]
    offline: bool,

    /// Project root holding `.waypoint/` (defaults to the current directory).
    #[arg(short = 'C', long = "root", global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Explicit format request from flags, if any.
    fn format_flag(&self) -> Option<&'static str> {
        if self.json {
            Some(OutputMode::Json.as_str())
        } else {
            self.format.map(OutputMode::as_str)
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Board",
        about = "Show the board for a quarter",
        long_about = "Load the table (seeding it when empty) and list initiatives for one quarter, grouped by team lane.",
        after_help = "EXAMPLES:\n    # Current quarter\n    wp list\n\n    # High-priority engineering work in Q2 2026\n    wp list --team engineering --priority high -Q 2 -Y 2026\n\n    # Search titles and descriptions\n    wp list --search dashboard\n\n    # Emit machine-readable output\n    wp list --json"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Board",
        about = "Show summary numbers for a quarter",
        long_about = "Show total, high-priority and completed counts, average progress, and per-team lane summaries.",
        after_help = "EXAMPLES:\n    # Current quarter\n    wp stats\n\n    # Only design work\n    wp stats --team design"
    )]
    Stats(cmd::stats::StatsArgs),

    #[command(
        next_help_heading = "Board",
        about = "Follow live changes",
        long_about = "Keep a session open, apply pushed changes from other clients, and reprint the board after every change.",
        after_help = "EXAMPLES:\n    # Follow the current quarter until Ctrl-C\n    wp watch\n\n    # Print JSON frames, stop after five updates\n    wp watch --json --updates 5"
    )]
    Watch(cmd::watch::WatchArgs),

    #[command(
        next_help_heading = "Editing",
        about = "Create an initiative",
        long_about = "Create an initiative. Months are relative to the quarter (1-3) and the end month may not precede the start month.",
        after_help = "EXAMPLES:\n    # Two-month design project in the current quarter\n    wp add \"Icon refresh\" --team design --start 1 --end 2\n\n    # High-priority launch with an owner\n    wp add \"Launch\" -t marketing -p high -a MR --start 3"
    )]
    Add(cmd::add::AddArgs),

    #[command(
        next_help_heading = "Editing",
        about = "Edit an initiative",
        long_about = "Replace fields of an initiative. Unset flags keep their stored values; an empty string clears description or assignee.",
        after_help = "EXAMPLES:\n    # Record progress\n    wp edit 3f2a --progress 80 --status in-progress\n\n    # Clear the assignee\n    wp edit 3f2a --assignee \"\""
    )]
    Edit(cmd::edit::EditArgs),

    #[command(
        name = "move",
        next_help_heading = "Editing",
        about = "Move an initiative to another lane or month",
        long_about = "Reassign an initiative's team and start month, keeping its duration. The end month is clamped to the last month of the quarter.",
        after_help = "EXAMPLES:\n    # Hand over to operations starting in month 2\n    wp move 3f2a --team operations --start 2"
    )]
    Move(cmd::move_cmd::MoveArgs),

    #[command(
        next_help_heading = "Editing",
        about = "Delete an initiative",
        after_help = "EXAMPLES:\n    # Delete by id prefix\n    wp rm 3f2a"
    )]
    Rm(cmd::rm::RmArgs),

    #[command(
        next_help_heading = "Data",
        about = "Export the board as CSV",
        long_about = "Write the filtered initiatives for one quarter as CSV. Month columns use the month names of each initiative's quarter.",
        after_help = "EXAMPLES:\n    # Write roadmap_Q1_2026.csv in the project root\n    wp export -Q 1 -Y 2026\n\n    # Stream to stdout\n    wp export -o -"
    )]
    Export(cmd::export::ExportArgs),

    #[command(
        next_help_heading = "Configuration",
        about = "Show or edit configuration",
        after_help = "EXAMPLES:\n    # Resolved configuration (anon key masked)\n    wp config show\n\n    # Point the project at a hosted table\n    wp config set remote.url https://example.supabase.co\n    wp config set remote.anon_key <key>\n\n    # Prefer JSON output everywhere\n    wp config set --scope user output json"
    )]
    Config(cmd::config::ConfigArgs),

    #[command(
        next_help_heading = "Configuration",
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n    # Bash\n    wp completions bash > ~/.local/share/bash-completion/completions/wp"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("WAYPOINT_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "waypoint=debug,wp=debug,info"
        } else {
            "waypoint=info,wp=info,warn"
        })
    });

    let format = env::var("WAYPOINT_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

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

async fn dispatch(command: &Commands, ctx: &Context) -> anyhow::Result<()> {
    match command {
        Commands::List(args) => cmd::list::run_list(args, ctx).await,
        Commands::Stats(args) => cmd::stats::run_stats(args, ctx).await,
        Commands::Watch(args) => cmd::watch::run_watch(args, ctx).await,
        Commands::Add(args) => cmd::add::run_add(args, ctx).await,
        Commands::Edit(args) => cmd::edit::run_edit(args, ctx).await,
        Commands::Move(args) => cmd::move_cmd::run_move(args, ctx).await,
        Commands::Rm(args) => cmd::rm::run_rm(args, ctx).await,
        Commands::Export(args) => cmd::export::run_export(args, ctx).await,
        Commands::Config(args) => cmd::config::run_config(args, ctx),
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = match &cli.root {
        Some(dir) => dir.clone(),
        None => env::current_dir()?,
    };
    let config = resolve_config(&project_root, cli.format_flag())?;
    let ctx = Context {
        output: OutputMode::from_resolved(&config.resolved_output),
        project_root,
        config,
        quiet: cli.quiet,
        offline: cli.offline,
    };
    debug!(output = ctx.output.as_str(), offline = ctx.offline, "resolved context");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(dispatch(&cli.command, &ctx))
}
