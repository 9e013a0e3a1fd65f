mod app;
mod bundle;
mod commands;
mod config;
mod transport;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use mirror_guard::ApprovalAction;
use tracing_subscriber::EnvFilter;

use crate::app::App;

#[derive(Parser)]
#[command(name = "mirror-guard")]
#[command(about = "Guard git mirror syncs against upstream force-pushes")]
struct Cli {
    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Log filter, e.g. `info` or `mirror_guard=debug` (overrides -v)
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage the repositories being mirrored
    Repo {
        #[command(subcommand)]
        command: RepoCommand,
    },
    /// Check a repository for upstream force-pushes without syncing
    Detect {
        /// Repository ID
        id: String,
    },
    /// Sync repositories, guarded by the configured protection strategy
    Sync {
        /// Repository IDs (defaults to every schedulable repository)
        ids: Vec<String>,
    },
    /// Approve syncs held back by a detected force-push
    Approve {
        /// Repository IDs
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Dismiss force-push alerts without syncing
    Dismiss {
        /// Repository IDs
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// List the snapshots taken of a repository
    Backups {
        /// Repository ID
        id: String,
    },
    /// Show recent activity
    Activity {
        /// Only show activity for this repository ID
        #[arg(long)]
        repo: Option<String>,
        /// Maximum number of entries
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Include the recorded details (detection results as JSON)
        #[arg(long)]
        details: bool,
    },
}

#[derive(Subcommand)]
enum RepoCommand {
    /// Register a repository for mirroring
    Add {
        /// Repository on the source host, as <owner>/<name>
        full_name: String,
        /// Owner on the mirror host (defaults to the configured default or the source owner)
        #[arg(long)]
        mirror_owner: Option<String>,
        /// Clone URL of the mirror (defaults to one derived from the mirror base URL)
        #[arg(long)]
        clone_url: Option<String>,
    },
    /// List registered repositories
    List,
}

fn init_logging(verbose: u8, log_level: Option<&str>) {
    let default = match verbose {
        0 => "warn,mirror_guard=info",
        1 => "debug",
        _ => "trace",
    };
    let filter = log_level
        .and_then(|level| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_level.as_deref());

    let app = App::build(config::load_config())?;

    match cli.command {
        Command::Repo { command } => match command {
            RepoCommand::Add {
                full_name,
                mirror_owner,
                clone_url,
            } => commands::repo::add(&app.store, &app.config, &full_name, mirror_owner, clone_url),
            RepoCommand::List => commands::repo::list(&app.store),
        },
        Command::Detect { id } => commands::detect::run(&app.store, &app.guard, &app.config, &id).await,
        Command::Sync { ids } => {
            let syncer = app.syncer()?;
            commands::sync::run(&app.store, &syncer, &ids).await
        }
        Command::Approve { ids } => {
            let workflow = app.approval(ApprovalAction::Approve)?;
            commands::approve::run(&workflow, ids, ApprovalAction::Approve).await
        }
        Command::Dismiss { ids } => {
            let workflow = app.approval(ApprovalAction::Dismiss)?;
            commands::approve::run(&workflow, ids, ApprovalAction::Dismiss).await
        }
        Command::Backups { id } => commands::backups::run(&app.store, &app.backups, &app.config, &id),
        Command::Activity {
            repo,
            limit,
            details,
        } => commands::activity::run(&app.store, repo.as_deref(), limit, details),
    }
}
