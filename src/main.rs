use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use agenthub::Config;

mod commands;
mod tui;

#[derive(Parser)]
#[command(name = "hub")]
#[command(about = "Agent hub - shared messages, status, context and file locks for cooperating agents")]
#[command(version)]
struct Cli {
    /// Path to the hub directory (default: .agenthub in current dir)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Output as JSON for machine consumption
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new hub in the current directory
    Init,

    /// Send a message to another agent (use "all" to broadcast)
    Send {
        /// Sending agent
        #[arg(long)]
        from: String,

        /// Receiving agent
        #[arg(long, default_value = "all")]
        to: String,

        /// Message type (info, coordination, progress, ...)
        #[arg(long = "type", default_value = "info")]
        kind: String,

        /// Message text
        message: String,
    },

    /// Show messages addressed to an agent
    Inbox {
        /// Agent name
        agent: String,

        /// Include messages already read
        #[arg(long)]
        all: bool,

        /// Mark the listed messages as read
        #[arg(long)]
        mark_read: bool,
    },

    /// Mark a message as read
    Read {
        /// Message ID
        id: String,
    },

    /// Record or show agent status
    Status {
        #[command(subcommand)]
        command: StatusCommands,
    },

    /// Read or write the shared key/value context
    Context {
        #[command(subcommand)]
        command: ContextCommands,
    },

    /// Exclusive file locks
    Lock {
        #[command(subcommand)]
        command: LockCommands,
    },

    /// Lock requests that wait for the lock manager
    Request {
        #[command(subcommand)]
        command: RequestCommands,
    },

    /// Component integration points
    Integration {
        #[command(subcommand)]
        command: IntegrationCommands,
    },

    /// Integration conflicts
    Conflict {
        #[command(subcommand)]
        command: ConflictCommands,
    },

    /// Write a file under a hub lock, notifying the team
    Write {
        /// File to write
        path: String,

        /// Agent doing the write
        #[arg(long)]
        agent: String,

        /// Content to write
        #[arg(long, conflicts_with = "from_file")]
        content: Option<String>,

        /// Read the content from this file instead
        #[arg(long = "from-file")]
        from_file: Option<PathBuf>,
    },

    /// Ask another agent to review a file
    Review {
        /// File ready for review
        path: String,

        /// Agent requesting the review
        #[arg(long)]
        from: String,

        /// Reviewer
        #[arg(long, default_value = "qa_agent")]
        reviewer: String,
    },

    /// Record progress and broadcast it
    Progress {
        /// Agent reporting progress
        agent: String,

        /// Progress text
        progress: String,

        /// Extra details as a JSON object
        #[arg(long)]
        details: Option<String>,
    },

    /// Team overview: latest status per agent, locked files, recent integration points
    Team,

    /// Analyze declared component dependencies
    Deps {
        #[command(subcommand)]
        command: DepsCommands,
    },

    /// Activity statistics
    Stats,

    /// Live terminal dashboard
    Watch {
        /// Refresh interval in milliseconds (overrides config.toml)
        #[arg(long)]
        refresh: Option<u64>,
    },
}

#[derive(Subcommand)]
enum StatusCommands {
    /// Record a status update
    Set {
        /// Agent name
        agent: String,

        /// Status text
        status: String,

        /// Extra details as a JSON object
        #[arg(long)]
        details: Option<String>,
    },
    /// Show status history (all agents unless one is given)
    Show {
        /// Agent name
        agent: Option<String>,

        /// Only the latest status per agent
        #[arg(long)]
        latest: bool,
    },
}

#[derive(Subcommand)]
enum ContextCommands {
    /// Set a key (the value is parsed as JSON, falling back to a plain string)
    Set {
        key: String,
        value: String,
    },
    /// Get one key, or everything when no key is given
    Get {
        key: Option<String>,
    },
}

#[derive(Subcommand)]
enum LockCommands {
    /// Acquire a lock (exits non-zero if already held)
    Acquire {
        /// File path
        path: String,

        /// Agent taking the lock
        #[arg(long)]
        agent: String,
    },
    /// Release a lock held by the agent
    Release {
        /// File path
        path: String,

        /// Agent releasing the lock
        #[arg(long)]
        agent: String,
    },
    /// Show who holds a lock
    Holder {
        /// File path
        path: String,
    },
    /// List held locks
    List {
        /// Only locks held longer than this many minutes
        #[arg(long)]
        stale: Option<i64>,
    },
    /// Remove a lock regardless of holder
    Break {
        /// File path
        path: String,
    },
}

#[derive(Subcommand)]
enum RequestCommands {
    /// Ask the lock manager for a file
    Create {
        /// File path
        path: String,

        /// Requesting agent
        #[arg(long)]
        agent: String,
    },
    /// List lock requests
    List {
        /// Include approved and denied requests
        #[arg(long)]
        all: bool,
    },
    /// Approve a pending request
    Approve {
        /// Request ID
        id: String,
    },
    /// Deny a pending request
    Deny {
        /// Request ID
        id: String,

        /// Reason given to the requester
        #[arg(long)]
        reason: Option<String>,
    },
    /// Approve every pending request whose file is free
    ApproveAll,
}

#[derive(Subcommand)]
enum IntegrationCommands {
    /// Register a component interface
    Register {
        /// Component name
        component: String,

        /// Agent announcing it
        #[arg(long)]
        agent: String,

        /// Interface description as a JSON object
        #[arg(long)]
        interface: Option<String>,

        /// Components this one depends on (can specify multiple)
        #[arg(long = "depends-on", value_delimiter = ',', num_args = 1..)]
        depends_on: Vec<String>,
    },
    /// List integration points
    List,
    /// Show which integration points depend on a component
    Deps {
        /// Component name
        component: String,
    },
}

#[derive(Subcommand)]
enum ConflictCommands {
    /// Report a conflict to the integration agent
    Report {
        /// What conflicts
        details: String,

        /// Reporting agent
        #[arg(long)]
        agent: String,
    },
    /// List conflicts
    List {
        /// Include resolved conflicts
        #[arg(long)]
        all: bool,
    },
    /// Mark a conflict resolved
    Resolve {
        /// Conflict ID
        id: String,
    },
}

#[derive(Subcommand)]
enum DepsCommands {
    /// Check for cycles and unregistered dependencies
    Check,
    /// Print components in build order (dependencies first)
    Order,
}

fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let hub_dir = cli.dir.unwrap_or_else(|| PathBuf::from(".agenthub"));

    // The dashboard owns the terminal; log lines would tear it
    if !matches!(cli.command, Commands::Watch { .. }) {
        let level = Config::load(&hub_dir)
            .map(|c| c.log.level)
            .unwrap_or_else(|_| "warn".to_string());
        init_logging(&level);
    }

    match cli.command {
        Commands::Init => commands::init::run(&hub_dir),
        Commands::Send {
            from,
            to,
            kind,
            message,
        } => commands::message::run_send(&hub_dir, &from, &to, &message, &kind, cli.json),
        Commands::Inbox {
            agent,
            all,
            mark_read,
        } => commands::message::run_inbox(&hub_dir, &agent, all, mark_read, cli.json),
        Commands::Read { id } => commands::message::run_read(&hub_dir, &id),
        Commands::Status { command } => match command {
            StatusCommands::Set {
                agent,
                status,
                details,
            } => commands::status::run_set(&hub_dir, &agent, &status, details.as_deref()),
            StatusCommands::Show { agent, latest } => {
                commands::status::run_show(&hub_dir, agent.as_deref(), latest, cli.json)
            }
        },
        Commands::Context { command } => match command {
            ContextCommands::Set { key, value } => {
                commands::context::run_set(&hub_dir, &key, &value)
            }
            ContextCommands::Get { key } => {
                commands::context::run_get(&hub_dir, key.as_deref(), cli.json)
            }
        },
        Commands::Lock { command } => match command {
            LockCommands::Acquire { path, agent } => {
                commands::lock::run_acquire(&hub_dir, &agent, &path)
            }
            LockCommands::Release { path, agent } => {
                commands::lock::run_release(&hub_dir, &agent, &path)
            }
            LockCommands::Holder { path } => commands::lock::run_holder(&hub_dir, &path, cli.json),
            LockCommands::List { stale } => commands::lock::run_list(&hub_dir, stale, cli.json),
            LockCommands::Break { path } => commands::lock::run_break(&hub_dir, &path),
        },
        Commands::Request { command } => match command {
            RequestCommands::Create { path, agent } => {
                commands::request::run_create(&hub_dir, &agent, &path, cli.json)
            }
            RequestCommands::List { all } => commands::request::run_list(&hub_dir, all, cli.json),
            RequestCommands::Approve { id } => commands::request::run_approve(&hub_dir, &id),
            RequestCommands::Deny { id, reason } => {
                commands::request::run_deny(&hub_dir, &id, reason.as_deref())
            }
            RequestCommands::ApproveAll => commands::request::run_approve_all(&hub_dir),
        },
        Commands::Integration { command } => match command {
            IntegrationCommands::Register {
                component,
                agent,
                interface,
                depends_on,
            } => commands::integration::run_register(
                &hub_dir,
                &agent,
                &component,
                interface.as_deref(),
                &depends_on,
            ),
            IntegrationCommands::List => commands::integration::run_list(&hub_dir, cli.json),
            IntegrationCommands::Deps { component } => {
                commands::integration::run_deps(&hub_dir, &component, cli.json)
            }
        },
        Commands::Conflict { command } => match command {
            ConflictCommands::Report { details, agent } => {
                commands::conflict::run_report(&hub_dir, &agent, &details, cli.json)
            }
            ConflictCommands::List { all } => {
                commands::conflict::run_list(&hub_dir, all, cli.json)
            }
            ConflictCommands::Resolve { id } => commands::conflict::run_resolve(&hub_dir, &id),
        },
        Commands::Write {
            path,
            agent,
            content,
            from_file,
        } => commands::write::run(
            &hub_dir,
            &agent,
            &path,
            content.as_deref(),
            from_file.as_deref(),
            cli.json,
        ),
        Commands::Review {
            path,
            from,
            reviewer,
        } => commands::team::run_review(&hub_dir, &from, &path, &reviewer),
        Commands::Progress {
            agent,
            progress,
            details,
        } => commands::team::run_progress(&hub_dir, &agent, &progress, details.as_deref()),
        Commands::Team => commands::team::run(&hub_dir, cli.json),
        Commands::Deps { command } => match command {
            DepsCommands::Check => commands::deps::run_check(&hub_dir, cli.json),
            DepsCommands::Order => commands::deps::run_order(&hub_dir, cli.json),
        },
        Commands::Stats => commands::stats::run(&hub_dir, cli.json),
        Commands::Watch { refresh } => {
            let config = Config::load(&hub_dir)?;
            let refresh_ms = refresh.unwrap_or(config.dashboard.refresh_ms);
            tui::run(hub_dir, refresh_ms)
        }
    }
}
