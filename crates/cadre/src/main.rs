//! # cadre
//!
//! Coordinator binary. `cadre serve` wires the store, coordinator, liveness
//! monitor and HTTP/WebSocket server together. Every other subcommand is a
//! thin worker-side client that talks to the server, or to the local state
//! file when the server is unreachable.

#![deny(unsafe_code)]

mod commands;
mod serve;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cadre_settings::CadreSettings;
use clap::{Parser, Subcommand};

/// Cadre task coordinator.
#[derive(Parser, Debug)]
#[command(name = "cadre", about = "Cadre task coordinator", version)]
struct Cli {
    /// Settings file (defaults to `~/.cadre/settings.json`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Coordinator server URL for client subcommands (overrides settings).
    #[arg(long, global = true)]
    server: Option<String>,

    /// Emit one JSON object per log line.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the coordinator server.
    Serve {
        /// Host to bind (overrides settings).
        #[arg(long)]
        host: Option<String>,

        /// Port to bind, 0 for auto-assign (overrides settings).
        #[arg(long)]
        port: Option<u16>,

        /// Path to the `SQLite` database (overrides settings).
        #[arg(long)]
        db_path: Option<PathBuf>,
    },

    /// Register or refresh a session.
    Register {
        /// Session id.
        session_id: String,

        /// Declared kind or model tag.
        #[arg(long, default_value = "")]
        kind: String,

        /// Maximum tasks the session may own at once.
        #[arg(long, default_value_t = 1)]
        max_tasks: u32,

        /// Specialization tag, repeatable.
        #[arg(long = "specialization")]
        specializations: Vec<String>,
    },

    /// Refresh a session's liveness.
    Heartbeat {
        /// Session id.
        session_id: String,
    },

    /// Terminate a session and release its tasks.
    Deregister {
        /// Session id.
        session_id: String,
    },

    /// Claim a pending task for a session.
    Claim {
        /// Claiming session id.
        session_id: String,
        /// Task id.
        task_id: String,
    },

    /// Complete a claimed task.
    Complete {
        /// Owning session id.
        session_id: String,
        /// Task id.
        task_id: String,

        /// Result payload as JSON. Plain text is stored as a string.
        #[arg(long)]
        result: Option<String>,
    },

    /// Ask the coordinator to pick a session for a pending task.
    Assign {
        /// Task id.
        task_id: String,
    },

    /// Show a single task.
    Task {
        /// Task id.
        task_id: String,
    },

    /// Show every session and task with aggregate counts.
    Status,

    /// Upsert sessions and tasks from a JSON file.
    Sync {
        /// File holding `{"sessions": [...], "tasks": [...]}`.
        file: PathBuf,
    },
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

fn load_settings(cli: &Cli) -> Result<CadreSettings> {
    let mut settings = match &cli.config {
        Some(path) => cadre_settings::load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => cadre_settings::load_settings().context("Failed to load settings")?,
    };
    if let Some(url) = &cli.server {
        settings.client.server_url.clone_from(url);
    }
    if cli.json_logs {
        settings.logging.json = true;
    }
    Ok(settings)
}

fn init_logging(settings: &CadreSettings) {
    if settings.logging.json {
        cadre_core::logging::init_json_subscriber(&settings.logging.level);
    } else {
        cadre_core::logging::init_subscriber(&settings.logging.level);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;
    init_logging(&settings);

    match cli.command {
        Command::Serve {
            host,
            port,
            db_path,
        } => serve::run(settings, serve::Overrides { host, port, db_path }).await,
        command => commands::run(&settings, command).await,
    }
}
