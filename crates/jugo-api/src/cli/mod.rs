//! CLI command definitions for the `jugo` binary.
//!
//! Uses clap derive macros. `serve` runs the server; the remaining commands
//! administer accounts and API keys against the same database.

pub mod account;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use jugo_observe::tracing_setup::LogFormat;

/// Writing-assistant backend: realtime editor sessions and AI generation tasks.
#[derive(Parser)]
#[command(name = "jugo", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log output format (pretty or json).
    #[arg(long, global = true, default_value = "pretty", env = "JUGO_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Also export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP and WebSocket server.
    Serve {
        /// Listen address. Overrides `server.host` from config.toml.
        #[arg(long)]
        host: Option<String>,

        /// Listen port. Overrides `server.port` from config.toml.
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Manage users.
    User {
        #[command(subcommand)]
        action: UserCommand,
    },

    /// Manage API keys.
    Key {
        #[command(subcommand)]
        action: KeyCommand,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum UserCommand {
    /// Register a user.
    Create {
        /// Unique username.
        username: String,
    },
}

#[derive(Subcommand)]
pub enum KeyCommand {
    /// Create an API key for a user. The key is printed once.
    Create {
        /// Owner of the key.
        #[arg(long)]
        user_id: i64,

        /// Label to tell keys apart.
        #[arg(long, default_value = "default")]
        name: String,
    },
}
