// Cadence — CLI Module
//
// Command-line interface using clap derive macros.
// Subcommands: init, store, get, list, delete, search, ask, access, serve.

mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

pub use commands::execute;

/// Cadence — credential vault and role-gated knowledge gateway for a music
/// teaching studio.
#[derive(Parser, Debug)]
#[command(name = "cadence")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a cadence.toml (default: $CADENCE_CONFIG, then the data dir).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Identity of the person a command acts for.
#[derive(Args, Debug, Clone)]
pub struct CallerArgs {
    /// Owner id whose credentials and usage history are touched.
    #[arg(long)]
    pub owner: String,

    /// Comma-separated roles (student, educator, admin). Unknown roles are ignored.
    #[arg(long, default_value = "")]
    pub roles: String,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// MCP over stdin/stdout.
    Stdio,
    /// JSON-RPC 2.0 over a Unix domain socket.
    Uds,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize Cadence: master secret, data directory and vault database.
    Init,

    /// Store (or replace) a credential.
    Store {
        #[command(flatten)]
        caller: CallerArgs,

        /// Credential name, e.g. "llm-api".
        name: String,

        /// The secret value. Read from stdin when omitted, which keeps it out
        /// of shell history.
        #[arg(long)]
        secret: Option<String>,
    },

    /// Print a decrypted credential.
    Get {
        #[command(flatten)]
        caller: CallerArgs,

        name: String,
    },

    /// List credential names and timestamps (no secrets).
    List {
        #[command(flatten)]
        caller: CallerArgs,
    },

    /// Delete a credential.
    Delete {
        #[command(flatten)]
        caller: CallerArgs,

        name: String,
    },

    /// Search the knowledge base with the caller's roles.
    Search {
        #[command(flatten)]
        caller: CallerArgs,

        /// Words to look for. Empty lists every permitted entry.
        #[arg(default_value = "")]
        query: String,
    },

    /// Ask the assistant a question using the owner's "llm-api" key.
    Ask {
        #[command(flatten)]
        caller: CallerArgs,

        question: String,
    },

    /// Show the permissions and knowledge tiers granted by a role set.
    Access {
        #[command(flatten)]
        caller: CallerArgs,
    },

    /// Start the Cadence daemon (MCP or UDS server).
    Serve {
        #[arg(long, value_enum, default_value = "stdio")]
        transport: Transport,

        /// Session owner for MCP tools (required for stdio).
        #[arg(long)]
        owner: Option<String>,

        /// Session roles for MCP tools.
        #[arg(long, default_value = "")]
        roles: String,

        /// Socket path for the UDS transport (default: <data_dir>/cadence.sock).
        #[arg(long)]
        socket: Option<PathBuf>,
    },
}
