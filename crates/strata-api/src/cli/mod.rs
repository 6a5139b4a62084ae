//! CLI command definitions for the `strata` binary.

pub mod memory;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Layered long-term memory for conversational agents.
#[derive(Parser)]
#[command(name = "strata", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true, env = "STRATA_OTEL")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the extraction workers and the REST API server.
    Serve {
        /// Port to listen on (defaults to `[server] port`).
        #[arg(long, short)]
        port: Option<u16>,

        /// Host to bind to (defaults to `[server] host`).
        #[arg(long)]
        host: Option<String>,
    },

    /// Extract memories from one message now, bypassing queue and rate gate.
    Extract {
        /// Owner the memories belong to (sender id; defaults to the chat id).
        #[arg(long)]
        owner: Option<String>,

        /// Chat the message came from.
        #[arg(long)]
        chat: String,

        /// Message id, kept as provenance.
        #[arg(long)]
        message: String,

        /// Message text.
        #[arg(long)]
        text: String,

        /// Recent conversation history.
        #[arg(long, default_value = "")]
        context: String,
    },

    /// Show the memories most relevant to a query.
    Recall {
        /// Owner whose memory is searched.
        #[arg(long)]
        owner: String,

        /// Free-text query.
        query: String,
    },

    /// Count an owner's records in each layer.
    Layers {
        #[arg(long)]
        owner: String,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}
