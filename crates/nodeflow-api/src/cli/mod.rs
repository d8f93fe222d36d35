//! CLI command definitions for the `nflow` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod history;
pub mod run;
pub mod workflow;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use comfy_table::{Cell, Color};

use nodeflow_types::execution::NodeExecutionStatus;

/// Run and serve node-based workflows.
#[derive(Parser)]
#[command(name = "nflow", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a workflow graph file and record the run locally.
    Run {
        /// Path to a graph JSON file (`{"nodes": [...], "connections": [...]}`).
        file: PathBuf,

        /// JSON object passed to the trigger nodes.
        #[arg(long)]
        payload: Option<String>,

        /// Workflow id to record the run under (random if omitted).
        #[arg(long)]
        workflow_id: Option<String>,
    },

    /// Show the node executions of a past run.
    History {
        /// Execution UUID.
        execution_id: String,
    },

    /// List stored workflows.
    #[command(alias = "ls")]
    Workflows,

    /// Start the HTTP server.
    Serve {
        /// Port to listen on (defaults to `server.port` in config.toml).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (defaults to `server.host` in config.toml).
        #[arg(long)]
        host: Option<String>,

        /// Also export tracing spans through OpenTelemetry (stdout exporter).
        #[arg(long)]
        otel: bool,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

// ---------------------------------------------------------------------------
// Shared formatting
// ---------------------------------------------------------------------------

pub(crate) fn node_status_cell(status: NodeExecutionStatus) -> Cell {
    let color = match status {
        NodeExecutionStatus::Success => Color::Green,
        NodeExecutionStatus::Error => Color::Red,
        NodeExecutionStatus::Skipped => Color::DarkYellow,
    };
    Cell::new(status.as_str()).fg(color)
}

/// First 8 characters of an id, for table columns.
pub(crate) fn short_id(id: &uuid::Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_with_payload() {
        let cli = Cli::parse_from(["nflow", "--json", "run", "graph.json", "--payload", "{\"a\":1}"]);
        assert!(cli.json);
        match cli.command {
            Commands::Run { file, payload, workflow_id } => {
                assert_eq!(file, PathBuf::from("graph.json"));
                assert_eq!(payload.as_deref(), Some("{\"a\":1}"));
                assert!(workflow_id.is_none());
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn serve_defaults_come_from_config() {
        let cli = Cli::parse_from(["nflow", "serve", "-v"]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Serve { port, host, otel } => {
                assert!(port.is_none());
                assert!(host.is_none());
                assert!(!otel);
            }
            _ => panic!("expected serve"),
        }
    }
}
