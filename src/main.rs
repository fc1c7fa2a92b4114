// Cadence — Application Entry Point
//
// Parses CLI arguments, initializes structured logging (on stderr, with a
// filter that never emits secret values), and dispatches to the command
// handler. Uses the tokio runtime for the MCP/UDS servers and model calls.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cadence::cli::{execute, Cli};

#[tokio::main]
async fn main() {
    // RUST_LOG=cadence=debug for verbose output. Logs go to stderr so they
    // never interleave with MCP traffic on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cadence=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = execute(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
