//! Codewright CLI, the main entry point.
//!
//! Commands:
//! - `run`          — Interactive session
//! - `run MESSAGE`  — Run a single task to completion
//! - `run --init`   — Write the default config and project directory

use clap::{Parser, Subcommand};
use std::process::ExitCode;

mod commands;
mod wiring;

#[derive(Parser)]
#[command(
    name = "codewright",
    about = "Codewright — an autonomous coding agent",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent in the current repository
    Run {
        /// Run this task and exit instead of entering interactive mode
        message: Option<String>,

        /// Write the default config and `.codewright/` directory, then exit
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Run { message, init } => commands::run::run(message, init).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("  [Error] {e}");
            ExitCode::FAILURE
        }
    }
}
