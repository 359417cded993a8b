//! confscan - Scan Kubernetes manifests against security policy rules
//!
//! This is the main entry point for the CLI application.

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use confscan::cli::{self, exit_codes, Cli, Commands};
use confscan::config::Config;
use confscan::error::ConfscanError;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    if let Some(dir) = &cli.directory {
        if let Err(e) = std::env::set_current_dir(dir) {
            eprintln!("{} Cannot change to '{}': {}", "Error:".red().bold(), dir.display(), e);
            std::process::exit(exit_codes::INVALID_ARGS);
        }
    }

    // Handle exit codes for CI integration
    match run(cli).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(exit_codes::ERROR);
        }
    }
}

async fn run(cli: Cli) -> Result<i32, ConfscanError> {
    let config = match &cli.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::load_or_default()?,
    };

    match cli.command {
        Commands::Scan(args) => cli::commands::scan::execute(args, config).await,
        Commands::Rules(args) => cli::commands::rules::execute(args).await,
    }
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();
}
