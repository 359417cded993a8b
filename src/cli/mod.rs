//! # CLI Module
//!
//! This module defines the command-line interface for confscan using `clap`.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `scan` | Scan a manifest file or directory |
//! | `rules` | List the embedded rules |
//!
//! ## Global Options
//!
//! - `-v, --verbose` - Increase verbosity level (use multiple times: -v, -vv, -vvv)
//! - `-c, --config <FILE>` - Path to configuration file
//! - `-C, --directory <DIR>` - Working directory (defaults to current directory)
//!
//! ## Examples
//!
//! ```bash
//! # Scan the current directory with the embedded rules
//! confscan scan
//!
//! # Scan one manifest against a local policy directory, as JSON
//! confscan scan deploy/pod.yaml --policy-dir policies --format json
//!
//! # Only the Pod Security Standards baseline checks
//! confscan scan k8s/ --spec k8s-pss-baseline
//! ```

pub mod commands;
pub mod exit_codes;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::{RulesArgs, ScanArgs};

/// confscan - Scan Kubernetes manifests against security policy rules
#[derive(Parser, Debug)]
#[command(name = "confscan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Working directory (defaults to current directory)
    #[arg(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a manifest file or a directory of manifests
    Scan(ScanArgs),

    /// List the embedded rules
    Rules(RulesArgs),
}
