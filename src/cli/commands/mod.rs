//! CLI commands module

pub mod rules;
pub mod scan;

use clap::Args;
use std::path::PathBuf;

/// Arguments for the scan command
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Manifest file or directory to scan
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Policy directory, relative to the working directory (repeatable)
    #[arg(long, value_name = "DIR")]
    pub policy_dir: Vec<PathBuf>,

    /// Do not load the embedded rules
    #[arg(long)]
    pub no_embedded: bool,

    /// Scan YAML/JSON files that lack apiVersion, kind or metadata
    #[arg(long)]
    pub skip_required_check: bool,

    /// Frameworks to run rules from
    #[arg(long, value_delimiter = ',')]
    pub framework: Vec<String>,

    /// Restrict rules to a compliance spec (e.g. k8s-pss-baseline)
    #[arg(long, value_name = "SPEC")]
    pub spec: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "terminal")]
    pub format: OutputFormat,

    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// List passed checks too
    #[arg(long)]
    pub include_passed: bool,

    /// Abort the scan after this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Write scanner diagnostics to this file
    #[arg(long, value_name = "FILE")]
    pub debug_log: Option<PathBuf>,
}

/// Arguments for the rules command
#[derive(Args, Debug)]
pub struct RulesArgs {
    /// Output format
    #[arg(short, long, default_value = "terminal")]
    pub format: OutputFormat,

    /// Only list rules of this compliance spec
    #[arg(long, value_name = "SPEC")]
    pub spec: Option<String>,
}

/// Output format for scan and rules commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Terminal,
    Json,
}
