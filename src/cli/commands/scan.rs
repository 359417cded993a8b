//! Scan command - Scan a manifest file or directory

use colored::Colorize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{OutputFormat, ScanArgs};
use crate::cli::exit_codes;
use crate::cli::output::{JsonOutput, ReportRenderer, ScanReport, TerminalOutput};
use crate::config::Config;
use crate::context::ScanContext;
use crate::debug::Logger;
use crate::error::{ConfscanError, OutputError, ScanError};
use crate::filesystem::{self, FsHandle, OsFs};
use crate::parser::ManifestParser;
use crate::scanner::Scanner;

pub async fn execute(args: ScanArgs, config: Config) -> Result<i32, ConfscanError> {
    let cwd = std::env::current_dir().map_err(ScanError::from)?;

    if !args.path.exists() {
        eprintln!(
            "{} Scan target '{}' does not exist",
            "Error:".red().bold(),
            args.path.display()
        );
        return Ok(exit_codes::INVALID_ARGS);
    }

    let mut policy_dirs = Vec::new();
    for dir in config.policy_dirs.iter().map(PathBuf::from).chain(args.policy_dir.iter().cloned()) {
        match policy_dir_relative_to(&cwd, &dir) {
            Some(relative) => policy_dirs.push(relative),
            None => {
                eprintln!(
                    "{} Policy directory '{}' must be inside the working directory",
                    "Error:".red().bold(),
                    dir.display()
                );
                return Ok(exit_codes::INVALID_ARGS);
            }
        }
    }

    let skip_required_check = args.skip_required_check || config.skip_required_check;
    let frameworks = if args.framework.is_empty() {
        config.frameworks.clone()
    } else {
        args.framework.clone()
    };

    let mut parser = ManifestParser::new()
        .with_skip_required_check(skip_required_check)
        .with_skip_paths(&config.skip_paths)?;

    let mut builder = Scanner::builder()
        .policy_dirs(policy_dirs)
        .embedded_policies(config.embedded_policies && !args.no_embedded)
        .skip_required_check(skip_required_check)
        .frameworks(frameworks)
        .policy_filesystem(Arc::new(OsFs::new(&cwd)));
    if let Some(spec) = args.spec.clone().or_else(|| config.spec.clone()) {
        builder = builder.spec(spec);
    }
    if let Some(path) = &args.debug_log {
        let file = File::create(path).map_err(|source| OutputError::FileWrite {
            path: path.display().to_string(),
            source,
        })?;
        let parser_sink = file.try_clone().map_err(ScanError::from)?;
        parser = parser.with_debug_logger(Logger::new(
            Box::new(parser_sink),
            &["kubernetes", "scanner", "parser"],
        ));
        builder = builder.debug_writer(file);
    }
    let scanner = builder.parser(Arc::new(parser)).build();

    let ctx = match args.timeout {
        Some(secs) => ScanContext::with_timeout(Duration::from_secs(secs)),
        None => ScanContext::new(),
    };
    let interrupt = {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling scan");
                ctx.cancel();
            }
        })
    };

    let target = args.path.display().to_string();
    let outcome = if args.path.is_file() {
        let name = stream_name(&args.path);
        debug!(path = %target, name = %name, "Scanning single file");
        let file = File::open(&args.path).map_err(ScanError::from)?;
        scanner.scan_reader(&ctx, &name, file).await
    } else {
        let fs: FsHandle = Arc::new(OsFs::new(&args.path));
        scanner.scan_fs(&ctx, &fs, ".").await
    };
    interrupt.abort();

    let mut results = outcome?;
    config.apply_overrides(&mut results);

    let renderer: Box<dyn ReportRenderer> = match args.format {
        OutputFormat::Terminal => Box::new(TerminalOutput::new()),
        OutputFormat::Json => Box::new(JsonOutput::new()),
    };
    let rendered = renderer.render_report(&ScanReport::new(&target, &results, args.include_passed))?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, &rendered).map_err(|source| OutputError::FileWrite {
                path: path.display().to_string(),
                source,
            })?;
            eprintln!(
                "{} Report written to: {}",
                "Success:".green().bold(),
                path.display().to_string().cyan()
            );
        }
        None => println!("{}", rendered),
    }

    Ok(if results.has_failures() {
        exit_codes::FAILURES
    } else {
        exit_codes::SUCCESS
    })
}

/// Policy directories are read through a filesystem rooted at the working
/// directory, so they must resolve inside it
fn policy_dir_relative_to(cwd: &Path, dir: &Path) -> Option<String> {
    let relative = if dir.is_absolute() {
        dir.strip_prefix(cwd).ok()?
    } else {
        dir
    };
    let relative = relative.to_str()?.replace('\\', "/");
    let normalized = filesystem::normalize(&relative).ok()?;
    Some(if normalized.is_empty() {
        ".".to_string()
    } else {
        normalized
    })
}

/// Name a single scanned file keeps in results
fn stream_name(path: &Path) -> String {
    let as_given = path.to_string_lossy().replace('\\', "/");
    match filesystem::normalize(&as_given) {
        Ok(name) if !name.is_empty() => name,
        _ => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input.yaml".to_string()),
    }
}
