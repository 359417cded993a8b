//! Exit codes for the CLI
//!
//! Standard exit codes used by the confscan CLI for CI/CD integration.
//!
//! # Exit Code Reference
//!
//! | Code | Constant | Meaning | Example |
//! |------|----------|---------|---------|
//! | 0 | `SUCCESS` | Success | Scan completed, no failed checks |
//! | 1 | `FAILURES` | Failed checks | A Pod runs a privileged container |
//! | 3 | `ERROR` | Runtime error | Malformed manifest, unreadable policy directory |
//! | 4 | `INVALID_ARGS` | Invalid arguments | Scan target does not exist |
//!
//! # Usage
//!
//! ```rust,ignore
//! use confscan::cli::exit_codes;
//!
//! std::process::exit(exit_codes::FAILURES);
//! ```

/// Success - the scan completed and no check failed.
pub const SUCCESS: i32 = 0;

/// At least one check failed.
///
/// Results with error status alone do not trigger this code.
pub const FAILURES: i32 = 1;

/// Runtime error (parse failure, policy load failure, cancellation, etc.).
///
/// Used when:
/// - Configuration file is unreadable or invalid
/// - A recognized manifest is malformed
/// - Policies cannot be loaded
/// - The scan was cancelled or timed out
pub const ERROR: i32 = 3;

/// Invalid arguments (missing target, policy directory outside the working directory).
pub const INVALID_ARGS: i32 = 4;
