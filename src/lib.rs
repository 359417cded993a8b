//! confscan Library
//!
//! This crate scans Kubernetes manifests against declarative security rules.
//! The entry point is [`Scanner`]: build one with [`Scanner::builder`], then
//! call [`Scanner::scan_fs`] for a directory tree or [`Scanner::scan_reader`]
//! for a single stream. The evaluation engine is built on the first scan that
//! has documents to evaluate and is reused for every scan after that.

pub mod cli;
pub mod config;
pub mod context;
pub mod debug;
pub mod error;
pub mod filesystem;
pub mod parser;
pub mod rules;
pub mod scanner;

pub use context::ScanContext;
pub use error::{ConfscanError, ScanError};
pub use filesystem::{FsHandle, MemoryFs, OsFs, SourceFs};
pub use rules::{ScanResult, ScanResults, Severity, Status};
pub use scanner::{Scanner, ScannerBuilder, ScannerOptions};
