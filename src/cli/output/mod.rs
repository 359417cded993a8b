//! Output formatting module for CLI

pub mod json;
mod terminal;

pub use json::JsonOutput;
pub use terminal::TerminalOutput;

use crate::error::ConfscanError;
use crate::rules::{ScanResult, ScanResults, Status};

/// A finished scan as handed to a renderer
#[derive(Debug, Clone, Copy)]
pub struct ScanReport<'a> {
    /// What was scanned, as given on the command line
    pub target: &'a str,
    pub results: &'a ScanResults,
    /// List passed results as well as failures and errors
    pub include_passed: bool,
}

impl<'a> ScanReport<'a> {
    pub fn new(target: &'a str, results: &'a ScanResults, include_passed: bool) -> Self {
        Self {
            target,
            results,
            include_passed,
        }
    }

    /// Results to list, in scan order
    pub fn listed(&self) -> impl Iterator<Item = &'a ScanResult> {
        let include_passed = self.include_passed;
        self.results
            .iter()
            .filter(move |r| include_passed || r.status != Status::Passed)
    }
}

/// Trait for rendering report output
pub trait ReportRenderer {
    fn render_report(&self, report: &ScanReport<'_>) -> Result<String, ConfscanError>;
}
