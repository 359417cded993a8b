//! JSON output formatting

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{ReportRenderer, ScanReport};
use crate::error::ConfscanError;
use crate::rules::{ScanResult, Severity, Status};

pub struct JsonOutput;

impl JsonOutput {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonOutput {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct ReportOutput<'a> {
    version: &'static str,
    generated_at: DateTime<Utc>,
    target: &'a str,
    summary: Summary,
    results: Vec<&'a ScanResult>,
}

#[derive(Serialize)]
struct Summary {
    passed: usize,
    failed: usize,
    errors: usize,
    critical: usize,
    high: usize,
    medium: usize,
    low: usize,
}

impl ReportRenderer for JsonOutput {
    fn render_report(&self, report: &ScanReport<'_>) -> Result<String, ConfscanError> {
        let results = report.results;
        let output = ReportOutput {
            version: env!("CARGO_PKG_VERSION"),
            generated_at: Utc::now(),
            target: report.target,
            summary: Summary {
                passed: results.count_by_status(Status::Passed),
                failed: results.count_by_status(Status::Failed),
                errors: results.count_by_status(Status::Error),
                critical: results.count_failed_by_severity(Severity::Critical),
                high: results.count_failed_by_severity(Severity::High),
                medium: results.count_failed_by_severity(Severity::Medium),
                low: results.count_failed_by_severity(Severity::Low),
            },
            results: report.listed().collect(),
        };

        Ok(serde_json::to_string_pretty(&output)?)
    }
}
