//! # Scan Results Structures
//!
//! This module defines the data structures for representing evaluation
//! findings.
//!
//! ## Overview
//!
//! - [`Severity`] - Rule severity levels (Low, Medium, High, Critical)
//! - [`Status`] - Outcome of one rule against one document
//! - [`ScanResult`] - A single finding with location and provenance
//! - [`ScanResults`] - Ordered collection of findings from a scan
//!
//! ## Examples
//!
//! ```rust
//! use confscan::rules::results::{Location, RuleSummary, ScanResult, ScanResults, Severity};
//!
//! let rule = RuleSummary::new("KSV017", "Privileged container", Severity::High);
//! let mut results = ScanResults::new();
//! results.push(ScanResult::failed(
//!     rule,
//!     Location::new("deploy.yaml", 1, 20),
//!     "Deployment 'web' runs a privileged container",
//! ));
//!
//! assert!(results.has_failures());
//! assert_eq!(results.count_failed_by_severity(Severity::High), 1);
//! ```

use serde::{Deserialize, Serialize};

use crate::filesystem::FsHandle;

/// Severity levels for rules.
///
/// - **Critical** - Directly exploitable misconfiguration
/// - **High** - Serious weakening of isolation (privileged, host namespaces)
/// - **Medium** - Hardening gaps (root user, privilege escalation)
/// - **Low** - Hygiene issues (mutable image tags)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn from_string(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" | "info" => Some(Self::Low),
            "medium" | "moderate" | "warning" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Outcome of evaluating one rule against one document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The document satisfies the rule
    Passed,
    /// The document violates the rule
    Failed,
    /// The rule could not be evaluated against the document
    Error,
}

/// The rule a finding refers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSummary {
    /// Short identifier (e.g., "KSV017")
    pub id: String,
    /// Descriptive identifier (e.g., "kubernetes-no-privileged-containers")
    pub long_id: String,
    pub title: String,
    pub severity: Severity,
}

impl RuleSummary {
    pub fn new(id: impl Into<String>, title: impl Into<String>, severity: Severity) -> Self {
        let id = id.into();
        Self {
            long_id: id.to_lowercase(),
            id,
            title: title.into(),
            severity,
        }
    }

    pub fn with_long_id(mut self, long_id: impl Into<String>) -> Self {
        self.long_id = long_id.into();
        self
    }
}

/// Where in the scanned tree a finding applies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Path relative to the scanned filesystem root
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
}

impl Location {
    pub fn new(path: impl Into<String>, start_line: usize, end_line: usize) -> Self {
        Self {
            path: path.into(),
            start_line,
            end_line,
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start_line == self.end_line {
            write!(f, "{}:{}", self.path, self.start_line)
        } else {
            write!(f, "{}:{}-{}", self.path, self.start_line, self.end_line)
        }
    }
}

/// A single verdict produced by evaluating one rule against one document.
///
/// The provenance fields (`source`, `filesystem`, `mixed_filesystems`) are left
/// empty by evaluation engines and filled in by the scanner once evaluation
/// returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub rule: RuleSummary,
    pub status: Status,
    /// Explanation of the verdict; empty for passed results
    pub message: String,
    pub location: Location,
    /// Suggested fix for failed results
    pub remediation: Option<String>,

    /// Label of the source that was scanned (empty for single-tree scans)
    pub source: String,

    /// Filesystem the finding was produced from
    #[serde(skip)]
    pub filesystem: Option<FsHandle>,

    /// Whether the scan that produced this finding spanned several filesystems
    pub mixed_filesystems: bool,
}

impl ScanResult {
    fn new(rule: RuleSummary, status: Status, location: Location, message: String) -> Self {
        Self {
            rule,
            status,
            message,
            location,
            remediation: None,
            source: String::new(),
            filesystem: None,
            mixed_filesystems: false,
        }
    }

    pub fn passed(rule: RuleSummary, location: Location) -> Self {
        Self::new(rule, Status::Passed, location, String::new())
    }

    pub fn failed(rule: RuleSummary, location: Location, message: impl Into<String>) -> Self {
        Self::new(rule, Status::Failed, location, message.into())
    }

    pub fn error(rule: RuleSummary, location: Location, message: impl Into<String>) -> Self {
        Self::new(rule, Status::Error, location, message.into())
    }

    /// Set the remediation
    pub fn with_remediation(mut self, remediation: Option<String>) -> Self {
        self.remediation = remediation;
        self
    }

    pub fn is_failed(&self) -> bool {
        self.status == Status::Failed
    }
}

/// Ordered collection of findings from a scan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanResults {
    results: Vec<ScanResult>,
}

impl ScanResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: ScanResult) {
        self.results.push(result);
    }

    pub fn extend(&mut self, results: impl IntoIterator<Item = ScanResult>) {
        self.results.extend(results);
    }

    pub fn results(&self) -> &[ScanResult] {
        &self.results
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScanResult> {
        self.results.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, ScanResult> {
        self.results.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Keep only findings matching `keep`
    pub fn retain(&mut self, keep: impl FnMut(&ScanResult) -> bool) {
        self.results.retain(keep);
    }

    pub fn with_status(&self, status: Status) -> impl Iterator<Item = &ScanResult> {
        self.results.iter().filter(move |r| r.status == status)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ScanResult> {
        self.with_status(Status::Failed)
    }

    pub fn count_by_status(&self, status: Status) -> usize {
        self.with_status(status).count()
    }

    pub fn count_failed_by_severity(&self, severity: Severity) -> usize {
        self.failed().filter(|r| r.rule.severity == severity).count()
    }

    pub fn has_failures(&self) -> bool {
        self.results.iter().any(ScanResult::is_failed)
    }

    /// Stamp provenance on every finding
    pub fn set_source_and_filesystem(&mut self, source: &str, fs: &FsHandle, mixed: bool) {
        for result in &mut self.results {
            result.source = source.to_string();
            result.filesystem = Some(FsHandle::clone(fs));
            result.mixed_filesystems = mixed;
        }
    }

    pub fn into_vec(self) -> Vec<ScanResult> {
        self.results
    }
}

impl FromIterator<ScanResult> for ScanResults {
    fn from_iter<I: IntoIterator<Item = ScanResult>>(iter: I) -> Self {
        Self {
            results: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ScanResults {
    type Item = ScanResult;
    type IntoIter = std::vec::IntoIter<ScanResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

impl<'a> IntoIterator for &'a ScanResults {
    type Item = &'a ScanResult;
    type IntoIter = std::slice::Iter<'a, ScanResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}
