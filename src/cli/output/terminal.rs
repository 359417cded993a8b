//! Terminal output formatting with colors

use colored::Colorize;

use super::{ReportRenderer, ScanReport};
use crate::error::ConfscanError;
use crate::rules::{ScanResult, ScanResults, Severity, Status};

pub struct TerminalOutput;

impl TerminalOutput {
    pub fn new() -> Self {
        Self
    }

    fn format_header(&self, target: &str) -> String {
        format!(
            "\n{} v{}\n\n{} {}\n",
            "confscan".cyan().bold(),
            env!("CARGO_PKG_VERSION"),
            "Target:".dimmed(),
            target.white().bold(),
        )
    }

    fn format_results(&self, report: &ScanReport<'_>) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "\n{}\n{}\n\n",
            "━".repeat(50).dimmed(),
            "  SCAN RESULTS".bold()
        ));

        let listed: Vec<_> = report.listed().collect();
        if listed.is_empty() {
            output.push_str(&format!("  {}\n", "No misconfigurations found.".green()));
            return output;
        }

        for result in listed {
            output.push_str(&self.format_result(result));
        }

        output
    }

    fn format_result(&self, result: &ScanResult) -> String {
        let status = match result.status {
            Status::Failed => "FAIL".red().bold(),
            Status::Error => "ERROR".magenta().bold(),
            Status::Passed => "PASS".green(),
        };

        let mut output = format!(
            "  {} {} [{}] {}\n",
            status,
            self.format_severity(result.rule.severity),
            result.rule.id.cyan(),
            if result.message.is_empty() {
                &result.rule.title
            } else {
                &result.message
            }
        );
        output.push_str(&format!(
            "    {} {}\n",
            "└─".dimmed(),
            result.location.to_string().dimmed()
        ));
        if let (Status::Failed, Some(remediation)) = (result.status, &result.remediation) {
            output.push_str(&format!("       {}\n", remediation.italic()));
        }

        output
    }

    fn format_severity(&self, severity: Severity) -> colored::ColoredString {
        let label = severity.as_str().to_uppercase();
        match severity {
            Severity::Critical => label.red().bold(),
            Severity::High => label.red(),
            Severity::Medium => label.yellow(),
            Severity::Low => label.blue(),
        }
    }

    fn format_summary(&self, results: &ScanResults) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "\n{}\n{}\n\n",
            "━".repeat(50).dimmed(),
            "  SUMMARY".bold()
        ));

        output.push_str(&format!(
            "Passed: {} │ Failed: {} │ Errors: {}\n",
            results.count_by_status(Status::Passed).to_string().green().bold(),
            results.count_by_status(Status::Failed).to_string().red().bold(),
            results.count_by_status(Status::Error).to_string().magenta().bold()
        ));

        if results.has_failures() {
            output.push_str(&format!(
                "Critical: {} │ High: {} │ Medium: {} │ Low: {}\n",
                results.count_failed_by_severity(Severity::Critical),
                results.count_failed_by_severity(Severity::High),
                results.count_failed_by_severity(Severity::Medium),
                results.count_failed_by_severity(Severity::Low),
            ));
        }

        output
    }
}

impl Default for TerminalOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportRenderer for TerminalOutput {
    fn render_report(&self, report: &ScanReport<'_>) -> Result<String, ConfscanError> {
        let mut output = String::new();

        output.push_str(&self.format_header(report.target));
        output.push_str(&self.format_results(report));
        output.push_str(&self.format_summary(report.results));

        Ok(output)
    }
}
