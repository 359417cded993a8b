//! Rules command - List the embedded rules

use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;

use super::{OutputFormat, RulesArgs};
use crate::cli::exit_codes;
use crate::error::{ConfscanError, PolicyLoadError, ScanError};
use crate::rules::{embedded, Rule, Severity};

#[derive(Serialize)]
struct RuleListing<'a> {
    id: &'a str,
    long_id: &'a str,
    title: &'a str,
    severity: Severity,
    frameworks: &'a BTreeMap<String, Vec<String>>,
}

pub async fn execute(args: RulesArgs) -> Result<i32, ConfscanError> {
    let mut rules = embedded::rules().map_err(ScanError::from)?;

    if let Some(spec_id) = &args.spec {
        let spec = match embedded::find_spec(spec_id) {
            Ok(spec) => spec,
            Err(PolicyLoadError::UnknownSpec(id)) => {
                eprintln!("{} Unknown compliance spec '{}'", "Error:".red().bold(), id);
                return Ok(exit_codes::INVALID_ARGS);
            }
            Err(e) => return Err(ScanError::from(e).into()),
        };
        rules.retain(|r| spec.includes(&r.id));
    }

    let output = match args.format {
        OutputFormat::Json => render_json(&rules)?,
        OutputFormat::Terminal => render_terminal(&rules),
    };
    println!("{}", output);

    Ok(exit_codes::SUCCESS)
}

fn render_json(rules: &[Rule]) -> Result<String, ConfscanError> {
    let listing: Vec<_> = rules
        .iter()
        .map(|r| RuleListing {
            id: &r.id,
            long_id: &r.long_id,
            title: &r.title,
            severity: r.severity,
            frameworks: &r.frameworks,
        })
        .collect();
    Ok(serde_json::to_string_pretty(&listing)?)
}

fn render_terminal(rules: &[Rule]) -> String {
    let mut output = String::new();
    for rule in rules {
        output.push_str(&format!(
            "{:<8} {:<9} {}\n",
            rule.id.cyan(),
            rule.severity.as_str().to_uppercase(),
            rule.title
        ));
        output.push_str(&format!("         {}\n", rule.long_id.dimmed()));
    }
    output.push_str(&format!("\n{} rules\n", rules.len()));
    output
}
