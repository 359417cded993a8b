//! Rules and compliance specs compiled into the binary

use serde::Deserialize;

use super::definition::Rule;
use super::loader::parse_rules;
use crate::error::PolicyLoadError;

/// Embedded Kubernetes rule sources, as (origin, content)
const KUBERNETES_RULES: &[(&str, &str)] = &[
    (
        "embedded/kubernetes/ksv001.yaml",
        include_str!("../../policies/kubernetes/ksv001.yaml"),
    ),
    (
        "embedded/kubernetes/ksv009.yaml",
        include_str!("../../policies/kubernetes/ksv009.yaml"),
    ),
    (
        "embedded/kubernetes/ksv010.yaml",
        include_str!("../../policies/kubernetes/ksv010.yaml"),
    ),
    (
        "embedded/kubernetes/ksv012.yaml",
        include_str!("../../policies/kubernetes/ksv012.yaml"),
    ),
    (
        "embedded/kubernetes/ksv013.yaml",
        include_str!("../../policies/kubernetes/ksv013.yaml"),
    ),
    (
        "embedded/kubernetes/ksv017.yaml",
        include_str!("../../policies/kubernetes/ksv017.yaml"),
    ),
];

const SPECS: &[(&str, &str)] = &[(
    "embedded/specs/k8s-pss-baseline.yaml",
    include_str!("../../policies/specs/k8s-pss-baseline.yaml"),
)];

/// A named set of rule ids a scan can be restricted to
#[derive(Debug, Clone, Deserialize)]
pub struct ComplianceSpec {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub checks: Vec<String>,
}

impl ComplianceSpec {
    pub fn includes(&self, rule_id: &str) -> bool {
        self.checks.iter().any(|c| c == rule_id)
    }
}

/// Every embedded rule
pub fn rules() -> Result<Vec<Rule>, PolicyLoadError> {
    let mut rules = Vec::new();
    for (origin, content) in KUBERNETES_RULES {
        rules.extend(parse_rules(origin, content)?);
    }
    Ok(rules)
}

/// Every embedded compliance spec
pub fn specs() -> Result<Vec<ComplianceSpec>, PolicyLoadError> {
    SPECS
        .iter()
        .map(|(origin, content)| {
            serde_yaml::from_str(content).map_err(|e| PolicyLoadError::Malformed {
                origin: origin.to_string(),
                message: e.to_string(),
            })
        })
        .collect()
}

/// Look up an embedded compliance spec by id
pub fn find_spec(id: &str) -> Result<ComplianceSpec, PolicyLoadError> {
    specs()?
        .into_iter()
        .find(|spec| spec.id == id)
        .ok_or_else(|| PolicyLoadError::UnknownSpec(id.to_string()))
}
