//! Configuration loader

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::rules::{ScanResults, Severity};

use super::{default_true, RuleConfig};

pub const CONFIG_FILENAME: &str = ".confscan.toml";

/// Contents of `.confscan.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Policy directories, relative to the working directory
    #[serde(default)]
    pub policy_dirs: Vec<String>,

    /// Load the embedded rules
    #[serde(default = "default_true")]
    pub embedded_policies: bool,

    /// Keep files that lack `apiVersion`, `kind` or `metadata`
    #[serde(default)]
    pub skip_required_check: bool,

    /// Frameworks to run rules from
    #[serde(default)]
    pub frameworks: Vec<String>,

    /// Compliance spec restricting the active rules
    #[serde(default)]
    pub spec: Option<String>,

    /// Globs of scanned paths to ignore
    #[serde(default)]
    pub skip_paths: Vec<String>,

    /// Rule overrides, keyed by rule id
    #[serde(default)]
    pub rules: BTreeMap<String, RuleConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            policy_dirs: Vec::new(),
            embedded_policies: true,
            skip_required_check: false,
            frameworks: Vec::new(),
            spec: None,
            skip_paths: Vec::new(),
            rules: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load `.confscan.toml` from the working directory or return default
    pub fn load_or_default() -> Result<Self, ConfigError> {
        let config_path = Path::new(CONFIG_FILENAME);

        if config_path.exists() {
            Self::load_from_file(config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject severity overrides that name no severity
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (id, rule) in &self.rules {
            if let Some(severity) = &rule.severity {
                if Severity::from_string(severity).is_none() {
                    return Err(ConfigError::InvalidValue {
                        field: format!("rules.{}.severity", id),
                        reason: format!("unknown severity '{}'", severity),
                    });
                }
            }
        }
        Ok(())
    }

    /// Check if a rule is enabled
    pub fn is_rule_enabled(&self, rule_id: &str) -> bool {
        self.rules.get(rule_id).map(|r| r.enabled).unwrap_or(true)
    }

    /// Get severity override for a rule
    pub fn get_rule_severity(&self, rule_id: &str) -> Option<Severity> {
        self.rules
            .get(rule_id)
            .and_then(|r| r.severity.as_deref())
            .and_then(Severity::from_string)
    }

    /// Drop results of disabled rules and apply severity overrides
    pub fn apply_overrides(&self, results: &mut ScanResults) {
        results.retain(|r| self.is_rule_enabled(&r.rule.id));
        for result in results.iter_mut() {
            if let Some(severity) = self.get_rule_severity(&result.rule.id) {
                result.rule.severity = severity;
            }
        }
    }
}
