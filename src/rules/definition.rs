//! Declarative rule definitions
//!
//! Rules are written in YAML (or JSON) and compiled once at load time:
//!
//! ```yaml
//! id: KSV017
//! long_id: kubernetes-no-privileged-containers
//! title: Privileged container
//! severity: high
//! selector:
//!   kinds: [Pod]
//! check:
//!   field: spec.containers[*].securityContext.privileged
//!   equals: true
//! message: "{kind} '{name}' runs a privileged container"
//! ```
//!
//! A rule *fails* a document when its `check` holds.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use super::results::{RuleSummary, Severity};
use crate::error::PolicyLoadError;
use crate::parser::Document;

/// Kind of source an engine evaluates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Kubernetes,
    Yaml,
    Json,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kubernetes => "kubernetes",
            Self::Yaml => "yaml",
            Self::Json => "json",
        }
    }
}

/// Compliance framework a rule belongs to
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Framework(String);

impl Framework {
    /// Framework of rules that declare none
    pub const DEFAULT: &'static str = "default";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn default_framework() -> Self {
        Self::new(Self::DEFAULT)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Framework {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Framework {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which documents a rule looks at
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Selector {
    /// Source kind the rule is written for; any when absent
    #[serde(default)]
    pub source: Option<SourceKind>,

    /// Document kinds the rule applies to; all when empty
    #[serde(default)]
    pub kinds: Vec<String>,
}

/// A rule as written in a policy file
#[derive(Debug, Clone, Deserialize)]
pub struct RuleSpec {
    pub id: String,
    #[serde(default)]
    pub long_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_severity")]
    pub severity: Severity,
    /// Framework name → control identifiers within that framework
    #[serde(default)]
    pub frameworks: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub selector: Selector,
    pub check: Condition,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub remediation: Option<String>,
}

fn default_severity() -> Severity {
    Severity::Medium
}

/// Condition tree as written in a policy file
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    All { all: Vec<Condition> },
    Any { any: Vec<Condition> },
    Not { not: Box<Condition> },
    Field(FieldCheck),
}

/// `{ field: <path>, <operator>: <operand> }`
#[derive(Debug, Clone, Deserialize)]
pub struct FieldCheck {
    pub field: String,
    #[serde(flatten)]
    pub operator: Operator,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals(Value),
    NotEquals(Value),
    Exists(bool),
    In(Vec<Value>),
    Matches(String),
    GreaterThan(f64),
    LessThan(f64),
}

/// One step of a field path
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
    Wildcard,
}

/// Parsed field path such as `spec.containers[*].image`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    raw: String,
    segments: Vec<Segment>,
}

impl FieldPath {
    pub fn parse(raw: &str) -> Result<Self, String> {
        if raw.trim().is_empty() {
            return Err("empty field path".to_string());
        }

        let mut segments = Vec::new();
        for part in raw.split('.') {
            let (name, mut rest) = match part.find('[') {
                Some(idx) => part.split_at(idx),
                None => (part, ""),
            };
            if name.is_empty() && rest.is_empty() {
                return Err(format!("empty segment in '{}'", raw));
            }
            if !name.is_empty() {
                segments.push(Segment::Key(name.to_string()));
            }

            while !rest.is_empty() {
                let close = rest
                    .find(']')
                    .ok_or_else(|| format!("unclosed '[' in '{}'", raw))?;
                let inner = &rest[1..close];
                let segment = if inner == "*" {
                    Segment::Wildcard
                } else {
                    let index = inner
                        .parse()
                        .map_err(|_| format!("invalid index '[{}]' in '{}'", inner, raw))?;
                    Segment::Index(index)
                };
                segments.push(segment);

                rest = &rest[close + 1..];
                if !rest.is_empty() && !rest.starts_with('[') {
                    return Err(format!("unexpected '{}' in '{}'", rest, raw));
                }
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Every value the path reaches.
    ///
    /// A missing key yields `None`. A wildcard over a missing or non-array
    /// value yields no branch at all, so checks over an absent list never hold.
    pub fn resolve<'a>(&self, root: &'a Value) -> Vec<Option<&'a Value>> {
        let mut current = vec![Some(root)];

        for segment in &self.segments {
            let mut next = Vec::with_capacity(current.len());
            for value in current {
                match (segment, value) {
                    (_, None) => next.push(None),
                    (Segment::Key(key), Some(v)) => next.push(v.get(key.as_str())),
                    (Segment::Index(idx), Some(v)) => next.push(v.get(*idx)),
                    (Segment::Wildcard, Some(Value::Array(items))) => {
                        next.extend(items.iter().map(Some))
                    }
                    (Segment::Wildcard, Some(_)) => {}
                }
            }
            current = next;
        }

        current
    }
}

/// Compiled operator
#[derive(Debug, Clone)]
pub enum Op {
    Equals(Value),
    NotEquals(Value),
    Exists(bool),
    In(Vec<Value>),
    Matches(Regex),
    GreaterThan(f64),
    LessThan(f64),
}

impl Op {
    fn compile(operator: Operator) -> Result<Self, String> {
        Ok(match operator {
            Operator::Equals(v) => Op::Equals(v),
            Operator::NotEquals(v) => Op::NotEquals(v),
            Operator::Exists(b) => Op::Exists(b),
            Operator::In(values) => Op::In(values),
            Operator::Matches(pattern) => Op::Matches(
                Regex::new(&pattern).map_err(|e| format!("invalid pattern '{}': {}", pattern, e))?,
            ),
            Operator::GreaterThan(n) => Op::GreaterThan(n),
            Operator::LessThan(n) => Op::LessThan(n),
        })
    }

    /// Verdict for one reached value; `Err` on a type mismatch
    fn test(&self, field: &str, value: Option<&Value>) -> Result<bool, String> {
        match self {
            Op::Equals(expected) => Ok(value == Some(expected)),
            Op::NotEquals(expected) => Ok(value != Some(expected)),
            Op::Exists(expected) => Ok(value.is_some() == *expected),
            Op::In(values) => Ok(value.map(|v| values.contains(v)).unwrap_or(false)),
            Op::Matches(re) => match value {
                None | Some(Value::Null) => Ok(false),
                Some(Value::String(s)) => Ok(re.is_match(s)),
                Some(other) => Err(format!(
                    "'{}' is {}, expected a string",
                    field,
                    type_name(other)
                )),
            },
            Op::GreaterThan(limit) => compare(field, value).map(|n| n.is_some_and(|n| n > *limit)),
            Op::LessThan(limit) => compare(field, value).map(|n| n.is_some_and(|n| n < *limit)),
        }
    }
}

fn compare(field: &str, value: Option<&Value>) -> Result<Option<f64>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(other) => Err(format!(
            "'{}' is {}, expected a number",
            field,
            type_name(other)
        )),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Compiled condition tree
#[derive(Debug, Clone)]
pub enum Check {
    All(Vec<Check>),
    Any(Vec<Check>),
    Not(Box<Check>),
    Field { path: FieldPath, op: Op },
}

impl Check {
    fn compile(condition: Condition) -> Result<Self, String> {
        Ok(match condition {
            Condition::All { all } => {
                Check::All(all.into_iter().map(Check::compile).collect::<Result<_, _>>()?)
            }
            Condition::Any { any } => {
                Check::Any(any.into_iter().map(Check::compile).collect::<Result<_, _>>()?)
            }
            Condition::Not { not } => Check::Not(Box::new(Check::compile(*not)?)),
            Condition::Field(FieldCheck { field, operator }) => Check::Field {
                path: FieldPath::parse(&field)?,
                op: Op::compile(operator)?,
            },
        })
    }

    /// Whether the condition holds for `doc`.
    ///
    /// `Err` carries a type mismatch that kept the condition from being decided.
    pub fn evaluate(&self, doc: &Value) -> Result<bool, String> {
        match self {
            Check::All(checks) => {
                let mut error = None;
                for check in checks {
                    match check.evaluate(doc) {
                        Ok(false) => return Ok(false),
                        Ok(true) => {}
                        Err(e) => error = error.or(Some(e)),
                    }
                }
                error.map_or(Ok(true), Err)
            }
            Check::Any(checks) => {
                let mut error = None;
                for check in checks {
                    match check.evaluate(doc) {
                        Ok(true) => return Ok(true),
                        Ok(false) => {}
                        Err(e) => error = error.or(Some(e)),
                    }
                }
                error.map_or(Ok(false), Err)
            }
            Check::Not(check) => check.evaluate(doc).map(|holds| !holds),
            Check::Field { path, op } => {
                let mut error = None;
                for value in path.resolve(doc) {
                    match op.test(path.as_str(), value) {
                        Ok(true) => return Ok(true),
                        Ok(false) => {}
                        Err(e) => error = error.or(Some(e)),
                    }
                }
                error.map_or(Ok(false), Err)
            }
        }
    }
}

/// A compiled, ready-to-evaluate rule
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub long_id: String,
    pub title: String,
    pub description: Option<String>,
    pub severity: Severity,
    pub frameworks: BTreeMap<String, Vec<String>>,
    pub selector: Selector,
    pub check: Check,
    pub message: Option<String>,
    pub remediation: Option<String>,
}

impl Rule {
    /// Compile a rule read from `origin`
    pub fn compile(spec: RuleSpec, origin: &str) -> Result<Self, PolicyLoadError> {
        let id = spec.id.trim().to_string();
        if id.is_empty() {
            return Err(PolicyLoadError::InvalidRule {
                rule_id: String::new(),
                origin: origin.to_string(),
                reason: "rule id is empty".to_string(),
            });
        }

        let check = Check::compile(spec.check).map_err(|reason| PolicyLoadError::InvalidRule {
            rule_id: id.clone(),
            origin: origin.to_string(),
            reason,
        })?;

        Ok(Self {
            long_id: spec.long_id.unwrap_or_else(|| id.to_lowercase()),
            id,
            title: spec.title,
            description: spec.description,
            severity: spec.severity,
            frameworks: spec.frameworks,
            selector: spec.selector,
            check,
            message: spec.message,
            remediation: spec.remediation,
        })
    }

    pub fn summary(&self) -> RuleSummary {
        RuleSummary::new(&self.id, &self.title, self.severity).with_long_id(&self.long_id)
    }

    /// Whether the rule is written for `source`
    pub fn supports(&self, source: SourceKind) -> bool {
        self.selector.source.map_or(true, |s| s == source)
    }

    /// Whether the rule belongs to one of `selected` (the default framework when empty)
    pub fn in_frameworks(&self, selected: &[Framework]) -> bool {
        let wanted = |name: &str| {
            if selected.is_empty() {
                name == Framework::DEFAULT
            } else {
                selected.iter().any(|f| f.as_str() == name)
            }
        };

        if self.frameworks.is_empty() {
            return wanted(Framework::DEFAULT);
        }
        self.frameworks.keys().any(|name| wanted(name))
    }

    /// Whether the rule looks at `doc` at all
    pub fn applies_to(&self, doc: &Document) -> bool {
        if self.selector.kinds.is_empty() {
            return true;
        }
        match doc.kind() {
            Some(kind) => self.selector.kinds.iter().any(|k| k == kind),
            None => false,
        }
    }

    /// Failure message for `doc`, with `{kind}` and `{name}` filled in
    pub fn render_message(&self, doc: &Document) -> String {
        match &self.message {
            Some(template) => template
                .replace("{kind}", doc.kind().unwrap_or("Document"))
                .replace("{name}", doc.name().unwrap_or("unnamed")),
            None => self.title.clone(),
        }
    }
}
