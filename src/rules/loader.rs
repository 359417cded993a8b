//! Reading rule definitions from files and streams
//!
//! A policy source holds one or more YAML documents. Each document is either a
//! single rule or a `rules:` list of rules. JSON sources are accepted too since
//! JSON is valid YAML.

use serde::Deserialize;
use std::fmt;
use std::io::Read;

use super::definition::{Rule, RuleSpec};
use crate::error::PolicyLoadError;
use crate::filesystem::FsHandle;

const POLICY_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// A named policy stream supplied by the caller.
///
/// The stream is drained into memory the first time it is needed, so a
/// retried engine load sees the same bytes.
pub struct PolicyStream {
    name: String,
    reader: Option<Box<dyn Read + Send>>,
    buffered: Option<Vec<u8>>,
}

impl PolicyStream {
    pub fn new(name: impl Into<String>, reader: Box<dyn Read + Send>) -> Self {
        Self {
            name: name.into(),
            reader: Some(reader),
            buffered: None,
        }
    }

    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            reader: None,
            buffered: Some(bytes.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full content of the stream
    pub fn bytes(&mut self) -> std::io::Result<&[u8]> {
        if self.buffered.is_none() {
            let mut buf = Vec::new();
            if let Some(mut reader) = self.reader.take() {
                reader.read_to_end(&mut buf)?;
            }
            self.buffered = Some(buf);
        }
        Ok(self.buffered.as_deref().unwrap_or_default())
    }
}

impl fmt::Debug for PolicyStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyStream")
            .field("name", &self.name)
            .field("buffered", &self.buffered.as_ref().map(Vec::len))
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PolicyDocument {
    Bundle { rules: Vec<RuleSpec> },
    Single(Box<RuleSpec>),
}

/// Parse and compile every rule in `content`
pub fn parse_rules(origin: &str, content: &str) -> Result<Vec<Rule>, PolicyLoadError> {
    let mut rules = Vec::new();

    for document in serde_yaml::Deserializer::from_str(content) {
        let value =
            serde_yaml::Value::deserialize(document).map_err(|e| PolicyLoadError::Malformed {
                origin: origin.to_string(),
                message: e.to_string(),
            })?;
        if value.is_null() {
            continue;
        }

        let parsed: PolicyDocument =
            serde_yaml::from_value(value).map_err(|e| PolicyLoadError::Malformed {
                origin: origin.to_string(),
                message: e.to_string(),
            })?;

        match parsed {
            PolicyDocument::Bundle { rules: specs } => {
                for spec in specs {
                    rules.push(Rule::compile(spec, origin)?);
                }
            }
            PolicyDocument::Single(spec) => rules.push(Rule::compile(*spec, origin)?),
        }
    }

    Ok(rules)
}

/// Rules from every policy file under `dir` on `fs`
pub fn load_dir(fs: &FsHandle, dir: &str) -> Result<Vec<Rule>, PolicyLoadError> {
    let files = fs
        .walk_files(dir)
        .map_err(|source| PolicyLoadError::Directory {
            path: dir.to_string(),
            source,
        })?;

    let mut rules = Vec::new();
    for path in files.iter().filter(|p| is_policy_file(p)) {
        let bytes = fs.read_file(path).map_err(|source| PolicyLoadError::Read {
            origin: path.clone(),
            source,
        })?;
        let content = String::from_utf8_lossy(&bytes);
        rules.extend(parse_rules(path, &content)?);
    }

    Ok(rules)
}

/// Rules from a caller-supplied stream
pub fn load_stream(stream: &mut PolicyStream) -> Result<Vec<Rule>, PolicyLoadError> {
    let origin = stream.name().to_string();
    let bytes = stream.bytes().map_err(|source| PolicyLoadError::Read {
        origin: origin.clone(),
        source,
    })?;
    let content = String::from_utf8_lossy(bytes).into_owned();
    parse_rules(&origin, &content)
}

fn is_policy_file(path: &str) -> bool {
    path.rsplit_once('.')
        .map(|(_, ext)| POLICY_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
