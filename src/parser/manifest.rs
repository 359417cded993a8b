//! Kubernetes manifest parser
//!
//! Recognizes `.yaml`, `.yml` and `.json` files. Unless the required-field check
//! is skipped, a file is only kept when it mentions `apiVersion`, `kind` and
//! `metadata`; everything else is omitted without error.

use globset::{Glob, GlobSet, GlobSetBuilder};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use super::{Document, DocumentParser, ParsedDocumentSet};
use crate::context::ScanContext;
use crate::debug::Logger;
use crate::error::{ConfigError, ParseError};
use crate::filesystem::FsHandle;

const YAML_EXTENSIONS: &[&str] = &[".yaml", ".yml"];
const JSON_EXTENSION: &str = ".json";

lazy_static! {
    /// Keys every Kubernetes object carries
    static ref REQUIRED_KEYS: Vec<Regex> = vec![
        Regex::new(r#"\bapiVersion["']?\s*:"#).unwrap(),
        Regex::new(r#"\bkind["']?\s*:"#).unwrap(),
        Regex::new(r#"\bmetadata["']?\s*:"#).unwrap(),
    ];
}

/// Parser for Kubernetes manifests in YAML or JSON
#[derive(Debug, Default)]
pub struct ManifestParser {
    skip_required: bool,
    skip_paths: Option<GlobSet>,
    debug: Logger,
}

impl ManifestParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep every YAML/JSON file, Kubernetes-looking or not
    pub fn with_skip_required_check(mut self, skip: bool) -> Self {
        self.skip_required = skip;
        self
    }

    /// Drop candidate paths matching any of `patterns`
    pub fn with_skip_paths(mut self, patterns: &[String]) -> Result<Self, ConfigError> {
        if patterns.is_empty() {
            self.skip_paths = None;
            return Ok(self);
        }

        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|e| ConfigError::InvalidValue {
                field: "skip_paths".to_string(),
                reason: e.to_string(),
            })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|e| ConfigError::InvalidValue {
            field: "skip_paths".to_string(),
            reason: e.to_string(),
        })?;

        self.skip_paths = Some(set);
        Ok(self)
    }

    pub fn with_debug_logger(mut self, logger: Logger) -> Self {
        self.debug = logger;
        self
    }

    fn is_candidate(path: &str) -> bool {
        let lower = path.to_ascii_lowercase();
        YAML_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) || lower.ends_with(JSON_EXTENSION)
    }

    fn is_skipped(&self, path: &str) -> bool {
        self.skip_paths
            .as_ref()
            .map(|set| set.is_match(path))
            .unwrap_or(false)
    }

    fn required(&self, content: &str) -> bool {
        self.skip_required || REQUIRED_KEYS.iter().all(|re| re.is_match(content))
    }

    /// Parse one file's text into its documents
    pub fn parse_content(&self, path: &str, content: &str) -> Result<Vec<Document>, ParseError> {
        if path.to_ascii_lowercase().ends_with(JSON_EXTENSION) {
            parse_json(path, content)
        } else {
            parse_yaml(path, content)
        }
    }
}

#[async_trait::async_trait]
impl DocumentParser for ManifestParser {
    async fn parse_fs(
        &self,
        ctx: &ScanContext,
        fs: &FsHandle,
        dir: &str,
    ) -> Result<ParsedDocumentSet, ParseError> {
        let paths = fs.walk_files(dir).map_err(|source| ParseError::Walk {
            dir: dir.to_string(),
            source,
        })?;

        let mut set = ParsedDocumentSet::new();

        for path in paths {
            ctx.check()?;

            if !Self::is_candidate(&path) {
                continue;
            }
            if self.is_skipped(&path) {
                debug!(path = %path, "Skipping path matched by skip_paths");
                continue;
            }

            let data = fs.read_file(&path).map_err(|source| ParseError::Read {
                path: path.clone(),
                source,
            })?;
            let content = match String::from_utf8(data) {
                Ok(c) => c,
                Err(_) => {
                    self.debug.log(format_args!("Skipping '{}': not valid UTF-8", path));
                    continue;
                }
            };

            if !self.required(&content) {
                self.debug.log(format_args!(
                    "Skipping '{}': not a Kubernetes manifest",
                    path
                ));
                continue;
            }

            let documents = self.parse_content(&path, &content)?;
            debug!(path = %path, documents = documents.len(), "Parsed file");
            if !documents.is_empty() {
                set.insert(path, documents);
            }
        }

        Ok(set)
    }
}

fn parse_json(path: &str, content: &str) -> Result<Vec<Document>, ParseError> {
    let value: serde_json::Value =
        serde_json::from_str(content).map_err(|e| ParseError::Malformed {
            path: path.to_string(),
            message: e.to_string(),
        })?;

    let end_line = content.lines().count().max(1);
    Ok(vec![Document::new(value).with_lines(1, end_line)])
}

/// A `---` line (optionally followed by a comment or content) separates documents
fn is_separator(line: &str) -> bool {
    let trimmed = line.trim_end();
    trimmed == "---" || trimmed.starts_with("--- ") || trimmed.starts_with("---\t")
}

fn is_blank(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

fn parse_yaml(path: &str, content: &str) -> Result<Vec<Document>, ParseError> {
    let lines: Vec<&str> = content.lines().collect();

    // (first line index, one past last line index) of each chunk
    let mut chunks = Vec::new();
    let mut start = 0;
    for (idx, line) in lines.iter().enumerate() {
        if is_separator(line) {
            chunks.push((start, idx));
            start = idx + 1;
        }
    }
    chunks.push((start, lines.len()));

    let mut documents = Vec::new();
    for (from, to) in chunks {
        let body = &lines[from..to];
        let Some(first) = body.iter().position(|l| !is_blank(l)) else {
            continue;
        };
        let last = body.iter().rposition(|l| !is_blank(l)).unwrap_or(first);

        let text = body.join("\n");
        let value: serde_json::Value =
            serde_yaml::from_str(&text).map_err(|e| ParseError::Malformed {
                path: path.to_string(),
                message: format!("document starting at line {}: {}", from + first + 1, e),
            })?;
        if value.is_null() {
            continue;
        }

        let index = documents.len();
        documents.push(
            Document::new(value)
                .with_index(index)
                .with_lines(from + first + 1, from + last + 1),
        );
    }

    Ok(documents)
}
