//! Document parsing - turning a filesystem subtree into structured documents

mod manifest;

pub use manifest::ManifestParser;

use serde::Serialize;
use std::collections::BTreeMap;

use crate::context::ScanContext;
use crate::error::ParseError;
use crate::filesystem::FsHandle;

/// One structured configuration object extracted from a source file.
///
/// A multi-document YAML file yields one `Document` per non-empty document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    /// Parsed content
    pub content: serde_json::Value,
    /// Position among the documents of its file, starting at 0
    pub index: usize,
    /// First line of the document in its file (1-based)
    pub start_line: usize,
    /// Last line of the document in its file (1-based, inclusive)
    pub end_line: usize,
}

impl Document {
    pub fn new(content: serde_json::Value) -> Self {
        Self {
            content,
            index: 0,
            start_line: 1,
            end_line: 1,
        }
    }

    /// Set the line range
    pub fn with_lines(mut self, start_line: usize, end_line: usize) -> Self {
        self.start_line = start_line;
        self.end_line = end_line;
        self
    }

    /// Set the index within the file
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// The `kind` field, if any
    pub fn kind(&self) -> Option<&str> {
        self.content.get("kind").and_then(|k| k.as_str())
    }

    /// The `metadata.name` field, if any
    pub fn name(&self) -> Option<&str> {
        self.content
            .get("metadata")
            .and_then(|m| m.get("name"))
            .and_then(|n| n.as_str())
    }
}

/// Source path → documents found at that path, in file order.
///
/// Ordered by path so that anything derived from it is deterministic.
pub type ParsedDocumentSet = BTreeMap<String, Vec<Document>>;

/// Total number of documents across all paths
pub fn document_count(set: &ParsedDocumentSet) -> usize {
    set.values().map(Vec::len).sum()
}

/// Turns a filesystem subtree into a [`ParsedDocumentSet`].
///
/// Implementations must omit files they do not recognize instead of failing,
/// and return an empty set when nothing under `dir` is recognizable.
#[async_trait::async_trait]
pub trait DocumentParser: Send + Sync {
    async fn parse_fs(
        &self,
        ctx: &ScanContext,
        fs: &FsHandle,
        dir: &str,
    ) -> Result<ParsedDocumentSet, ParseError>;
}
