//! What the evaluation engine is fed

use crate::filesystem::FsHandle;
use crate::parser::Document;

/// One parsed document together with where it came from
#[derive(Debug, Clone)]
pub struct EvaluationInput {
    /// Path of the file, relative to the scanned filesystem
    pub path: String,
    /// Filesystem the document was read from
    pub filesystem: FsHandle,
    /// The document itself
    pub contents: Document,
}

impl EvaluationInput {
    pub fn new(path: impl Into<String>, filesystem: FsHandle, contents: Document) -> Self {
        Self {
            path: path.into(),
            filesystem,
            contents,
        }
    }
}
