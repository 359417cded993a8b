//! Flattening parsed documents into engine inputs

use crate::filesystem::FsHandle;
use crate::parser::ParsedDocumentSet;
use crate::rules::EvaluationInput;

/// One input per (path, document), ordered by path then by position in the file
pub fn flatten(set: ParsedDocumentSet, fs: &FsHandle) -> Vec<EvaluationInput> {
    set.into_iter()
        .flat_map(|(path, documents)| {
            documents
                .into_iter()
                .map(move |doc| EvaluationInput::new(path.clone(), fs.clone(), doc))
        })
        .collect()
}
