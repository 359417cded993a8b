//! Filesystem abstraction scanned by the parser and searched for policy files
//!
//! Paths handed to a [`SourceFs`] are relative to its root, use `/` as the
//! separator, and never contain `..`. The root itself is `.` or the empty string.

mod memory;
mod os;

use std::fmt;
use std::io;
use std::sync::Arc;

pub use memory::MemoryFs;
pub use os::OsFs;

/// Read-only view of a tree of files
pub trait SourceFs: fmt::Debug + Send + Sync {
    /// Read a whole file
    fn read_file(&self, path: &str) -> io::Result<Vec<u8>>;

    /// All regular files under `dir`, sorted, relative to the filesystem root.
    ///
    /// A `dir` that names a file yields just that file. A missing `dir` is
    /// `NotFound`.
    fn walk_files(&self, dir: &str) -> io::Result<Vec<String>>;

    /// Whether `path` is an existing directory
    fn is_dir(&self, path: &str) -> bool;

    /// Short human-readable description, used in logs and reports
    fn describe(&self) -> String;
}

/// Shared handle to a filesystem; clones refer to the same tree
pub type FsHandle = Arc<dyn SourceFs>;

/// Whether two handles refer to the same filesystem instance
pub fn same_fs(a: &FsHandle, b: &FsHandle) -> bool {
    Arc::ptr_eq(a, b)
}

/// Clean a relative path into its canonical form.
///
/// `./a//b/.` becomes `a/b`; the root becomes the empty string.
pub fn normalize(path: &str) -> io::Result<String> {
    if path.starts_with('/') || path.contains('\0') {
        return Err(invalid_path(path));
    }

    let mut parts = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => continue,
            ".." => return Err(invalid_path(path)),
            p => parts.push(p),
        }
    }

    Ok(parts.join("/"))
}

fn invalid_path(path: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("invalid path '{}'", path),
    )
}

/// Parent directory of a normalized path; the root's children have parent `""`
pub(crate) fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}
