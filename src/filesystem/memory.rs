//! In-memory filesystem used to scan a single stream

use std::collections::{BTreeMap, BTreeSet};
use std::io;

use super::{normalize, parent, SourceFs};

/// Mutable while being populated, then shared read-only behind an `FsHandle`
#[derive(Debug, Default)]
pub struct MemoryFs {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `path` and every missing ancestor
    pub fn mkdir_all(&mut self, path: &str) -> io::Result<()> {
        let path = normalize(path)?;
        if path.is_empty() {
            return Ok(());
        }

        let mut current = String::new();
        for part in path.split('/') {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(part);

            if self.files.contains_key(&current) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("'{}' exists and is not a directory", current),
                ));
            }
            self.dirs.insert(current.clone());
        }

        Ok(())
    }

    /// Create or replace a file; its parent directory must already exist
    pub fn write_file(&mut self, path: &str, data: impl Into<Vec<u8>>) -> io::Result<()> {
        let path = normalize(path)?;
        if path.is_empty() || self.dirs.contains(&path) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot write file at '{}'", path),
            ));
        }

        let dir = parent(&path);
        if !self.is_dir(dir) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("directory '{}' does not exist", dir),
            ));
        }

        self.files.insert(path, data.into());
        Ok(())
    }

    /// Number of files held
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl SourceFs for MemoryFs {
    fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
        let path = normalize(path)?;
        self.files.get(&path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("file '{}' not found", path))
        })
    }

    fn walk_files(&self, dir: &str) -> io::Result<Vec<String>> {
        let dir = normalize(dir)?;

        if self.files.contains_key(&dir) {
            return Ok(vec![dir]);
        }
        if dir.is_empty() {
            return Ok(self.files.keys().cloned().collect());
        }
        if !self.dirs.contains(&dir) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("directory '{}' not found", dir),
            ));
        }

        let prefix = format!("{}/", dir);
        Ok(self
            .files
            .keys()
            .filter(|p| p.starts_with(&prefix))
            .cloned()
            .collect())
    }

    fn is_dir(&self, path: &str) -> bool {
        match normalize(path) {
            Ok(p) => p.is_empty() || self.dirs.contains(&p),
            Err(_) => false,
        }
    }

    fn describe(&self) -> String {
        format!("memory ({} files)", self.files.len())
    }
}
