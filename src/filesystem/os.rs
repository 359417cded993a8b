//! Filesystem backed by a directory on disk

use ignore::WalkBuilder;
use std::io;
use std::path::{Path, PathBuf};

use super::{normalize, SourceFs};

/// A directory on disk viewed as a [`SourceFs`]
#[derive(Debug, Clone)]
pub struct OsFs {
    root: PathBuf,
}

impl OsFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> io::Result<PathBuf> {
        let relative = normalize(path)?;
        if relative.is_empty() {
            Ok(self.root.clone())
        } else {
            Ok(self.root.join(relative))
        }
    }

    fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<_> = rel
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("/"))
        }
    }
}

impl SourceFs for OsFs {
    fn read_file(&self, path: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.resolve(path)?)
    }

    fn walk_files(&self, dir: &str) -> io::Result<Vec<String>> {
        let start = self.resolve(dir)?;
        let metadata = std::fs::metadata(&start)?;

        if metadata.is_file() {
            return Ok(self.relative(&start).into_iter().collect());
        }

        let walker = WalkBuilder::new(&start)
            .hidden(false)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .ignore(true)
            .parents(true)
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let Some(relative) = self.relative(entry.path()) else {
                continue;
            };
            // Skip .git directory
            if relative.split('/').any(|c| c == ".git") {
                continue;
            }
            files.push(relative);
        }

        files.sort();
        Ok(files)
    }

    fn is_dir(&self, path: &str) -> bool {
        self.resolve(path).map(|p| p.is_dir()).unwrap_or(false)
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}
