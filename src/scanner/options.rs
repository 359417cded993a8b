//! Scanner configuration
//!
//! Everything a [`Scanner`] needs is fixed up front through [`ScannerBuilder`].
//! There are no setters on a built scanner.

use std::io::{Read, Write};
use std::sync::Arc;

use super::Scanner;
use crate::filesystem::FsHandle;
use crate::parser::DocumentParser;
use crate::rules::{EngineFactory, Framework, PolicyStream};

/// Immutable settings of a built [`Scanner`]
#[derive(Debug, Clone, Default)]
pub struct ScannerOptions {
    /// Policy directories, in load order
    pub policy_dirs: Vec<String>,
    /// Whether the embedded rules are loaded before anything else
    pub load_embedded: bool,
    /// Keep files that lack `apiVersion`, `kind` or `metadata`
    pub skip_required_check: bool,
    /// Frameworks to run rules from; the default framework when empty
    pub frameworks: Vec<Framework>,
    /// Compliance spec restricting the active rules
    pub spec: Option<String>,
}

/// Builder for [`Scanner`]
#[derive(Default)]
pub struct ScannerBuilder {
    pub(super) options: ScannerOptions,
    pub(super) readers: Vec<PolicyStream>,
    pub(super) debug_writer: Option<Box<dyn Write + Send>>,
    pub(super) policy_fs: Option<FsHandle>,
    pub(super) parser: Option<Arc<dyn DocumentParser>>,
    pub(super) factory: Option<Arc<dyn EngineFactory>>,
}

impl ScannerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the list of policy directories
    pub fn policy_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.policy_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    /// Append one policy directory
    pub fn policy_dir(mut self, dir: impl Into<String>) -> Self {
        self.options.policy_dirs.push(dir.into());
        self
    }

    /// Append a named policy stream; it is read when the engine is first built
    pub fn policy_reader(mut self, name: impl Into<String>, reader: impl Read + Send + 'static) -> Self {
        self.readers.push(PolicyStream::new(name, Box::new(reader)));
        self
    }

    /// Load the embedded rules
    pub fn embedded_policies(mut self, load: bool) -> Self {
        self.options.load_embedded = load;
        self
    }

    /// Keep files that do not look like Kubernetes manifests.
    ///
    /// Only applies to the default parser; a parser passed to [`Self::parser`]
    /// is used as configured.
    pub fn skip_required_check(mut self, skip: bool) -> Self {
        self.options.skip_required_check = skip;
        self
    }

    /// Write scanner diagnostics to `writer`
    pub fn debug_writer(mut self, writer: impl Write + Send + 'static) -> Self {
        self.debug_writer = Some(Box::new(writer));
        self
    }

    pub fn frameworks<I, F>(mut self, frameworks: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Framework>,
    {
        self.options.frameworks = frameworks.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict the active rules to a compliance spec
    pub fn spec(mut self, spec: impl Into<String>) -> Self {
        self.options.spec = Some(spec.into());
        self
    }

    /// Filesystem policy directories resolve against.
    ///
    /// Defaults to the filesystem of the scan that first builds the engine.
    pub fn policy_filesystem(mut self, fs: FsHandle) -> Self {
        self.policy_fs = Some(fs);
        self
    }

    /// Replace the default [`crate::parser::ManifestParser`]
    pub fn parser(mut self, parser: Arc<dyn DocumentParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Replace the default [`crate::rules::RuleEngineFactory`]
    pub fn engine_factory(mut self, factory: Arc<dyn EngineFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn build(self) -> Scanner {
        Scanner::assemble(self)
    }
}
