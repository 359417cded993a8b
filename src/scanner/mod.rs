//! Scanner module - scan orchestration and evaluation engine lifecycle
//!
//! A [`Scanner`] parses a filesystem subtree (or a single stream staged in an
//! in-memory filesystem), flattens the documents into engine inputs, and
//! evaluates them with an engine it builds lazily on first use and then keeps
//! for the rest of its life.

mod input;
mod options;

use std::io::Read;
use std::sync::Arc;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::Mutex;
use tokio::task;
use tracing::{debug, info, info_span, Instrument};

pub use input::flatten;
pub use options::{ScannerBuilder, ScannerOptions};

use crate::context::ScanContext;
use crate::debug::Logger;
use crate::error::{PolicyLoadError, ScanError};
use crate::filesystem::{self, FsHandle, MemoryFs};
use crate::parser::{document_count, DocumentParser, ManifestParser};
use crate::rules::{
    EngineFactory, EngineOptions, PolicyEngine, PolicyStream, RuleEngineFactory, ScanResults,
    SourceKind,
};

const SCANNER_NAME: &str = "Kubernetes";

/// Engine cache and the streams it is loaded from, guarded together
struct EngineSlot {
    engine: Option<Arc<dyn PolicyEngine>>,
    readers: Vec<PolicyStream>,
}

/// Kubernetes configuration scanner
pub struct Scanner {
    options: ScannerOptions,
    policy_fs: Option<FsHandle>,
    parser: Arc<dyn DocumentParser>,
    factory: Arc<dyn EngineFactory>,
    debug: Logger,
    engine: Mutex<EngineSlot>,
}

impl Scanner {
    pub fn builder() -> ScannerBuilder {
        ScannerBuilder::new()
    }

    pub(super) fn assemble(builder: ScannerBuilder) -> Self {
        let ScannerBuilder {
            options,
            readers,
            debug_writer,
            policy_fs,
            parser,
            factory,
        } = builder;

        let debug = match debug_writer {
            Some(writer) => Logger::new(writer, &["kubernetes", "scanner"]),
            None => Logger::disabled(),
        };

        let parser = parser.unwrap_or_else(|| {
            Arc::new(
                ManifestParser::new()
                    .with_skip_required_check(options.skip_required_check)
                    .with_debug_logger(debug.extend("parser")),
            )
        });

        Self {
            options,
            policy_fs,
            parser,
            factory: factory.unwrap_or_else(|| Arc::new(RuleEngineFactory)),
            debug,
            engine: Mutex::new(EngineSlot {
                engine: None,
                readers,
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        SCANNER_NAME
    }

    pub fn options(&self) -> &ScannerOptions {
        &self.options
    }

    /// Whether the evaluation engine has been built
    pub async fn has_engine(&self) -> bool {
        self.engine.lock().await.engine.is_some()
    }

    /// The evaluation engine, built on first call.
    ///
    /// Policy directories resolve against the configured policy filesystem,
    /// or `target` when none was set. Once built, the engine is returned as is
    /// for every later call whatever `target` is. A failed build leaves nothing
    /// cached, so the next call tries again.
    pub async fn engine(&self, target: &FsHandle) -> Result<Arc<dyn PolicyEngine>, PolicyLoadError> {
        let mut slot = self.engine.lock().await;
        if let Some(engine) = &slot.engine {
            return Ok(Arc::clone(engine));
        }

        let engine_options = EngineOptions {
            frameworks: self.options.frameworks.clone(),
            spec: self.options.spec.clone(),
        };
        let mut engine = self.factory.create(SourceKind::Kubernetes, &engine_options);
        engine.set_parent_debug_logger(&self.debug);

        let policy_fs = self.policy_fs.as_ref().unwrap_or(target);
        let slot = &mut *slot;
        let mut load = || {
            engine.load_policies(
                self.options.load_embedded,
                policy_fs,
                &self.options.policy_dirs,
                &mut slot.readers,
            )
        };
        // Policy loading reads files and streams synchronously
        match Handle::try_current().map(|handle| handle.runtime_flavor()) {
            Ok(RuntimeFlavor::MultiThread) => task::block_in_place(load)?,
            _ => load()?,
        }

        debug!(
            embedded = self.options.load_embedded,
            dirs = self.options.policy_dirs.len(),
            streams = slot.readers.len(),
            "Evaluation engine ready"
        );
        let engine: Arc<dyn PolicyEngine> = Arc::from(engine);
        slot.engine = Some(Arc::clone(&engine));
        Ok(engine)
    }

    /// Scan a single stream as if it were the file `filename`.
    ///
    /// `filename` must be relative; its extension decides how it is parsed.
    pub async fn scan_reader<R: Read + Send>(
        &self,
        ctx: &ScanContext,
        filename: &str,
        mut reader: R,
    ) -> Result<ScanResults, ScanError> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;

        let path = filesystem::normalize(filename)?;
        let mut memfs = MemoryFs::new();
        memfs.mkdir_all(filesystem::parent(&path))?;
        memfs.write_file(&path, data)?;

        let target: FsHandle = Arc::new(memfs);
        self.scan_fs(ctx, &target, ".").await
    }

    /// Scan every recognized document under `dir` on `target`
    pub async fn scan_fs(
        &self,
        ctx: &ScanContext,
        target: &FsHandle,
        dir: &str,
    ) -> Result<ScanResults, ScanError> {
        let span = info_span!("scan", scanner = SCANNER_NAME, fs = %target.describe(), dir = dir);
        self.scan_fs_inner(ctx, target, dir).instrument(span).await
    }

    async fn scan_fs_inner(
        &self,
        ctx: &ScanContext,
        target: &FsHandle,
        dir: &str,
    ) -> Result<ScanResults, ScanError> {
        let documents = self.parser.parse_fs(ctx, target, dir).await?;
        let count = document_count(&documents);
        if count == 0 {
            debug!(paths = documents.len(), "No documents to scan");
            return Ok(ScanResults::new());
        }

        let files = documents.len();
        let inputs = flatten(documents, target);

        let engine = self.engine(target).await?;

        self.debug.log(format_args!("Scanning {} files...", inputs.len()));
        let mut results = engine.evaluate(ctx, &inputs).await?;
        results.set_source_and_filesystem("", target, false);

        info!(
            "Scan complete: {} files, {} documents, {} results, {} failed",
            files,
            count,
            results.len(),
            results.failed().count()
        );

        Ok(results)
    }
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("name", &SCANNER_NAME)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug::tests::SharedBuf;
    use crate::filesystem::same_fs;
    use std::io::Cursor;

    const POD: &str = "apiVersion: v1
kind: Pod
metadata:
  name: web
spec:
  containers:
    - name: app
      image: nginx:1.25
      securityContext:
        privileged: true
";

    #[tokio::test]
    async fn test_name() {
        assert_eq!(Scanner::builder().build().name(), "Kubernetes");
    }

    #[tokio::test]
    async fn test_scan_reader_with_embedded_rules() {
        let scanner = Scanner::builder().embedded_policies(true).build();

        let results = scanner
            .scan_reader(&ScanContext::new(), "k8s/pod.yaml", Cursor::new(POD))
            .await
            .unwrap();

        assert!(results.failed().any(|r| r.rule.id == "KSV017"));
        assert!(results.iter().all(|r| r.location.path == "k8s/pod.yaml"));
        assert!(scanner.has_engine().await);
    }

    #[tokio::test]
    async fn test_unrecognized_stream_builds_no_engine() {
        let scanner = Scanner::builder().embedded_policies(true).build();

        let results = scanner
            .scan_reader(&ScanContext::new(), "notes.txt", Cursor::new("hello"))
            .await
            .unwrap();

        assert!(results.is_empty());
        assert!(!scanner.has_engine().await);
    }

    #[tokio::test]
    async fn test_scan_reader_rejects_absolute_name() {
        let scanner = Scanner::builder().build();
        let err = scanner
            .scan_reader(&ScanContext::new(), "/etc/pod.yaml", Cursor::new(POD))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Io(ref e) if e.kind() == std::io::ErrorKind::InvalidInput));
    }

    #[tokio::test]
    async fn test_debug_writer_receives_scan_line() {
        let buf = SharedBuf::default();
        let scanner = Scanner::builder()
            .embedded_policies(true)
            .debug_writer(buf.clone())
            .build();

        scanner
            .scan_reader(&ScanContext::new(), "pod.yaml", Cursor::new(POD))
            .await
            .unwrap();

        let log = buf.contents();
        assert!(log.contains("[kubernetes:scanner] Scanning 1 files..."));
        assert!(log.contains("[kubernetes:scanner:rule-engine]"));
    }

    #[tokio::test]
    async fn test_engine_is_cached_across_targets() {
        let scanner = Scanner::builder().embedded_policies(true).build();
        let first: FsHandle = Arc::new(MemoryFs::new());
        let second: FsHandle = Arc::new(MemoryFs::new());

        let a = scanner.engine(&first).await.unwrap();
        let b = scanner.engine(&second).await.unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!same_fs(&first, &second));
    }
}
