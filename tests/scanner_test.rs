//! Integration tests for scan orchestration and engine lifecycle
//!
//! These tests drive the public `Scanner` API with in-memory and on-disk
//! filesystems, and count engine constructions through a wrapping factory.

use confscan::context::ScanContext;
use confscan::debug::Logger;
use confscan::error::{EvaluationError, ParseError, PolicyLoadError, ScanError};
use confscan::filesystem::{same_fs, FsHandle, MemoryFs, OsFs};
use confscan::parser::{DocumentParser, ParsedDocumentSet};
use confscan::rules::{
    EngineFactory, EngineOptions, EvaluationInput, PolicyEngine, PolicyStream, RuleEngineFactory,
    ScanResults, SourceKind, Status,
};
use confscan::Scanner;
use pretty_assertions::assert_eq;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const PRIVILEGED_POD: &str = "apiVersion: v1
kind: Pod
metadata:
  name: web
spec:
  containers:
    - name: app
      image: nginx:1.25
      securityContext:
        privileged: true
        allowPrivilegeEscalation: false
        runAsNonRoot: true
";

const SERVICE_LINKS_RULE: &str = "id: CUSTOM001
long_id: custom-service-links-disabled
title: Service links disabled
severity: low
selector:
  kinds: [Pod]
check:
  field: spec.enableServiceLinks
  equals: false
message: \"{kind} '{name}' disables service links\"
";

// ============================================================================
// Helpers
// ============================================================================

/// Wraps the built-in factory and counts what the scanner asks of it
#[derive(Default)]
struct CountingFactory {
    creates: Arc<AtomicUsize>,
    loads: Arc<AtomicUsize>,
}

impl CountingFactory {
    fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl EngineFactory for CountingFactory {
    fn create(&self, source: SourceKind, options: &EngineOptions) -> Box<dyn PolicyEngine> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        Box::new(CountingEngine {
            inner: RuleEngineFactory.create(source, options),
            loads: Arc::clone(&self.loads),
        })
    }
}

struct CountingEngine {
    inner: Box<dyn PolicyEngine>,
    loads: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl PolicyEngine for CountingEngine {
    fn set_parent_debug_logger(&mut self, logger: &Logger) {
        self.inner.set_parent_debug_logger(logger);
    }

    fn load_policies(
        &mut self,
        load_embedded: bool,
        fs: &FsHandle,
        dirs: &[String],
        readers: &mut [PolicyStream],
    ) -> Result<(), PolicyLoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        // widen the window in which concurrent scans could race
        std::thread::sleep(Duration::from_millis(20));
        self.inner.load_policies(load_embedded, fs, dirs, readers)
    }

    async fn evaluate(
        &self,
        ctx: &ScanContext,
        inputs: &[EvaluationInput],
    ) -> Result<ScanResults, EvaluationError> {
        self.inner.evaluate(ctx, inputs).await
    }
}

/// Parser that reports recognized paths without any documents in them
struct EmptyPathsParser;

#[async_trait::async_trait]
impl DocumentParser for EmptyPathsParser {
    async fn parse_fs(
        &self,
        _ctx: &ScanContext,
        _fs: &FsHandle,
        _dir: &str,
    ) -> Result<ParsedDocumentSet, ParseError> {
        let mut set = ParsedDocumentSet::new();
        set.insert("a.yaml".to_string(), Vec::new());
        set.insert("b/c.yaml".to_string(), Vec::new());
        Ok(set)
    }
}

fn counting_scanner(factory: &Arc<CountingFactory>) -> Scanner {
    Scanner::builder()
        .embedded_policies(true)
        .engine_factory(Arc::clone(factory) as Arc<dyn EngineFactory>)
        .build()
}

fn memfs(files: &[(&str, &str)]) -> FsHandle {
    let mut fs = MemoryFs::new();
    for (path, content) in files {
        if let Some((dir, _)) = path.rsplit_once('/') {
            fs.mkdir_all(dir).unwrap();
        }
        fs.write_file(path, *content).unwrap();
    }
    Arc::new(fs)
}

/// Comparable view of results, without provenance
fn summarize(results: &ScanResults) -> Vec<(String, Status, String, usize, usize, String)> {
    results
        .iter()
        .map(|r| {
            (
                r.rule.id.clone(),
                r.status,
                r.location.path.clone(),
                r.location.start_line,
                r.location.end_line,
                r.message.clone(),
            )
        })
        .collect()
}

// ============================================================================
// Engine lifecycle
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_scans_build_one_engine() {
    let factory = Arc::new(CountingFactory::default());
    let scanner = Arc::new(counting_scanner(&factory));

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let scanner = Arc::clone(&scanner);
            tokio::spawn(async move {
                let name = format!("pod-{}.yaml", i);
                scanner
                    .scan_reader(&ScanContext::new(), &name, Cursor::new(PRIVILEGED_POD))
                    .await
            })
        })
        .collect();

    for outcome in futures::future::join_all(tasks).await {
        let results = outcome.unwrap().unwrap();
        assert!(results.failed().any(|r| r.rule.id == "KSV017"));
    }

    assert_eq!(factory.creates(), 1);
    assert_eq!(factory.loads(), 1);
}

#[tokio::test]
async fn test_engine_is_built_once_and_reused() {
    let factory = Arc::new(CountingFactory::default());
    let scanner = counting_scanner(&factory);
    let target = memfs(&[("pod.yaml", PRIVILEGED_POD)]);

    let first = scanner.engine(&target).await.unwrap();
    let second = scanner.engine(&target).await.unwrap();
    scanner
        .scan_fs(&ScanContext::new(), &target, ".")
        .await
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(factory.creates(), 1);
    assert_eq!(factory.loads(), 1);
}

#[tokio::test]
async fn test_no_documents_skips_engine() {
    let factory = Arc::new(CountingFactory::default());
    let scanner = counting_scanner(&factory);
    let target = memfs(&[
        ("README.md", "# manifests"),
        ("values.yaml", "replicas: 3\n"),
    ]);

    let results = scanner
        .scan_fs(&ScanContext::new(), &target, ".")
        .await
        .unwrap();

    assert!(results.is_empty());
    assert_eq!(factory.creates(), 0);
    assert!(!scanner.has_engine().await);
}

#[tokio::test]
async fn test_paths_without_documents_skip_engine() {
    let factory = Arc::new(CountingFactory::default());
    // loading would fail if the engine were built
    let scanner = Scanner::builder()
        .policy_dir("absent")
        .parser(Arc::new(EmptyPathsParser))
        .engine_factory(Arc::clone(&factory) as Arc<dyn EngineFactory>)
        .build();
    let target = memfs(&[("a.yaml", PRIVILEGED_POD)]);

    let results = scanner
        .scan_fs(&ScanContext::new(), &target, ".")
        .await
        .unwrap();

    assert!(results.is_empty());
    assert_eq!(factory.creates(), 0);
    assert_eq!(factory.loads(), 0);
    assert!(!scanner.has_engine().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_policies_load_on_multi_thread_runtime() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("policies")).unwrap();
    std::fs::write(dir.path().join("policies/links.yaml"), SERVICE_LINKS_RULE).unwrap();

    let scanner = Scanner::builder()
        .policy_dir("policies")
        .policy_filesystem(Arc::new(OsFs::new(dir.path())))
        .build();
    let pod = format!("{}  enableServiceLinks: false\n", PRIVILEGED_POD);

    let results = scanner
        .scan_reader(&ScanContext::new(), "pod.yaml", Cursor::new(pod))
        .await
        .unwrap();

    assert!(scanner.has_engine().await);
    assert!(results.failed().any(|r| r.rule.id == "CUSTOM001"));
}

#[tokio::test]
async fn test_parse_error_propagates_and_leaves_no_engine() {
    let factory = Arc::new(CountingFactory::default());
    let scanner = counting_scanner(&factory);
    let target = memfs(&[("broken.yaml", "apiVersion: v1\nkind: Pod\nmetadata: [unclosed\n")]);

    let err = scanner
        .scan_fs(&ScanContext::new(), &target, ".")
        .await
        .unwrap_err();

    assert!(matches!(err, ScanError::Parse(ParseError::Malformed { ref path, .. }) if path == "broken.yaml"));
    assert_eq!(factory.creates(), 0);
    assert!(!scanner.has_engine().await);
}

#[tokio::test]
async fn test_policy_load_failure_is_not_cached() {
    let factory = Arc::new(CountingFactory::default());
    let scanner = Scanner::builder()
        .policy_dir("policies")
        .engine_factory(Arc::clone(&factory) as Arc<dyn EngineFactory>)
        .build();
    let ctx = ScanContext::new();

    // policy directories resolve against the scanned filesystem
    let without_policies = memfs(&[("pod.yaml", PRIVILEGED_POD)]);
    let err = scanner
        .scan_fs(&ctx, &without_policies, ".")
        .await
        .unwrap_err();
    assert!(matches!(err, ScanError::PolicyLoad(PolicyLoadError::Directory { ref path, .. }) if path == "policies"));
    assert!(!scanner.has_engine().await);

    let with_policies = memfs(&[
        ("pod.yaml", PRIVILEGED_POD),
        ("policies/custom.yaml", SERVICE_LINKS_RULE),
    ]);
    let results = scanner.scan_fs(&ctx, &with_policies, ".").await.unwrap();

    assert!(scanner.has_engine().await);
    assert_eq!(factory.creates(), 2);
    assert_eq!(results.len(), 1);
    assert!(results.iter().all(|r| r.rule.id == "CUSTOM001"));
}

#[tokio::test]
async fn test_policy_stream_survives_failed_load() {
    let scanner = Scanner::builder()
        .policy_dir("policies")
        .policy_reader("custom", Cursor::new(SERVICE_LINKS_RULE))
        .build();
    let ctx = ScanContext::new();
    let pod = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: api\nspec:\n  enableServiceLinks: false\n";

    assert!(scanner
        .scan_fs(&ctx, &memfs(&[("pod.yaml", pod)]), ".")
        .await
        .is_err());

    let target = memfs(&[("pod.yaml", pod), ("policies/empty.yaml", "")]);
    let results = scanner.scan_fs(&ctx, &target, ".").await.unwrap();
    assert_eq!(results.failed().count(), 1);
}

// ============================================================================
// Scan semantics
// ============================================================================

#[tokio::test]
async fn test_stream_and_filesystem_scans_agree() {
    let scanner = Scanner::builder().embedded_policies(true).build();
    let ctx = ScanContext::new();

    let from_stream = scanner
        .scan_reader(&ctx, "pod.yaml", Cursor::new(PRIVILEGED_POD))
        .await
        .unwrap();
    let from_fs = scanner
        .scan_fs(&ctx, &memfs(&[("pod.yaml", PRIVILEGED_POD)]), ".")
        .await
        .unwrap();

    assert!(!from_stream.is_empty());
    assert_eq!(summarize(&from_stream), summarize(&from_fs));
}

#[tokio::test]
async fn test_results_carry_provenance() {
    let scanner = Scanner::builder().embedded_policies(true).build();
    let target = memfs(&[("k8s/pod.yaml", PRIVILEGED_POD)]);

    let results = scanner
        .scan_fs(&ScanContext::new(), &target, "k8s")
        .await
        .unwrap();

    assert!(!results.is_empty());
    for result in results.iter() {
        assert_eq!(result.source, "");
        assert!(!result.mixed_filesystems);
        assert!(same_fs(result.filesystem.as_ref().unwrap(), &target));
        assert_eq!(result.location.path, "k8s/pod.yaml");
    }
}

#[tokio::test]
async fn test_rule_failing_when_field_is_false() {
    let scanner = Scanner::builder()
        .policy_reader("service-links", Cursor::new(SERVICE_LINKS_RULE))
        .build();
    let ctx = ScanContext::new();

    let disabled = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: api\nspec:\n  enableServiceLinks: false\n";
    let results = scanner
        .scan_reader(&ctx, "pod.yaml", Cursor::new(disabled))
        .await
        .unwrap();

    let failed: Vec<_> = results.failed().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].rule.long_id, "custom-service-links-disabled");
    assert_eq!(failed[0].message, "Pod 'api' disables service links");

    let enabled = disabled.replace("false", "true");
    let results = scanner
        .scan_reader(&ctx, "pod.yaml", Cursor::new(enabled))
        .await
        .unwrap();
    assert_eq!(results.failed().count(), 0);
    assert_eq!(results.count_by_status(Status::Passed), 1);
}

#[tokio::test]
async fn test_results_follow_path_then_document_order() {
    let scanner = Scanner::builder()
        .policy_reader("service-links", Cursor::new(SERVICE_LINKS_RULE))
        .build();
    let doc = |name: &str| {
        format!(
            "apiVersion: v1\nkind: Pod\nmetadata:\n  name: {}\nspec:\n  enableServiceLinks: false\n",
            name
        )
    };
    let multi = format!("{}---\n{}", doc("first"), doc("second"));
    let target = memfs(&[("b.yaml", multi.as_str()), ("a.yaml", doc("zero").as_str())]);

    let results = scanner
        .scan_fs(&ScanContext::new(), &target, ".")
        .await
        .unwrap();

    let messages: Vec<_> = results.iter().map(|r| r.message.as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "Pod 'zero' disables service links",
            "Pod 'first' disables service links",
            "Pod 'second' disables service links",
        ]
    );
}

#[tokio::test]
async fn test_cancelled_scan() {
    let scanner = Scanner::builder().embedded_policies(true).build();
    let ctx = ScanContext::new();
    ctx.cancel();

    let err = scanner
        .scan_reader(&ctx, "pod.yaml", Cursor::new(PRIVILEGED_POD))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "scan cancelled");
    assert!(!scanner.has_engine().await);
}

#[tokio::test]
async fn test_scan_directory_on_disk() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    std::fs::create_dir_all(root.join("deploy")).unwrap();
    std::fs::write(root.join("deploy/pod.yaml"), PRIVILEGED_POD).unwrap();
    std::fs::write(root.join("deploy/notes.txt"), "not scanned").unwrap();

    let scanner = Scanner::builder()
        .embedded_policies(true)
        .spec("k8s-pss-baseline")
        .build();
    let target: FsHandle = Arc::new(OsFs::new(root));

    let results = scanner
        .scan_fs(&ScanContext::new(), &target, ".")
        .await
        .unwrap();

    let ids: Vec<_> = results.iter().map(|r| r.rule.id.as_str()).collect();
    assert_eq!(ids, vec!["KSV009", "KSV010", "KSV017"]);
    assert_eq!(results.failed().count(), 1);
}
