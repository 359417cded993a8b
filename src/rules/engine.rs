//! Rules evaluation engine
//!
//! [`PolicyEngine`] is the seam the scanner drives: it is built by an
//! [`EngineFactory`], loaded once, then shared for every evaluation.
//! [`RuleEngine`] is the built-in implementation over declarative rules.

use std::collections::BTreeMap;
use tracing::{debug, info, span, Level};

use super::definition::{Framework, Rule, SourceKind};
use super::embedded;
use super::input::EvaluationInput;
use super::loader::{self, PolicyStream};
use super::results::{Location, ScanResult, ScanResults};
use crate::context::ScanContext;
use crate::debug::Logger;
use crate::error::{EvaluationError, PolicyLoadError};
use crate::filesystem::FsHandle;

/// Selection applied to loaded rules
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Frameworks to keep rules from; the default framework when empty
    pub frameworks: Vec<Framework>,
    /// Compliance spec restricting the active rules
    pub spec: Option<String>,
}

/// Builds engines for a source kind
pub trait EngineFactory: Send + Sync {
    fn create(&self, source: SourceKind, options: &EngineOptions) -> Box<dyn PolicyEngine>;
}

/// A loaded policy evaluator
#[async_trait::async_trait]
pub trait PolicyEngine: Send + Sync {
    /// Attach the caller's debug logger
    fn set_parent_debug_logger(&mut self, logger: &Logger);

    /// Load rules from the embedded set, then each directory on `fs`, then
    /// each stream, stopping at the first failure
    fn load_policies(
        &mut self,
        load_embedded: bool,
        fs: &FsHandle,
        dirs: &[String],
        readers: &mut [PolicyStream],
    ) -> Result<(), PolicyLoadError>;

    /// Evaluate every input against the loaded rules
    async fn evaluate(
        &self,
        ctx: &ScanContext,
        inputs: &[EvaluationInput],
    ) -> Result<ScanResults, EvaluationError>;
}

/// Factory for [`RuleEngine`]
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEngineFactory;

impl EngineFactory for RuleEngineFactory {
    fn create(&self, source: SourceKind, options: &EngineOptions) -> Box<dyn PolicyEngine> {
        Box::new(RuleEngine::new(source, options.clone()))
    }
}

/// Declarative rule engine
#[derive(Debug)]
pub struct RuleEngine {
    source: SourceKind,
    options: EngineOptions,
    rules: BTreeMap<String, Rule>,
    loaded: bool,
    debug: Logger,
}

impl RuleEngine {
    pub fn new(source: SourceKind, options: EngineOptions) -> Self {
        Self {
            source,
            options,
            rules: BTreeMap::new(),
            loaded: false,
            debug: Logger::disabled(),
        }
    }

    /// Active rules, in id order
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    fn insert(&self, loaded: &mut BTreeMap<String, Rule>, rules: Vec<Rule>, origin: &str) {
        debug!(origin = origin, count = rules.len(), "Loaded rules");
        for rule in rules {
            if loaded.contains_key(&rule.id) {
                self.debug
                    .log(format_args!("Rule {} from {} replaces an earlier definition", rule.id, origin));
            }
            loaded.insert(rule.id.clone(), rule);
        }
    }

    /// Drop rules the source kind, frameworks or spec exclude
    fn select(&self, loaded: BTreeMap<String, Rule>) -> Result<BTreeMap<String, Rule>, PolicyLoadError> {
        let spec = match &self.options.spec {
            Some(id) => Some(embedded::find_spec(id)?),
            None => None,
        };

        Ok(loaded
            .into_iter()
            .filter(|(_, rule)| rule.supports(self.source))
            .filter(|(_, rule)| rule.in_frameworks(&self.options.frameworks))
            .filter(|(id, _)| spec.as_ref().map_or(true, |s| s.includes(id)))
            .collect())
    }

    fn evaluate_input(&self, input: &EvaluationInput, results: &mut ScanResults) {
        let doc = &input.contents;
        let location = Location::new(&input.path, doc.start_line, doc.end_line);

        for rule in self.rules.values().filter(|r| r.applies_to(doc)) {
            let result = match rule.check.evaluate(&doc.content) {
                Ok(true) => ScanResult::failed(rule.summary(), location.clone(), rule.render_message(doc))
                    .with_remediation(rule.remediation.clone()),
                Ok(false) => ScanResult::passed(rule.summary(), location.clone()),
                Err(reason) => {
                    self.debug
                        .log(format_args!("Rule {} errored on {}: {}", rule.id, location, reason));
                    ScanResult::error(rule.summary(), location.clone(), reason)
                }
            };
            results.push(result);
        }
    }
}

#[async_trait::async_trait]
impl PolicyEngine for RuleEngine {
    fn set_parent_debug_logger(&mut self, logger: &Logger) {
        self.debug = logger.extend("rule-engine");
    }

    fn load_policies(
        &mut self,
        load_embedded: bool,
        fs: &FsHandle,
        dirs: &[String],
        readers: &mut [PolicyStream],
    ) -> Result<(), PolicyLoadError> {
        let mut loaded = BTreeMap::new();

        if load_embedded {
            self.insert(&mut loaded, embedded::rules()?, "embedded");
        }
        for dir in dirs {
            let rules = loader::load_dir(fs, dir)?;
            self.debug
                .log(format_args!("Loaded {} rules from directory {}", rules.len(), dir));
            self.insert(&mut loaded, rules, dir);
        }
        for stream in readers.iter_mut() {
            let rules = loader::load_stream(stream)?;
            self.debug
                .log(format_args!("Loaded {} rules from stream {}", rules.len(), stream.name()));
            self.insert(&mut loaded, rules, stream.name());
        }

        let total = loaded.len();
        self.rules = self.select(loaded)?;
        self.loaded = true;
        self.debug.log(format_args!(
            "{} of {} rules active for {}",
            self.rules.len(),
            total,
            self.source.as_str()
        ));

        Ok(())
    }

    async fn evaluate(
        &self,
        ctx: &ScanContext,
        inputs: &[EvaluationInput],
    ) -> Result<ScanResults, EvaluationError> {
        if !self.loaded {
            return Err(EvaluationError::Engine(format!(
                "no policies loaded for {}",
                self.source.as_str()
            )));
        }

        let span = span!(Level::DEBUG, "evaluate", source = self.source.as_str(), inputs = inputs.len());
        let results = span.in_scope(|| -> Result<ScanResults, EvaluationError> {
            let mut results = ScanResults::new();
            for input in inputs {
                ctx.check()?;
                self.evaluate_input(input, &mut results);
            }
            Ok(results)
        })?;

        info!(
            "Evaluation complete: {} results, {} failed",
            results.len(),
            results.failed().count()
        );

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ContextError;
    use crate::filesystem::MemoryFs;
    use crate::parser::Document;
    use crate::rules::results::Status;
    use serde_json::json;
    use std::sync::Arc;

    fn empty_fs() -> FsHandle {
        Arc::new(MemoryFs::new())
    }

    fn input(path: &str, doc: serde_json::Value) -> EvaluationInput {
        EvaluationInput::new(path, empty_fs(), Document::new(doc).with_lines(1, 8))
    }

    fn privileged_pod(privileged: bool) -> serde_json::Value {
        json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"name": "web"},
            "spec": {
                "hostNetwork": false,
                "containers": [{
                    "name": "app",
                    "image": "nginx:1.25",
                    "securityContext": {
                        "privileged": privileged,
                        "allowPrivilegeEscalation": false,
                        "runAsNonRoot": true
                    }
                }]
            }
        })
    }

    fn embedded_engine(options: EngineOptions) -> RuleEngine {
        let mut engine = RuleEngine::new(SourceKind::Kubernetes, options);
        engine
            .load_policies(true, &empty_fs(), &[], &mut [])
            .unwrap();
        engine
    }

    #[tokio::test]
    async fn test_embedded_rules_flag_privileged_pod() {
        let engine = embedded_engine(EngineOptions::default());
        assert_eq!(engine.rule_count(), 6);

        let results = engine
            .evaluate(&ScanContext::new(), &[input("pod.yaml", privileged_pod(true))])
            .await
            .unwrap();

        let failed: Vec<_> = results.failed().map(|r| r.rule.id.as_str()).collect();
        assert_eq!(failed, vec!["KSV017"]);
        assert_eq!(results.len(), 6);

        let finding = results.failed().next().unwrap();
        assert_eq!(finding.rule.long_id, "kubernetes-no-privileged-containers");
        assert_eq!(finding.location.to_string(), "pod.yaml:1-8");
        assert!(finding.message.contains("Pod 'web'"));
        assert!(finding.remediation.is_some());
    }

    #[tokio::test]
    async fn test_hardened_pod_passes() {
        let engine = embedded_engine(EngineOptions::default());
        let results = engine
            .evaluate(&ScanContext::new(), &[input("pod.yaml", privileged_pod(false))])
            .await
            .unwrap();
        assert!(!results.has_failures());
        assert_eq!(results.count_by_status(Status::Passed), 6);
    }

    #[tokio::test]
    async fn test_kind_selector_skips_other_documents() {
        let engine = embedded_engine(EngineOptions::default());
        let service = json!({"apiVersion": "v1", "kind": "Service", "metadata": {"name": "svc"}});
        let results = engine
            .evaluate(&ScanContext::new(), &[input("svc.yaml", service)])
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_spec_filter() {
        let engine = embedded_engine(EngineOptions {
            frameworks: vec![],
            spec: Some("k8s-pss-baseline".to_string()),
        });
        let ids: Vec<_> = engine.rules().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["KSV009", "KSV010", "KSV017"]);
    }

    #[test]
    fn test_unknown_spec_fails_load() {
        let mut engine = RuleEngine::new(
            SourceKind::Kubernetes,
            EngineOptions {
                frameworks: vec![],
                spec: Some("missing".to_string()),
            },
        );
        let err = engine
            .load_policies(true, &empty_fs(), &[], &mut [])
            .unwrap_err();
        assert!(matches!(err, PolicyLoadError::UnknownSpec(_)));
    }

    #[test]
    fn test_framework_filter() {
        let engine = embedded_engine(EngineOptions {
            frameworks: vec![Framework::from("cis")],
            spec: None,
        });
        let ids: Vec<_> = engine.rules().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["KSV009", "KSV010", "KSV017"]);
    }

    #[test]
    fn test_later_sources_override_and_source_filter() {
        let override_rule = "id: KSV017\ntitle: Overridden\nseverity: low\ncheck:\n  field: kind\n  exists: true\n";
        let json_rule = "id: J1\ntitle: json only\nselector:\n  source: json\ncheck:\n  field: a\n  exists: true\n";

        let mut engine = RuleEngine::new(SourceKind::Kubernetes, EngineOptions::default());
        let mut readers = [
            PolicyStream::from_bytes("override", override_rule),
            PolicyStream::from_bytes("json", json_rule),
        ];
        engine
            .load_policies(true, &empty_fs(), &[], &mut readers)
            .unwrap();

        let rule = engine.rules().find(|r| r.id == "KSV017").unwrap();
        assert_eq!(rule.title, "Overridden");
        assert!(engine.rules().all(|r| r.id != "J1"));
    }

    #[test]
    fn test_load_fails_fast_on_missing_directory() {
        let mut engine = RuleEngine::new(SourceKind::Kubernetes, EngineOptions::default());
        let mut readers = [PolicyStream::from_bytes("never", "not: [valid")];
        let err = engine
            .load_policies(false, &empty_fs(), &["absent".to_string()], &mut readers)
            .unwrap_err();
        assert!(matches!(err, PolicyLoadError::Directory { .. }));
        assert_eq!(engine.rule_count(), 0);
    }

    #[tokio::test]
    async fn test_type_mismatch_yields_error_result() {
        let rule = "id: R1\ntitle: replicas\ncheck:\n  field: spec.replicas\n  greater_than: 3\n";
        let mut engine = RuleEngine::new(SourceKind::Kubernetes, EngineOptions::default());
        engine
            .load_policies(false, &empty_fs(), &[], &mut [PolicyStream::from_bytes("r", rule)])
            .unwrap();

        let doc = json!({"kind": "Deployment", "spec": {"replicas": "three"}});
        let results = engine
            .evaluate(&ScanContext::new(), &[input("d.yaml", doc)])
            .await
            .unwrap();
        assert_eq!(results.count_by_status(Status::Error), 1);
    }

    #[tokio::test]
    async fn test_evaluate_before_load_is_engine_error() {
        let engine = RuleEngine::new(SourceKind::Kubernetes, EngineOptions::default());
        let err = engine
            .evaluate(&ScanContext::new(), &[input("pod.yaml", privileged_pod(true))])
            .await
            .unwrap_err();
        assert!(matches!(err, EvaluationError::Engine(ref msg) if msg.contains("kubernetes")));
    }

    #[tokio::test]
    async fn test_evaluate_after_failed_load_is_engine_error() {
        let mut engine = RuleEngine::new(SourceKind::Kubernetes, EngineOptions::default());
        engine
            .load_policies(false, &empty_fs(), &["missing".to_string()], &mut [])
            .unwrap_err();

        let err = engine
            .evaluate(&ScanContext::new(), &[input("pod.yaml", privileged_pod(true))])
            .await
            .unwrap_err();
        assert!(matches!(err, EvaluationError::Engine(_)));
    }

    #[tokio::test]
    async fn test_cancelled_context_stops_evaluation() {
        let engine = embedded_engine(EngineOptions::default());
        let ctx = ScanContext::new();
        ctx.cancel();

        let err = engine
            .evaluate(&ctx, &[input("pod.yaml", privileged_pod(true))])
            .await
            .unwrap_err();
        assert!(matches!(err, EvaluationError::Cancelled(ContextError::Cancelled)));
    }

    #[tokio::test]
    async fn test_factory_engine_through_trait_object() {
        let mut engine = RuleEngineFactory.create(SourceKind::Kubernetes, &EngineOptions::default());
        engine.set_parent_debug_logger(&Logger::disabled());
        engine
            .load_policies(true, &empty_fs(), &[], &mut [])
            .unwrap();

        let results = engine
            .evaluate(&ScanContext::new(), &[input("pod.yaml", privileged_pod(true))])
            .await
            .unwrap();
        assert!(results.has_failures());
    }
}
