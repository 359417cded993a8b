//! Rules module - declarative policy rules and their evaluation engine

pub mod definition;
pub mod embedded;
pub mod engine;
pub mod input;
pub mod loader;
pub mod results;

pub use definition::{Framework, Rule, SourceKind};
pub use engine::{EngineFactory, EngineOptions, PolicyEngine, RuleEngine, RuleEngineFactory};
pub use input::EvaluationInput;
pub use loader::PolicyStream;
pub use results::{Location, RuleSummary, ScanResult, ScanResults, Severity, Status};
