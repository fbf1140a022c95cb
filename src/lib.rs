//! fff-graph — Form/Function/Failure risk-model graph engine.
//!
//! Public API:
//!   model        // Layer, Node, Edge, Graph (the `{nodes, edges}` document)
//!   rules        // ClassificationRule, RuleSet (domain-supplied rule table)
//!   store        // GraphStore, UserIntent, SharedGraphStore
//!   hierarchy    // build() → HierarchyTree, outline, per-relation petgraph views
//!   reparent     // move_node(): validated edge replacement
//!   validation   // validate_diagram() → ValidationReport
//!   analysis     // AnalysisService trait + in-process LocalAnalysisService
//!   orchestrator // AlgorithmOrchestrator: validate-then-run state machine
//!   persistence  // PersistenceGateway trait + memory/file gateways
//!   workspace    // one open diagram: store + save-as-new vs overwrite

pub mod analysis;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod model;
pub mod orchestrator;
pub mod persistence;
pub mod reparent;
pub mod rules;
pub mod store;
pub mod validation;
pub mod workspace;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use analysis::{AnalysisService, LocalAnalysisService, RunRequest, RunResponse, ValidationRequest};
pub use config::{OrchestratorConfig, ValidationPolicy};
pub use error::{
    GraphError, OrchestratorError, PersistenceError, ReparentError, RuleError, TransportError,
};
pub use hierarchy::{HierarchyTree, build};
pub use model::{Edge, Graph, Layer, Node, Position};
pub use orchestrator::{AlgorithmOrchestrator, FailureKind, RunOutcome, RunReport, RunState};
pub use persistence::{MemoryGateway, PersistenceGateway};
#[cfg(not(target_arch = "wasm32"))]
pub use persistence::FileGateway;
pub use reparent::{ReparentOutcome, move_node};
pub use rules::{ClassificationRule, RuleSet};
pub use store::{GraphStore, SharedGraphStore, UserIntent};
pub use validation::{CheckStatus, ValidationReport, validate_diagram};
pub use workspace::Workspace;
