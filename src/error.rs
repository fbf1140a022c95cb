//! Error types shared across the crate.
//!
//! Each component owns one enum. None of them is fatal: callers recover by
//! leaving the graph untouched and reporting the failure.

use thiserror::Error;

use crate::model::Layer;
use crate::orchestrator::RunState;

/// Structural errors raised by `GraphStore` mutations and document parsing.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("duplicate node id: {0}")]
    DuplicateNode(String),
    #[error("duplicate edge id: {0}")]
    DuplicateEdge(String),
    #[error("node not found: {0}")]
    NodeNotFound(String),
    #[error("edge not found: {0}")]
    EdgeNotFound(String),
    #[error("invalid graph document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors building a `RuleSet`.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("more than one rule for layer pair {source_layer} -> {target_layer}")]
    DuplicatePair { source_layer: Layer, target_layer: Layer },
    #[error("relation '{0}' is defined by more than one rule")]
    DuplicateRelation(String),
    #[error("root relation '{0}' does not name a rule")]
    UnknownRootRelation(String),
    #[error("invalid rule table: {0}")]
    Json(#[from] serde_json::Error),
}

/// A rejected structural edit. The graph is unchanged when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReparentError {
    #[error("relation '{0}' is not configured")]
    UnknownRelation(String),
    #[error("node not found: {0}")]
    NodeNotFound(String),
    #[error("node '{0}' cannot be its own parent")]
    SelfParent(String),
    #[error(
        "relation '{relation}' connects {expected_source} -> {expected_target}, not {parent_layer} -> {child_layer}"
    )]
    IncompatibleRelation {
        relation: String,
        expected_source: Layer,
        expected_target: Layer,
        parent_layer: Layer,
        child_layer: Layer,
    },
}

/// The analysis service could not be reached or answered with garbage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("service unreachable: {0}")]
    Unreachable(String),
    #[error("request timed out")]
    Timeout,
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("diagram not found: {0}")]
    NotFound(String),
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored diagram is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("stored diagram is inconsistent: {0}")]
    InvalidGraph(#[from] GraphError),
    #[error("persistence backend unavailable: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    #[error("a submission is already in flight (state: {0})")]
    Busy(RunState),
    #[error("invalid run state transition {from} -> {to}")]
    InvalidTransition { from: RunState, to: RunState },
}
