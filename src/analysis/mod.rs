//! Analysis service — the collaborator that validates diagrams and runs
//! algorithms.
//!
//! The orchestrator only sees the `AnalysisService` trait. A remote client
//! and the in-process `LocalAnalysisService` are interchangeable behind it.

pub mod local;

pub use local::LocalAnalysisService;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TransportError;
use crate::model::Graph;
use crate::validation::ValidationReport;

/// Algorithm name reserved for diagram validation.
pub const VALIDATE_DIAGRAM: &str = "validate_diagram";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRequest {
    pub domain: String,
    pub graph: Graph,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub domain: String,
    pub algorithm_name: String,
    pub graph: Graph,
    #[serde(default)]
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_graph: Option<Graph>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunResponse {
    pub fn succeeded(results: Map<String, Value>, updated_graph: Option<Graph>) -> Self {
        Self {
            success: true,
            results: Some(results),
            updated_graph,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Remote (or local) analysis endpoint.
///
/// `Err` means the call itself failed; an algorithm that ran and reported
/// failure comes back as `Ok` with `success == false`.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn validate(&self, request: ValidationRequest) -> Result<ValidationReport, TransportError>;
    async fn run(&self, request: RunRequest) -> Result<RunResponse, TransportError>;
}

/// Outcome of one in-process algorithm.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlgorithmOutput {
    pub results: Map<String, Value>,
    pub updated_graph: Option<Graph>,
}

/// A named algorithm runnable by `LocalAnalysisService`.
pub trait Algorithm: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn run(&self, graph: &Graph, params: &Map<String, Value>) -> Result<AlgorithmOutput, String>;
}
