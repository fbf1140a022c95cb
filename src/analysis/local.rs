//! In-process analysis service.
//!
//! Runs validation and the built-in risk algorithms directly against the
//! submitted graph. Never returns a `TransportError`.

use std::collections::HashMap;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::{
    Algorithm, AlgorithmOutput, AnalysisService, RunRequest, RunResponse, ValidationRequest,
};
use crate::error::TransportError;
use crate::hierarchy::{self, RelationGraph};
use crate::model::{Graph, Layer, Node};
use crate::rules::{FAILURE_PROPAGATION, RuleSet};
use crate::validation::{self, ValidationReport};

pub struct LocalAnalysisService {
    domain: String,
    rules: RuleSet,
    algorithms: IndexMap<String, Box<dyn Algorithm>>,
}

impl LocalAnalysisService {
    /// A service for `domain` with the built-in algorithms registered.
    pub fn new(domain: impl Into<String>, rules: RuleSet) -> Self {
        let propagation = FailurePropagation::new(rules.clone());
        let service = Self {
            domain: domain.into(),
            rules,
            algorithms: IndexMap::new(),
        };
        service
            .with_algorithm(FmeaRiskAnalysis)
            .with_algorithm(propagation)
            .with_algorithm(CriticalComponents)
    }

    pub fn with_algorithm(mut self, algorithm: impl Algorithm + 'static) -> Self {
        self.algorithms
            .insert(algorithm.name().to_string(), Box::new(algorithm));
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// `(name, description)` of every registered algorithm.
    pub fn algorithms(&self) -> Vec<(&str, &str)> {
        self.algorithms
            .values()
            .map(|a| (a.name(), a.description()))
            .collect()
    }

    fn execute(&self, request: &RunRequest) -> RunResponse {
        if request.domain != self.domain {
            return RunResponse::failed(format!(
                "Domain '{}' is not served here (serving '{}')",
                request.domain, self.domain
            ));
        }
        let Some(algorithm) = self.algorithms.get(&request.algorithm_name) else {
            return RunResponse::failed(format!(
                "Algorithm '{}' not found in domain '{}'",
                request.algorithm_name, request.domain
            ));
        };
        debug!(algorithm = %request.algorithm_name, "running local algorithm");
        match algorithm.run(&request.graph, &request.params) {
            Ok(out) => RunResponse::succeeded(out.results, out.updated_graph),
            Err(e) => RunResponse::failed(e),
        }
    }
}

#[async_trait]
impl AnalysisService for LocalAnalysisService {
    async fn validate(&self, request: ValidationRequest) -> Result<ValidationReport, TransportError> {
        Ok(validation::validate_diagram(&request.graph, &self.rules))
    }

    async fn run(&self, request: RunRequest) -> Result<RunResponse, TransportError> {
        Ok(self.execute(&request))
    }
}

// ─── Parameter helpers ───────────────────────────────────────────────────────

fn int_param(params: &Map<String, Value>, key: &str, default: i64) -> Result<i64, String> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => as_int(v).ok_or_else(|| format!("parameter '{key}' must be a number, got {v}")),
    }
}

fn as_int(v: &Value) -> Option<i64> {
    v.as_i64()
        .or_else(|| v.as_f64().map(|f| f.round() as i64))
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

fn count_param(params: &Map<String, Value>, key: &str, default: usize) -> Result<usize, String> {
    let value = int_param(params, key, default as i64)?;
    usize::try_from(value).map_err(|_| format!("parameter '{key}' must not be negative, got {value}"))
}

fn rating(node: &Node, key: &str) -> i64 {
    node.attributes.get(key).and_then(as_int).unwrap_or(1)
}

// ─── FMEA ────────────────────────────────────────────────────────────────────

/// Risk priority number per failure mode: severity × occurrence × detection.
pub struct FmeaRiskAnalysis;

impl FmeaRiskAnalysis {
    pub fn risk_level(rpn: i64, threshold: i64) -> &'static str {
        if rpn >= 200 {
            "critical"
        } else if rpn >= threshold {
            "high"
        } else if rpn >= 50 {
            "medium"
        } else {
            "low"
        }
    }

    fn rpn(node: &Node) -> Result<i64, String> {
        let (s, o, d) = (
            rating(node, "severity"),
            rating(node, "occurrence"),
            rating(node, "detection"),
        );
        s.checked_mul(o)
            .and_then(|so| so.checked_mul(d))
            .ok_or_else(|| {
                format!(
                    "RPN of '{}' is out of range (severity {s}, occurrence {o}, detection {d})",
                    node.id
                )
            })
    }
}

impl Algorithm for FmeaRiskAnalysis {
    fn name(&self) -> &str {
        "fmea_risk_analysis"
    }

    fn description(&self) -> &str {
        "Calculates RPN and identifies high-risk failure modes"
    }

    fn run(&self, graph: &Graph, params: &Map<String, Value>) -> Result<AlgorithmOutput, String> {
        let threshold = int_param(params, "rpn_threshold", 100)?;
        let mut annotated = graph.clone();
        let mut high_risk = Vec::new();
        let mut analyzed = 0usize;

        for node in annotated
            .nodes
            .iter_mut()
            .filter(|n| n.layer == Layer::Failure)
        {
            analyzed += 1;
            let rpn = Self::rpn(node)?;
            node.attributes.insert("rpn".into(), json!(rpn));
            node.attributes
                .insert("risk_level".into(), json!(Self::risk_level(rpn, threshold)));
            if rpn >= threshold {
                let component = node
                    .attributes
                    .get("component")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                high_risk.push(json!({
                    "node_id": node.id,
                    "rpn": rpn,
                    "component": component,
                    "failure_mode": node.display_label(),
                }));
            }
        }
        high_risk.sort_by_key(|entry| std::cmp::Reverse(entry["rpn"].as_i64().unwrap_or(0)));

        let mut results = Map::new();
        results.insert("high_risk_failures".into(), Value::Array(high_risk));
        results.insert("total_analyzed".into(), json!(analyzed));
        results.insert("threshold".into(), json!(threshold));
        Ok(AlgorithmOutput {
            results,
            updated_graph: Some(annotated),
        })
    }
}

// ─── Failure propagation ─────────────────────────────────────────────────────

/// Bounded reachability along the failure-to-failure relation.
pub struct FailurePropagation {
    rules: RuleSet,
}

impl FailurePropagation {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    fn relation(&self) -> &str {
        self.rules
            .rule_for_pair(&Layer::Failure, &Layer::Failure)
            .map_or(FAILURE_PROPAGATION, |r| r.relation.as_str())
    }
}

impl Algorithm for FailurePropagation {
    fn name(&self) -> &str {
        "failure_propagation"
    }

    fn description(&self) -> &str {
        "Traces failure propagation paths through the system"
    }

    fn run(&self, graph: &Graph, params: &Map<String, Value>) -> Result<AlgorithmOutput, String> {
        let max_depth = count_param(params, "max_depth", 5)?;

        let tree = hierarchy::build(&graph.nodes, &graph.edges, &self.rules);
        let relation_graph = tree.relation_graph(self.relation());

        let mut paths: Vec<Value> = Vec::new();
        let mut most_critical: Option<(usize, usize)> = None;
        for node in graph.nodes.iter().filter(|n| n.layer == Layer::Failure) {
            let reachable = relation_graph.reachable_within(&node.id, max_depth);
            if reachable.is_empty() {
                continue;
            }
            if most_critical.is_none_or(|(_, best)| reachable.len() > best) {
                most_critical = Some((paths.len(), reachable.len()));
            }
            let reached: Vec<Value> = reachable
                .iter()
                .map(|(id, depth)| json!({ "node_id": id, "depth": depth }))
                .collect();
            paths.push(json!({
                "source": node.id,
                "affected_nodes": reachable.len(),
                "reachable": reached,
            }));
        }

        let most_critical = most_critical
            .map(|(i, _)| paths[i].clone())
            .unwrap_or(Value::Null);
        let mut results = Map::new();
        results.insert("propagation_paths".into(), Value::Array(paths));
        results.insert("most_critical".into(), most_critical);
        Ok(AlgorithmOutput {
            results,
            updated_graph: None,
        })
    }
}

// ─── Critical components ─────────────────────────────────────────────────────

/// Nodes above this betweenness score are flagged `is_critical`.
const CRITICAL_CENTRALITY: f64 = 0.1;

/// Ranks nodes by betweenness centrality over the whole diagram.
pub struct CriticalComponents;

impl Algorithm for CriticalComponents {
    fn name(&self) -> &str {
        "critical_components"
    }

    fn description(&self) -> &str {
        "Identifies critical components based on network centrality"
    }

    fn run(&self, graph: &Graph, params: &Map<String, Value>) -> Result<AlgorithmOutput, String> {
        let top_n = count_param(params, "top_n", 5)?;
        let topology = RelationGraph::from_edges(graph.nodes.iter().map(|n| n.id.as_str()), &graph.edges);
        let scores: HashMap<String, f64> = topology.betweenness_centrality().into_iter().collect();

        let mut annotated = graph.clone();
        for node in &mut annotated.nodes {
            let score = scores.get(&node.id).copied().unwrap_or(0.0);
            node.attributes.insert("centrality_score".into(), json!(score));
            node.attributes
                .insert("is_critical".into(), json!(score > CRITICAL_CENTRALITY));
        }

        let mut ranked: Vec<&Node> = annotated.nodes.iter().collect();
        ranked.sort_by(|a, b| {
            let score = |n: &Node| scores.get(&n.id).copied().unwrap_or(0.0);
            score(b).total_cmp(&score(a))
        });
        let critical: Vec<Value> = ranked
            .into_iter()
            .take(top_n)
            .map(|node| {
                let kind = if node.kind.is_empty() { "unknown" } else { node.kind.as_str() };
                json!({
                    "node_id": node.id,
                    "component": node.display_label(),
                    "centrality_score": scores.get(&node.id).copied().unwrap_or(0.0),
                    "type": kind,
                })
            })
            .collect();

        let average = if scores.is_empty() {
            0.0
        } else {
            scores.values().sum::<f64>() / scores.len() as f64
        };
        debug!(nodes = scores.len(), average, "betweenness computed");

        let mut results = Map::new();
        results.insert("critical_components".into(), Value::Array(critical));
        results.insert("average_centrality".into(), json!(average));
        Ok(AlgorithmOutput {
            results,
            updated_graph: Some(annotated),
        })
    }
}
