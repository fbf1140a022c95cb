//! WASM bindings for fff-graph.
//!
//! Exposes `buildHierarchy`, `reparent` and `validateDiagram` to JavaScript
//! via wasm-bindgen. Graphs cross the boundary as `{nodes, edges}` JSON
//! strings; all three use the reference Form/Function/Failure rules.

use wasm_bindgen::prelude::*;

use crate::model::Graph;
use crate::rules::RuleSet;
use crate::store::GraphStore;

fn parse(graph_json: &str) -> Result<Graph, JsError> {
    Graph::from_json(graph_json).map_err(|e| JsError::new(&e.to_string()))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JsError> {
    serde_json::to_string(value).map_err(|e| JsError::new(&e.to_string()))
}

/// Derive the hierarchy tree of a graph. Returns the tree as JSON.
#[wasm_bindgen(js_name = "buildHierarchy")]
pub fn build_hierarchy(graph_json: &str) -> Result<String, JsError> {
    let graph = parse(graph_json)?;
    let tree = crate::hierarchy::build(&graph.nodes, &graph.edges, &RuleSet::reference());
    to_json(&tree)
}

/// Move `node_id` under `new_parent_id` along `relation`.
///
/// Returns the updated graph as JSON, or throws with the rejection reason.
#[wasm_bindgen]
pub fn reparent(
    graph_json: &str,
    node_id: &str,
    new_parent_id: &str,
    relation: &str,
) -> Result<String, JsError> {
    let graph = parse(graph_json)?;
    let mut store =
        GraphStore::from_graph(graph, RuleSet::reference()).map_err(|e| JsError::new(&e.to_string()))?;
    store
        .reparent(node_id, new_parent_id, relation)
        .map_err(|e| JsError::new(&e.to_string()))?;
    to_json(store.graph())
}

/// Run the diagram checks. Returns the validation report as JSON.
#[wasm_bindgen(js_name = "validateDiagram")]
pub fn validate_diagram(graph_json: &str) -> Result<String, JsError> {
    let graph = parse(graph_json)?;
    to_json(&crate::validation::validate_diagram(&graph, &RuleSet::reference()))
}
