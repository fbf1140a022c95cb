//! Reparent engine — validated edge replacement for a single move.
//!
//! A move is all-or-nothing: every precondition is checked against the
//! current store before anything is touched, and the edge swap itself runs
//! under one hierarchy rebuild.

use serde::Serialize;
use tracing::info;

use crate::error::ReparentError;
use crate::model::Edge;
use crate::rules::ClassificationRule;
use crate::store::GraphStore;

/// What a successful move changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReparentOutcome {
    /// Every edge `* -> node` of the moved relation, including duplicates
    /// left behind by manual connects.
    pub removed: Vec<Edge>,
    pub added: Edge,
}

/// Check that `node_id` may be moved under `new_parent_id` along `relation`.
///
/// Errors are reported in a fixed order: unknown relation, missing node,
/// self-parent, then layer mismatch.
pub fn check_move<'a>(
    store: &'a GraphStore,
    node_id: &str,
    new_parent_id: &str,
    relation: &str,
) -> Result<&'a ClassificationRule, ReparentError> {
    let rule = store
        .rules()
        .rule_for_relation(relation)
        .ok_or_else(|| ReparentError::UnknownRelation(relation.to_string()))?;

    let node = store
        .node(node_id)
        .ok_or_else(|| ReparentError::NodeNotFound(node_id.to_string()))?;
    let parent = store
        .node(new_parent_id)
        .ok_or_else(|| ReparentError::NodeNotFound(new_parent_id.to_string()))?;

    if node_id == new_parent_id {
        return Err(ReparentError::SelfParent(node_id.to_string()));
    }

    if parent.layer != rule.source_layer || node.layer != rule.target_layer {
        return Err(ReparentError::IncompatibleRelation {
            relation: relation.to_string(),
            expected_source: rule.source_layer.clone(),
            expected_target: rule.target_layer.clone(),
            parent_layer: parent.layer.clone(),
            child_layer: node.layer.clone(),
        });
    }
    Ok(rule)
}

/// Move `node_id` under `new_parent_id` along `relation`.
///
/// Removes every incoming `relation` edge of the node and appends one
/// `new_parent -> node` edge with a fresh id. Nodes are not touched.
pub fn move_node(
    store: &mut GraphStore,
    node_id: &str,
    new_parent_id: &str,
    relation: &str,
) -> Result<ReparentOutcome, ReparentError> {
    check_move(store, node_id, new_parent_id, relation)?;

    let added = Edge::new(store.fresh_edge_id(relation), new_parent_id, node_id, relation);
    let removed = store.replace_incoming(node_id, relation, added.clone());

    info!(
        node = node_id,
        parent = new_parent_id,
        relation,
        removed = removed.len(),
        "node reparented"
    );
    Ok(ReparentOutcome { removed, added })
}
