//! Hierarchy derivation — flat graph + rule table → per-relation parent/child buckets.
//!
//! `build` is a pure function: it owns no state between calls, so calling
//! it twice on the same input yields equal trees. Malformed input (edges to
//! missing nodes, duplicate parents, cycles) is tolerated and reported, never
//! rejected.

pub mod outline;
pub mod relation;

pub use outline::{OutlineRow, render_outline};
pub use relation::RelationGraph;

use std::collections::{HashMap, HashSet};

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use tracing::debug;

use crate::model::{Edge, Layer, Node};
use crate::rules::RuleSet;

/// parent id → ordered set of child ids, for one relation.
pub type Bucket = IndexMap<String, IndexSet<String>>;

/// Derived, never-persisted view of a graph.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct HierarchyTree {
    /// relation → bucket. Every configured relation has an entry, possibly empty.
    pub buckets: IndexMap<String, Bucket>,
    /// Root-layer nodes with no incoming root-relation edge, in node order.
    pub roots: Vec<String>,
    /// Non-root layer → nodes of that layer with no incoming classified edge.
    pub orphans: IndexMap<Layer, Vec<String>>,
    /// Ids of edges whose layer pair or relation matched no rule.
    pub unclassified: Vec<String>,
    /// Ids of edges dropped because an endpoint does not exist.
    pub dangling: Vec<String>,
}

/// A node recorded under more than one parent in a single relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateParent {
    pub relation: String,
    pub child: String,
    pub parents: Vec<String>,
}

// ─── Builder ─────────────────────────────────────────────────────────────────

/// Classify every edge against `rules` and derive roots and orphans.
pub fn build(nodes: &[Node], edges: &[Edge], rules: &RuleSet) -> HierarchyTree {
    let by_id: HashMap<&str, &Node> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();

    let mut tree = HierarchyTree::default();
    for rule in rules.rules() {
        tree.buckets.insert(rule.relation.clone(), Bucket::new());
    }

    let mut linked: HashSet<&str> = HashSet::new();
    for edge in edges {
        let (Some(source), Some(target)) = (
            by_id.get(edge.source.as_str()),
            by_id.get(edge.target.as_str()),
        ) else {
            debug!(edge = %edge.id, "dropping edge with a missing endpoint");
            tree.dangling.push(edge.id.clone());
            continue;
        };

        if !rules.classifies(&source.layer, &target.layer, &edge.relation) {
            tree.unclassified.push(edge.id.clone());
            continue;
        }

        tree.buckets
            .entry(edge.relation.clone())
            .or_default()
            .entry(source.id.clone())
            .or_default()
            .insert(target.id.clone());
        linked.insert(target.id.as_str());
    }

    let root_children: HashSet<&str> = tree
        .buckets
        .get(rules.root_relation())
        .map(|bucket| bucket.values().flatten().map(String::as_str).collect())
        .unwrap_or_default();

    let root_layer = rules.root_layer();
    tree.roots = nodes
        .iter()
        .filter(|n| &n.layer == root_layer && !root_children.contains(n.id.as_str()))
        .map(|n| n.id.clone())
        .collect();

    for layer in rules.orphan_layers() {
        let orphans = nodes
            .iter()
            .filter(|n| &n.layer == layer && !linked.contains(n.id.as_str()))
            .map(|n| n.id.clone())
            .collect();
        tree.orphans.insert(layer.clone(), orphans);
    }

    debug!(
        roots = tree.roots.len(),
        unclassified = tree.unclassified.len(),
        dangling = tree.dangling.len(),
        "hierarchy rebuilt"
    );
    tree
}

// ─── Queries ─────────────────────────────────────────────────────────────────

impl HierarchyTree {
    pub fn bucket(&self, relation: &str) -> Option<&Bucket> {
        self.buckets.get(relation)
    }

    /// Children of `parent` along `relation`, in insertion order.
    pub fn children(&self, relation: &str, parent: &str) -> Vec<&str> {
        self.buckets
            .get(relation)
            .and_then(|bucket| bucket.get(parent))
            .map(|children| children.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Every parent that lists `child` along `relation`.
    pub fn parents_of(&self, relation: &str, child: &str) -> Vec<&str> {
        self.buckets
            .get(relation)
            .map(|bucket| {
                bucket
                    .iter()
                    .filter(|(_, children)| children.contains(child))
                    .map(|(parent, _)| parent.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// True when `id` is a child in any bucket.
    pub fn has_parent(&self, id: &str) -> bool {
        self.buckets
            .values()
            .any(|bucket| bucket.values().any(|children| children.contains(id)))
    }

    pub fn is_root(&self, id: &str) -> bool {
        self.roots.iter().any(|r| r == id)
    }

    pub fn orphans_of(&self, layer: &Layer) -> &[String] {
        self.orphans.get(layer).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Nodes listed under more than one parent within a relation.
    pub fn duplicate_parents(&self) -> Vec<DuplicateParent> {
        let mut out = Vec::new();
        for (relation, bucket) in &self.buckets {
            let mut parents: IndexMap<&str, Vec<String>> = IndexMap::new();
            for (parent, children) in bucket {
                for child in children {
                    parents.entry(child.as_str()).or_default().push(parent.clone());
                }
            }
            for (child, parents) in parents {
                if parents.len() > 1 {
                    out.push(DuplicateParent {
                        relation: relation.clone(),
                        child: child.to_string(),
                        parents,
                    });
                }
            }
        }
        out
    }

    /// Petgraph view of one relation bucket.
    pub fn relation_graph(&self, relation: &str) -> RelationGraph {
        match self.buckets.get(relation) {
            Some(bucket) => RelationGraph::from_bucket(bucket),
            None => RelationGraph::default(),
        }
    }
}
