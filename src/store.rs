//! GraphStore — the canonical in-memory graph of one open diagram.
//!
//! Every mutation goes through an explicit method. Structural mutations
//! rebuild the `HierarchyTree` before returning, so `hierarchy()` is never
//! stale. Each mutation also bumps `revision`, which lets the orchestrator
//! notice edits that landed while an algorithm was running.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{GraphError, ReparentError};
use crate::hierarchy::{self, HierarchyTree};
use crate::model::{Edge, Graph, Node, Position};
use crate::reparent::{self, ReparentOutcome};
use crate::rules::RuleSet;

/// A store shared between the editing session and the orchestrator.
pub type SharedGraphStore = Arc<RwLock<GraphStore>>;

/// User-intent events emitted by the render adapter (the diagram canvas).
#[derive(Debug, Clone, PartialEq)]
pub enum UserIntent {
    /// Draw an edge. Not constrained by the single-parent invariant.
    Connect {
        source: String,
        target: String,
        relation: String,
    },
    /// Drag a node. Position only; no structural change.
    Move { node_id: String, position: Position },
    /// Delete nodes (with their incident edges) and/or edges.
    Delete { ids: Vec<String> },
    Select { ids: Vec<String> },
    Relabel { node_id: String, label: String },
}

#[derive(Debug, Clone)]
pub struct GraphStore {
    graph: Graph,
    rules: RuleSet,
    tree: HierarchyTree,
    /// Maps node id → position in `graph.nodes`.
    node_index: HashMap<String, usize>,
    edge_ids: HashSet<String>,
    selection: Vec<String>,
    revision: u64,
}

// ── Construction ─────────────────────────────────────────────────────────────

impl GraphStore {
    /// Create an empty store.
    pub fn new(rules: RuleSet) -> Self {
        let tree = hierarchy::build(&[], &[], &rules);
        Self {
            graph: Graph::default(),
            rules,
            tree,
            node_index: HashMap::new(),
            edge_ids: HashSet::new(),
            selection: Vec::new(),
            revision: 0,
        }
    }

    /// Hydrate from a loaded or imported document.
    ///
    /// Ids must be unique. Edges pointing at missing nodes are kept (the
    /// hierarchy ignores them) since upstream data may be stale.
    pub fn from_graph(graph: Graph, rules: RuleSet) -> Result<Self, GraphError> {
        let mut store = Self::new(rules);
        store.replace_graph(graph)?;
        store.revision = 0;
        Ok(store)
    }

    pub fn into_shared(self) -> SharedGraphStore {
        Arc::new(RwLock::new(self))
    }
}

// ── Queries ──────────────────────────────────────────────────────────────────

impl GraphStore {
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Owned copy of the current graph, for collaborators.
    pub fn snapshot(&self) -> Graph {
        self.graph.clone()
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn hierarchy(&self) -> &HierarchyTree {
        &self.tree
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn selection(&self) -> &[String] {
        &self.selection
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.node_index.get(id).map(|&i| &self.graph.nodes[i])
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.graph.edge(id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    pub fn contains_edge(&self, id: &str) -> bool {
        self.edge_ids.contains(id)
    }

    /// A fresh edge id not present in the graph.
    pub fn fresh_edge_id(&self, relation: &str) -> String {
        loop {
            let id = format!("{relation}-{}", Uuid::new_v4().simple());
            if !self.edge_ids.contains(&id) {
                return id;
            }
        }
    }
}

// ── Mutation ─────────────────────────────────────────────────────────────────

impl GraphStore {
    pub fn add_node(&mut self, node: Node) -> Result<(), GraphError> {
        if self.contains_node(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        debug!(node = %node.id, layer = %node.layer, "add node");
        self.node_index.insert(node.id.clone(), self.graph.nodes.len());
        self.graph.nodes.push(node);
        self.refresh();
        Ok(())
    }

    /// Remove a node together with every edge touching it.
    pub fn remove_node(&mut self, id: &str) -> Result<Node, GraphError> {
        let Some(&pos) = self.node_index.get(id) else {
            return Err(GraphError::NodeNotFound(id.to_string()));
        };
        let node = self.graph.nodes.remove(pos);
        let (dropped, kept): (Vec<Edge>, Vec<Edge>) = std::mem::take(&mut self.graph.edges)
            .into_iter()
            .partition(|e| e.source == id || e.target == id);
        self.graph.edges = kept;
        for edge in &dropped {
            self.edge_ids.remove(&edge.id);
        }
        debug!(node = %id, edges = dropped.len(), "remove node");
        self.selection
            .retain(|s| s != id && !dropped.iter().any(|e| &e.id == s));
        self.reindex();
        self.refresh();
        Ok(node)
    }

    /// Add an edge. Both endpoints must exist; the id must be unused.
    pub fn add_edge(&mut self, edge: Edge) -> Result<(), GraphError> {
        if self.contains_edge(&edge.id) {
            return Err(GraphError::DuplicateEdge(edge.id));
        }
        for endpoint in [&edge.source, &edge.target] {
            if !self.contains_node(endpoint) {
                return Err(GraphError::NodeNotFound(endpoint.clone()));
            }
        }
        debug!(edge = %edge.id, relation = %edge.relation, "add edge");
        self.edge_ids.insert(edge.id.clone());
        self.graph.edges.push(edge);
        self.refresh();
        Ok(())
    }

    /// Add an edge with a fresh id and return that id.
    pub fn connect(&mut self, source: &str, target: &str, relation: &str) -> Result<String, GraphError> {
        let id = self.fresh_edge_id(relation);
        self.add_edge(Edge::new(id.clone(), source, target, relation))?;
        Ok(id)
    }

    pub fn remove_edge(&mut self, id: &str) -> Result<Edge, GraphError> {
        let Some(pos) = self.graph.edges.iter().position(|e| e.id == id) else {
            return Err(GraphError::EdgeNotFound(id.to_string()));
        };
        let edge = self.graph.edges.remove(pos);
        self.edge_ids.remove(id);
        self.selection.retain(|s| s != id);
        self.refresh();
        Ok(edge)
    }

    pub fn relabel(&mut self, id: &str, label: impl Into<String>) -> Result<(), GraphError> {
        let node = self.node_mut(id)?;
        node.label = label.into();
        self.refresh();
        Ok(())
    }

    /// Update a node's canvas position. Not structural: the tree is kept.
    pub fn set_position(&mut self, id: &str, position: Position) -> Result<(), GraphError> {
        self.node_mut(id)?.position = position;
        self.revision += 1;
        Ok(())
    }

    pub fn select(&mut self, ids: Vec<String>) {
        self.selection = ids;
    }

    /// Replace the whole graph (hydration, or an algorithm's `updated_graph`).
    ///
    /// On error the store is left unchanged.
    pub fn replace_graph(&mut self, graph: Graph) -> Result<(), GraphError> {
        let mut node_index = HashMap::with_capacity(graph.nodes.len());
        for (i, node) in graph.nodes.iter().enumerate() {
            if node_index.insert(node.id.clone(), i).is_some() {
                return Err(GraphError::DuplicateNode(node.id.clone()));
            }
        }
        let mut edge_ids = HashSet::with_capacity(graph.edges.len());
        for edge in &graph.edges {
            if !edge_ids.insert(edge.id.clone()) {
                return Err(GraphError::DuplicateEdge(edge.id.clone()));
            }
        }
        info!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "graph replaced"
        );
        self.graph = graph;
        self.node_index = node_index;
        self.edge_ids = edge_ids;
        self.selection
            .retain(|id| self.node_index.contains_key(id) || self.edge_ids.contains(id));
        self.refresh();
        Ok(())
    }

    /// Move `node_id` under `new_parent_id` along `relation`.
    pub fn reparent(
        &mut self,
        node_id: &str,
        new_parent_id: &str,
        relation: &str,
    ) -> Result<ReparentOutcome, ReparentError> {
        reparent::move_node(self, node_id, new_parent_id, relation)
    }

    /// Apply a render-adapter event.
    pub fn apply(&mut self, intent: UserIntent) -> Result<(), GraphError> {
        match intent {
            UserIntent::Connect {
                source,
                target,
                relation,
            } => self.connect(&source, &target, &relation).map(|_| ()),
            UserIntent::Move { node_id, position } => self.set_position(&node_id, position),
            UserIntent::Delete { ids } => {
                for id in ids {
                    if self.contains_node(&id) {
                        self.remove_node(&id)?;
                    } else if self.contains_edge(&id) {
                        self.remove_edge(&id)?;
                    }
                }
                Ok(())
            }
            UserIntent::Select { ids } => {
                self.select(ids);
                Ok(())
            }
            UserIntent::Relabel { node_id, label } => self.relabel(&node_id, label),
        }
    }

    /// Swap every `relation` edge into `node_id` for `new_edge`, in one rebuild.
    ///
    /// Callers have already checked the move; see `reparent::move_node`.
    pub(crate) fn replace_incoming(&mut self, node_id: &str, relation: &str, new_edge: Edge) -> Vec<Edge> {
        let (removed, kept): (Vec<Edge>, Vec<Edge>) = std::mem::take(&mut self.graph.edges)
            .into_iter()
            .partition(|e| e.target == node_id && e.relation == relation);
        self.graph.edges = kept;
        for edge in &removed {
            self.edge_ids.remove(&edge.id);
        }
        self.edge_ids.insert(new_edge.id.clone());
        self.graph.edges.push(new_edge);
        self.refresh();
        removed
    }

    fn node_mut(&mut self, id: &str) -> Result<&mut Node, GraphError> {
        match self.node_index.get(id) {
            Some(&i) => Ok(&mut self.graph.nodes[i]),
            None => Err(GraphError::NodeNotFound(id.to_string())),
        }
    }

    fn reindex(&mut self) {
        self.node_index = self
            .graph
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();
    }

    fn refresh(&mut self) {
        self.tree = hierarchy::build(&self.graph.nodes, &self.graph.edges, &self.rules);
        self.revision += 1;
    }
}
