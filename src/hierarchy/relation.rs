//! RelationGraph — one relation bucket as a petgraph DiGraph.
//!
//! Used for the topology questions the bucket maps cannot answer directly:
//! cycle detection for validation, bounded reachability for propagation
//! analysis and betweenness centrality for critical-component ranking.

use std::collections::{HashMap, VecDeque};

use petgraph::Direction;
use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};

use super::Bucket;
use crate::model::Edge;

#[derive(Debug, Clone, Default)]
pub struct RelationGraph {
    pub digraph: DiGraph<String, ()>,
    /// Maps node id → petgraph NodeIndex.
    pub node_index: HashMap<String, NodeIndex>,
}

impl RelationGraph {
    pub fn from_bucket(bucket: &Bucket) -> Self {
        let mut g = Self::default();
        for (parent, children) in bucket {
            let p = g.ensure_node(parent);
            for child in children {
                let c = g.ensure_node(child);
                g.digraph.add_edge(p, c, ());
            }
        }
        g
    }

    /// Every node in `ids`, linked by every edge whose endpoints are both
    /// present. Parallel edges collapse into one.
    pub fn from_edges<'a>(ids: impl IntoIterator<Item = &'a str>, edges: &[Edge]) -> Self {
        let mut g = Self::default();
        for id in ids {
            g.ensure_node(id);
        }
        for edge in edges {
            let (Some(&s), Some(&t)) = (g.node_index.get(&edge.source), g.node_index.get(&edge.target))
            else {
                continue;
            };
            g.digraph.update_edge(s, t, ());
        }
        g
    }

    fn ensure_node(&mut self, id: &str) -> NodeIndex {
        if let Some(&idx) = self.node_index.get(id) {
            return idx;
        }
        let idx = self.digraph.add_node(id.to_string());
        self.node_index.insert(id.to_string(), idx);
        idx
    }

    pub fn node_count(&self) -> usize {
        self.digraph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.digraph.edge_count()
    }

    /// Returns true if the relation contains no directed cycles.
    pub fn is_dag(&self) -> bool {
        !is_cyclic_directed(&self.digraph)
    }

    /// Ids of every node that sits on a cycle (self-loops included), sorted.
    pub fn cyclic_nodes(&self) -> Vec<String> {
        let mut ids: Vec<String> = tarjan_scc(&self.digraph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1 || scc.iter().any(|&idx| self.digraph.contains_edge(idx, idx))
            })
            .flatten()
            .map(|idx| self.digraph[idx].clone())
            .collect();
        ids.sort();
        ids
    }

    /// Nodes reachable from `start` within `max_depth` hops, with their depth,
    /// in breadth-first order. `start` itself is not included.
    pub fn reachable_within(&self, start: &str, max_depth: usize) -> Vec<(String, usize)> {
        let Some(&start_idx) = self.node_index.get(start) else {
            return Vec::new();
        };
        let mut seen = vec![false; self.digraph.node_count()];
        seen[start_idx.index()] = true;
        let mut queue = VecDeque::from([(start_idx, 0usize)]);
        let mut out = Vec::new();
        while let Some((idx, depth)) = queue.pop_front() {
            if depth == max_depth {
                continue;
            }
            for next in self.digraph.neighbors_directed(idx, Direction::Outgoing) {
                if !seen[next.index()] {
                    seen[next.index()] = true;
                    out.push((self.digraph[next].clone(), depth + 1));
                    queue.push_back((next, depth + 1));
                }
            }
        }
        out
    }

    /// Normalised betweenness centrality of every node (Brandes), in
    /// insertion order. Scores are scaled by `1 / ((n-1)(n-2))`.
    pub fn betweenness_centrality(&self) -> Vec<(String, f64)> {
        let n = self.digraph.node_count();
        let mut centrality = vec![0.0f64; n];

        for s in self.digraph.node_indices() {
            let mut order = Vec::with_capacity(n);
            let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
            let mut sigma = vec![0.0f64; n];
            let mut dist: Vec<Option<usize>> = vec![None; n];
            sigma[s.index()] = 1.0;
            dist[s.index()] = Some(0);

            let mut queue = VecDeque::from([(s, 0usize)]);
            while let Some((v, dv)) = queue.pop_front() {
                order.push(v.index());
                for w in self.digraph.neighbors_directed(v, Direction::Outgoing) {
                    let wi = w.index();
                    if dist[wi].is_none() {
                        dist[wi] = Some(dv + 1);
                        queue.push_back((w, dv + 1));
                    }
                    if dist[wi] == Some(dv + 1) {
                        sigma[wi] += sigma[v.index()];
                        preds[wi].push(v.index());
                    }
                }
            }

            let mut delta = vec![0.0f64; n];
            while let Some(w) = order.pop() {
                for &v in &preds[w] {
                    delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
                }
                if w != s.index() {
                    centrality[w] += delta[w];
                }
            }
        }

        let scale = if n > 2 {
            1.0 / ((n - 1) * (n - 2)) as f64
        } else {
            1.0
        };
        self.digraph
            .node_indices()
            .map(|idx| (self.digraph[idx].clone(), centrality[idx.index()] * scale))
            .collect()
    }
}
