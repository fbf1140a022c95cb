//! Depth-first outline of a hierarchy, as consumed by a tree view.
//!
//! Walk order: roots first (root relation, then the other relations leaving
//! the root layer, then peer relations of each child), then parentless
//! nodes, then whatever is left, which can only be nodes trapped in
//! parentless cycles. A visited set guarantees termination; a node reached a
//! second time is emitted once more as a `repeated` row and not descended.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::HierarchyTree;
use crate::model::Node;
use crate::rules::RuleSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutlineRow {
    pub depth: usize,
    pub node_id: String,
    pub label: String,
    /// Relation that led to this row; `None` for top-level rows.
    pub via: Option<String>,
    /// Node already listed above (second parent or cycle back-edge).
    pub repeated: bool,
}

impl HierarchyTree {
    pub fn outline(&self, nodes: &[Node], rules: &RuleSet) -> Vec<OutlineRow> {
        let by_id: HashMap<&str, &Node> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();
        let mut walk = Walk {
            tree: self,
            rules,
            by_id,
            visited: HashSet::new(),
            rows: Vec::new(),
        };

        for root in &self.roots {
            walk.visit(root, 0, None);
        }
        for node in nodes {
            if !walk.visited.contains(node.id.as_str()) && !self.has_parent(&node.id) {
                walk.visit(&node.id, 0, None);
            }
        }
        for node in nodes {
            if !walk.visited.contains(node.id.as_str()) {
                walk.visit(&node.id, 0, None);
            }
        }
        walk.rows
    }
}

/// Render outline rows as an indented text tree.
pub fn render_outline(rows: &[OutlineRow]) -> String {
    let mut out = String::new();
    for row in rows {
        out.push_str(&"  ".repeat(row.depth));
        out.push_str(&row.label);
        if row.label != row.node_id {
            out.push_str(&format!(" [{}]", row.node_id));
        }
        if let Some(via) = &row.via {
            out.push_str(&format!(" ({via})"));
        }
        if row.repeated {
            out.push_str(" ↺");
        }
        out.push('\n');
    }
    out
}

struct Walk<'a> {
    tree: &'a HierarchyTree,
    rules: &'a RuleSet,
    by_id: HashMap<&'a str, &'a Node>,
    visited: HashSet<String>,
    rows: Vec<OutlineRow>,
}

impl<'a> Walk<'a> {
    /// Pre-order walk from `start`. Uses an explicit stack so chain depth is
    /// bounded by memory, not by the call stack.
    fn visit(&mut self, start: &'a str, depth: usize, via: Option<&'a str>) {
        let mut stack = vec![(start, depth, via)];
        while let Some((id, depth, via)) = stack.pop() {
            let Some(&node) = self.by_id.get(id) else {
                continue;
            };
            let repeated = !self.visited.insert(id.to_string());
            self.rows.push(OutlineRow {
                depth,
                node_id: id.to_string(),
                label: node.display_label().to_string(),
                via: via.map(str::to_string),
                repeated,
            });
            if repeated {
                continue;
            }
            let mut next = Vec::new();
            for rule in self.rules.rules_from(&node.layer) {
                for child in self.tree.children(&rule.relation, id) {
                    next.push((child, depth + 1, Some(rule.relation.as_str())));
                }
            }
            stack.extend(next.into_iter().rev());
        }
    }
}
