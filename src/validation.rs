//! Diagram validation — connectivity, allocation and structure checks.
//!
//! Every check is derived from the rule table: peer relations produce a
//! connectivity check for their layer, cross relations an allocation check
//! for their target layer. Only `error` checks make a report invalid;
//! warnings are reported and let algorithms proceed.

use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::hierarchy;
use crate::model::{Graph, Layer, Node};
use crate::rules::{ClassificationRule, RuleSet};

static LEADING_ICON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\p{L}\p{N}]+").expect("leading icon pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warn,
    Info,
    Error,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CheckStatus::Pass => "pass",
            CheckStatus::Warn => "warn",
            CheckStatus::Info => "info",
            CheckStatus::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    pub check: String,
    pub status: CheckStatus,
    pub message: String,
    #[serde(default)]
    pub items: Vec<String>,
}

impl Check {
    fn new(check: impl Into<String>, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            status,
            message: message.into(),
            items: Vec::new(),
        }
    }

    fn with_items(mut self, items: Vec<String>) -> Self {
        self.items = items;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationStats {
    pub forms: usize,
    pub functions: usize,
    pub failures: usize,
    pub edges: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub summary: String,
    pub stats: ValidationStats,
    pub checks: Vec<Check>,
}

impl ValidationReport {
    pub fn count(&self, status: CheckStatus) -> usize {
        self.checks.iter().filter(|c| c.status == status).count()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|c| c.status == CheckStatus::Warn)
    }

    /// `error` and `warn` checks, in report order.
    pub fn problems(&self) -> impl Iterator<Item = &Check> {
        self.checks
            .iter()
            .filter(|c| matches!(c.status, CheckStatus::Error | CheckStatus::Warn))
    }
}

/// Validate `graph` against `rules`. Never mutates the graph.
pub fn validate_diagram(graph: &Graph, rules: &RuleSet) -> ValidationReport {
    let mut checks = Vec::new();

    for rule in rules.rules().iter().filter(|r| r.is_peer()) {
        connectivity(graph, rule, &mut checks);
    }
    for rule in rules.rules().iter().filter(|r| !r.is_peer()) {
        allocation(graph, rule, &mut checks);
    }

    let tree = hierarchy::build(&graph.nodes, &graph.edges, rules);
    for dup in tree.duplicate_parents() {
        checks.push(
            Check::new(
                "Single Parent",
                CheckStatus::Warn,
                format!(
                    "'{}' has {} parents via {}; a tree relation allows one.",
                    label_of(graph, &dup.child),
                    dup.parents.len(),
                    dup.relation
                ),
            )
            .with_items(dup.parents.iter().map(|p| label_of(graph, p)).collect()),
        );
    }
    for rule in rules.rules() {
        let cyclic = tree.relation_graph(&rule.relation).cyclic_nodes();
        if !cyclic.is_empty() {
            checks.push(
                Check::new(
                    format!("{} Cycles", title(&rule.relation)),
                    CheckStatus::Error,
                    format!(
                        "{} node(s) form a cycle in {}. Break the loop before running algorithms.",
                        cyclic.len(),
                        rule.relation
                    ),
                )
                .with_items(cyclic.iter().map(|id| label_of(graph, id)).collect()),
            );
        }
    }
    if !tree.unclassified.is_empty() {
        checks.push(
            Check::new(
                "Unclassified Edges",
                CheckStatus::Info,
                format!(
                    "{} edge(s) match no classification rule and are left out of the hierarchy.",
                    tree.unclassified.len()
                ),
            )
            .with_items(tree.unclassified.clone()),
        );
    }

    if graph.nodes.is_empty() {
        checks.push(Check::new(
            "Diagram Content",
            CheckStatus::Error,
            "The diagram is empty. Add Form, Function and Failure nodes first.",
        ));
    }

    let errors = count(&checks, CheckStatus::Error);
    let warnings = count(&checks, CheckStatus::Warn);
    let passes = count(&checks, CheckStatus::Pass);
    let (valid, summary) = if checks.is_empty() {
        (
            false,
            "No nodes found matching the configured layers.".to_string(),
        )
    } else if errors > 0 {
        (
            false,
            format!("Validation FAILED: {errors} error(s), {warnings} warning(s)."),
        )
    } else if warnings > 0 {
        (
            true,
            format!("Validation PASSED with {warnings} warning(s). Graph algorithms can proceed."),
        )
    } else {
        (
            true,
            format!("Validation PASSED: {passes} check(s) OK. Graph algorithms can proceed."),
        )
    };

    ValidationReport {
        valid,
        summary,
        stats: stats(graph),
        checks,
    }
}

// ─── Checks ──────────────────────────────────────────────────────────────────

/// Nodes of a peer layer that take part in no edge of the peer relation.
///
/// A node with no incoming edge of the relation is a root and may stand alone.
fn connectivity(graph: &Graph, rule: &ClassificationRule, checks: &mut Vec<Check>) {
    let layer = &rule.source_layer;
    let members = layer_nodes(graph, layer);
    if members.is_empty() {
        return;
    }

    let mut linked: HashSet<&str> = HashSet::new();
    let mut children: HashSet<&str> = HashSet::new();
    for edge in graph.edges.iter().filter(|e| e.relation == rule.relation) {
        linked.insert(&edge.source);
        linked.insert(&edge.target);
        children.insert(&edge.target);
    }

    let (unlinked_roots, unlinked_inner): (Vec<&Node>, Vec<&Node>) = members
        .into_iter()
        .filter(|n| !linked.contains(n.id.as_str()))
        .partition(|n| !children.contains(n.id.as_str()));

    let name = layer.display_name();
    if unlinked_roots.is_empty() && unlinked_inner.is_empty() {
        checks.push(Check::new(
            format!("{name} Connectivity"),
            CheckStatus::Pass,
            format!("All {}s are connected via {}.", layer.as_str(), rule.relation),
        ));
        return;
    }
    if !unlinked_inner.is_empty() {
        checks.push(
            Check::new(
                format!("{name} Connectivity"),
                CheckStatus::Warn,
                format!(
                    "{} {}(s) have no {} connections.",
                    unlinked_inner.len(),
                    layer.as_str(),
                    rule.relation
                ),
            )
            .with_items(labels(&unlinked_inner)),
        );
    }
    if !unlinked_roots.is_empty() {
        checks.push(
            Check::new(
                format!("Standalone {name}s"),
                CheckStatus::Info,
                format!(
                    "{} root {}(s) are standalone (top-level items may remain independent).",
                    unlinked_roots.len(),
                    layer.as_str()
                ),
            )
            .with_items(labels(&unlinked_roots)),
        );
    }
}

/// Target-layer nodes with no incoming edge of a cross relation.
fn allocation(graph: &Graph, rule: &ClassificationRule, checks: &mut Vec<Check>) {
    let layer = &rule.target_layer;
    let members = layer_nodes(graph, layer);
    if members.is_empty() {
        return;
    }

    let allocated: HashSet<&str> = graph
        .edges
        .iter()
        .filter(|e| e.relation == rule.relation)
        .map(|e| e.target.as_str())
        .collect();
    let unallocated: Vec<&Node> = members
        .into_iter()
        .filter(|n| !allocated.contains(n.id.as_str()))
        .collect();

    let name = layer.display_name();
    let source = rule.source_layer.as_str();
    if unallocated.is_empty() {
        checks.push(Check::new(
            format!("{name} Allocation"),
            CheckStatus::Pass,
            format!("All {}s are allocated to at least one {source}.", layer.as_str()),
        ));
    } else {
        checks.push(
            Check::new(
                format!("{name} Allocation"),
                CheckStatus::Warn,
                format!(
                    "{} {}(s) are not allocated to any {source} (no {} edge).",
                    unallocated.len(),
                    layer.as_str(),
                    rule.relation
                ),
            )
            .with_items(labels(&unallocated)),
        );
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn count(checks: &[Check], status: CheckStatus) -> usize {
    checks.iter().filter(|c| c.status == status).count()
}

fn layer_nodes<'a>(graph: &'a Graph, layer: &Layer) -> Vec<&'a Node> {
    graph.nodes.iter().filter(|n| &n.layer == layer).collect()
}

fn stats(graph: &Graph) -> ValidationStats {
    let of = |layer: Layer| graph.nodes.iter().filter(|n| n.layer == layer).count();
    ValidationStats {
        forms: of(Layer::Form),
        functions: of(Layer::Function),
        failures: of(Layer::Failure),
        edges: graph.edges.len(),
    }
}

fn labels(nodes: &[&Node]) -> Vec<String> {
    nodes.iter().map(|n| clean_label(n.display_label())).collect()
}

fn label_of(graph: &Graph, id: &str) -> String {
    graph
        .node(id)
        .map(|n| clean_label(n.display_label()))
        .unwrap_or_else(|| id.to_string())
}

/// Strip leading icons and punctuation from a label.
pub fn clean_label(label: &str) -> String {
    let trimmed = label.trim();
    let stripped = LEADING_ICON.replace(trimmed, "");
    if stripped.is_empty() {
        trimmed.to_string()
    } else {
        stripped.into_owned()
    }
}

fn title(relation: &str) -> String {
    Layer::from(relation).display_name()
}
