//! Data model — layers, nodes, edges and the `{nodes, edges}` graph document.
//!
//! `Graph` is the export/import file format and the payload of every
//! analysis and persistence call. Field names match the JSON wire shape.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::GraphError;

// ─── Layer ───────────────────────────────────────────────────────────────────

/// Coarse category of a node.
///
/// Serialized as a lowercase string. Anything other than the three built-in
/// layers is kept verbatim as a domain-defined layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Layer {
    Form,
    Function,
    Failure,
    Other(String),
}

impl Layer {
    pub fn as_str(&self) -> &str {
        match self {
            Layer::Form => "form",
            Layer::Function => "function",
            Layer::Failure => "failure",
            Layer::Other(name) => name,
        }
    }

    /// Capitalized name used in report titles, e.g. "Function" or "Control Action".
    pub fn display_name(&self) -> String {
        self.as_str()
            .split(['_', '-', ' '])
            .filter(|word| !word.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl From<&str> for Layer {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "form" => Layer::Form,
            "function" => Layer::Function,
            "failure" => Layer::Failure,
            other => Layer::Other(other.to_string()),
        }
    }
}

impl From<String> for Layer {
    fn from(s: String) -> Self {
        Layer::from(s.as_str())
    }
}

impl From<Layer> for String {
    fn from(layer: Layer) -> Self {
        layer.as_str().to_string()
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Position ────────────────────────────────────────────────────────────────

/// Canvas coordinates. Owned by the render adapter; the core only carries them.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

// ─── Node ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub layer: Layer,
    #[serde(default)]
    pub label: String,
    /// Domain-specific node type, e.g. "failure_mode".
    #[serde(default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub position: Position,
}

impl Node {
    pub fn new(id: impl Into<String>, layer: Layer, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            layer,
            label: label.into(),
            kind: String::new(),
            attributes: Map::new(),
            position: Position::default(),
        }
    }

    /// Node whose label equals its id.
    pub fn bare(id: impl Into<String>, layer: Layer) -> Self {
        let id = id.into();
        let label = id.clone();
        Self::new(id, layer, label)
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Label for human-facing output, falling back to the id when blank.
    pub fn display_label(&self) -> &str {
        let label = self.label.trim();
        if label.is_empty() { self.id.as_str() } else { label }
    }
}

// ─── Edge ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    /// Edge-type tag, e.g. "form_hierarchy". The only field the core interprets.
    pub relation: String,
    /// Render-adapter styling, carried opaquely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Value>,
}

impl Edge {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            relation: relation.into(),
            style: None,
        }
    }
}

// ─── Graph ───────────────────────────────────────────────────────────────────

/// A flat node/edge document, in insertion order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Parse an exported `{nodes, edges}` file.
    pub fn from_json(src: &str) -> Result<Self, GraphError> {
        Ok(serde_json::from_str(src)?)
    }

    /// Export as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, GraphError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
