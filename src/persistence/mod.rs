//! Persistence gateway — save/update/load/list/delete of diagram documents.
//!
//! No retries and no conflict detection: the last write wins.

pub mod memory;
#[cfg(not(target_arch = "wasm32"))]
pub mod file;

pub use memory::MemoryGateway;
#[cfg(not(target_arch = "wasm32"))]
pub use file::FileGateway;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::PersistenceError;
use crate::model::Graph;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedDiagram {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatedDiagram {
    pub name: String,
}

/// A loaded diagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramRecord {
    pub id: String,
    pub name: String,
    pub domain: String,
    pub graph: Graph,
}

/// One row of `list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramSummary {
    pub id: String,
    pub name: String,
    pub domain: String,
    pub node_count: usize,
    pub edge_count: usize,
    /// RFC 3339.
    pub updated_at: String,
}

/// What a gateway keeps per diagram. Also the on-disk format of `FileGateway`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDiagram {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub domain: String,
    pub graph: Graph,
    pub created_at: String,
    pub updated_at: String,
}

impl StoredDiagram {
    pub fn new(id: String, name: &str, description: &str, graph: Graph, domain: &str) -> Self {
        let now = now_rfc3339();
        Self {
            id,
            name: name.to_string(),
            description: description.to_string(),
            domain: domain.to_string(),
            graph,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Replace the graph (and optionally the name) and restamp `updated_at`.
    pub fn update(&mut self, graph: Graph, name: Option<&str>) {
        self.graph = graph;
        if let Some(name) = name {
            self.name = name.to_string();
        }
        self.updated_at = now_rfc3339();
    }

    pub fn record(&self) -> DiagramRecord {
        DiagramRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            domain: self.domain.clone(),
            graph: self.graph.clone(),
        }
    }

    pub fn summary(&self) -> DiagramSummary {
        DiagramSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            domain: self.domain.clone(),
            node_count: self.graph.node_count(),
            edge_count: self.graph.edge_count(),
            updated_at: self.updated_at.clone(),
        }
    }
}

#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn save(
        &self,
        name: &str,
        description: &str,
        graph: &Graph,
        domain: &str,
    ) -> Result<SavedDiagram, PersistenceError>;

    async fn update(
        &self,
        id: &str,
        graph: &Graph,
        name: Option<&str>,
    ) -> Result<UpdatedDiagram, PersistenceError>;

    async fn load(&self, id: &str) -> Result<DiagramRecord, PersistenceError>;

    /// Summaries, most recently updated first, optionally filtered by domain.
    async fn list(&self, domain: Option<&str>) -> Result<Vec<DiagramSummary>, PersistenceError>;

    async fn delete(&self, id: &str) -> Result<(), PersistenceError>;
}

pub(crate) fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

/// Newest first; ties broken by name so listings are stable.
pub(crate) fn sort_summaries(summaries: &mut [DiagramSummary]) {
    summaries.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| a.name.cmp(&b.name))
    });
}
