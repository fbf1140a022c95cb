//! In-memory gateway, for tests and throwaway sessions.

use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::{
    DiagramRecord, DiagramSummary, PersistenceGateway, SavedDiagram, StoredDiagram,
    UpdatedDiagram, sort_summaries,
};
use crate::error::PersistenceError;
use crate::model::Graph;

#[derive(Debug, Default)]
pub struct MemoryGateway {
    diagrams: Mutex<IndexMap<String, StoredDiagram>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.diagrams.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.diagrams.lock().await.is_empty()
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn save(
        &self,
        name: &str,
        description: &str,
        graph: &Graph,
        domain: &str,
    ) -> Result<SavedDiagram, PersistenceError> {
        let id = Uuid::new_v4().to_string();
        let stored = StoredDiagram::new(id.clone(), name, description, graph.clone(), domain);
        self.diagrams.lock().await.insert(id.clone(), stored);
        debug!(%id, name, "diagram saved");
        Ok(SavedDiagram {
            id,
            name: name.to_string(),
        })
    }

    async fn update(
        &self,
        id: &str,
        graph: &Graph,
        name: Option<&str>,
    ) -> Result<UpdatedDiagram, PersistenceError> {
        let mut diagrams = self.diagrams.lock().await;
        let stored = diagrams
            .get_mut(id)
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))?;
        stored.update(graph.clone(), name);
        debug!(id, "diagram updated");
        Ok(UpdatedDiagram {
            name: stored.name.clone(),
        })
    }

    async fn load(&self, id: &str) -> Result<DiagramRecord, PersistenceError> {
        self.diagrams
            .lock()
            .await
            .get(id)
            .map(StoredDiagram::record)
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))
    }

    async fn list(&self, domain: Option<&str>) -> Result<Vec<DiagramSummary>, PersistenceError> {
        let mut out: Vec<DiagramSummary> = self
            .diagrams
            .lock()
            .await
            .values()
            .filter(|d| domain.is_none_or(|want| d.domain == want))
            .map(StoredDiagram::summary)
            .collect();
        sort_summaries(&mut out);
        Ok(out)
    }

    async fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        self.diagrams
            .lock()
            .await
            .shift_remove(id)
            .map(|_| ())
            .ok_or_else(|| PersistenceError::NotFound(id.to_string()))
    }
}
