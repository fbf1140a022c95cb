//! Workspace — one open diagram.
//!
//! Ties a shared `GraphStore` to the id it was loaded from, so that saving
//! overwrites the stored copy instead of creating a new one.

use tracing::info;

use crate::error::PersistenceError;
use crate::persistence::PersistenceGateway;
use crate::rules::RuleSet;
use crate::store::{GraphStore, SharedGraphStore};

pub struct Workspace {
    store: SharedGraphStore,
    current_graph_id: Option<String>,
    name: String,
    domain: String,
}

impl Workspace {
    /// An empty, never-saved diagram.
    pub fn new(name: impl Into<String>, domain: impl Into<String>, rules: RuleSet) -> Self {
        Self {
            store: GraphStore::new(rules).into_shared(),
            current_graph_id: None,
            name: name.into(),
            domain: domain.into(),
        }
    }

    /// Hydrate a fresh store from a saved diagram.
    pub async fn open(
        gateway: &dyn PersistenceGateway,
        id: &str,
        rules: RuleSet,
    ) -> Result<Self, PersistenceError> {
        let record = gateway.load(id).await?;
        let store = GraphStore::from_graph(record.graph, rules)?;
        info!(id, name = %record.name, nodes = store.graph().node_count(), "diagram opened");
        Ok(Self {
            store: store.into_shared(),
            current_graph_id: Some(record.id),
            name: record.name,
            domain: record.domain,
        })
    }

    pub fn store(&self) -> &SharedGraphStore {
        &self.store
    }

    pub fn current_graph_id(&self) -> Option<&str> {
        self.current_graph_id.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Overwrite the stored copy when one exists, otherwise save as new.
    /// Returns the diagram id.
    pub async fn save(
        &mut self,
        gateway: &dyn PersistenceGateway,
        description: &str,
    ) -> Result<String, PersistenceError> {
        let graph = self.store.read().await.snapshot();
        let id = match &self.current_graph_id {
            Some(id) => {
                let updated = gateway.update(id, &graph, Some(&self.name)).await?;
                self.name = updated.name;
                id.clone()
            }
            None => {
                let saved = gateway
                    .save(&self.name, description, &graph, &self.domain)
                    .await?;
                self.name = saved.name;
                saved.id
            }
        };
        info!(%id, name = %self.name, "diagram saved");
        self.current_graph_id = Some(id.clone());
        Ok(id)
    }

    /// Forget the stored id so the next save creates a new diagram.
    pub fn detach(&mut self) {
        self.current_graph_id = None;
    }
}
