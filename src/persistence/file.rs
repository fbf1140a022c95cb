//! Directory-backed gateway: one pretty-printed JSON document per diagram,
//! named `<id>.json`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    DiagramRecord, DiagramSummary, PersistenceGateway, SavedDiagram, StoredDiagram,
    UpdatedDiagram, sort_summaries,
};
use crate::error::PersistenceError;
use crate::model::Graph;

#[derive(Debug, Clone)]
pub struct FileGateway {
    root: PathBuf,
}

impl FileGateway {
    /// Use `root` as the store directory. It is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the document for `id`. Ids that could escape the directory
    /// are rejected as unknown.
    fn path_for(&self, id: &str) -> Result<PathBuf, PersistenceError> {
        let safe = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !safe {
            return Err(PersistenceError::NotFound(id.to_string()));
        }
        Ok(self.root.join(format!("{id}.json")))
    }

    async fn read(&self, id: &str) -> Result<StoredDiagram, PersistenceError> {
        let path = self.path_for(id)?;
        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(PersistenceError::NotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&text)?)
    }

    async fn write(&self, stored: &StoredDiagram) -> Result<(), PersistenceError> {
        let path = self.path_for(&stored.id)?;
        fs::create_dir_all(&self.root).await?;
        let text = serde_json::to_string_pretty(stored)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, text).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl PersistenceGateway for FileGateway {
    async fn save(
        &self,
        name: &str,
        description: &str,
        graph: &Graph,
        domain: &str,
    ) -> Result<SavedDiagram, PersistenceError> {
        let id = Uuid::new_v4().to_string();
        let stored = StoredDiagram::new(id.clone(), name, description, graph.clone(), domain);
        self.write(&stored).await?;
        debug!(%id, name, root = %self.root.display(), "diagram saved");
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
        let mut stored = self.read(id).await?;
        stored.update(graph.clone(), name);
        self.write(&stored).await?;
        debug!(id, "diagram updated");
        Ok(UpdatedDiagram { name: stored.name })
    }

    async fn load(&self, id: &str) -> Result<DiagramRecord, PersistenceError> {
        Ok(self.read(id).await?.record())
    }

    async fn list(&self, domain: Option<&str>) -> Result<Vec<DiagramSummary>, PersistenceError> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut out = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let text = fs::read_to_string(&path).await?;
            let stored: StoredDiagram = match serde_json::from_str(&text) {
                Ok(stored) => stored,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable diagram");
                    continue;
                }
            };
            if domain.is_none_or(|want| stored.domain == want) {
                out.push(stored.summary());
            }
        }
        sort_summaries(&mut out);
        Ok(out)
    }

    async fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(PersistenceError::NotFound(id.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}
