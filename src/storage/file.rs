//! File-backed entity store
//!
//! Keeps every row in a single JSON document. The document is loaded once
//! when the store is opened and rewritten atomically after each mutation.

use super::engine::{Continuation, EntityStore, Page};
use super::filter::Filter;
use super::memory::MemoryEntityStore;
use crate::core::{Entity, FactError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    entities: Vec<Entity>,
}

pub struct FileEntityStore {
    path: PathBuf,
    inner: MemoryEntityStore,
}

impl FileEntityStore {
    /// Open the store at `path`. A missing file is an empty store; it is
    /// created on the first write.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entities = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|e| {
                FactError::Infrastructure(format!("Failed to read store file {}: {}", path.display(), e))
            })?;
            let file: StoreFile = serde_json::from_str(&raw)?;
            if file.version != FORMAT_VERSION {
                return Err(FactError::Infrastructure(format!(
                    "Unsupported store file version {} in {}",
                    file.version,
                    path.display()
                )));
            }
            file.entities
        } else {
            Vec::new()
        };

        debug!(path = %path.display(), rows = entities.len(), "opened file store");

        Ok(Self {
            path,
            inner: MemoryEntityStore::from_entities(entities),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self) -> Result<()> {
        let file = StoreFile {
            version: FORMAT_VERSION,
            entities: self.inner.entities().await,
        };
        let serialized = serde_json::to_vec_pretty(&file)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut temp = NamedTempFile::new_in(&dir)?;
        temp.write_all(&serialized)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| {
            FactError::Infrastructure(format!("Failed to write store file {}: {}", self.path.display(), e))
        })?;
        Ok(())
    }
}

#[async_trait]
impl EntityStore for FileEntityStore {
    async fn query_page(&self, filter: &Filter, continuation: Option<Continuation>) -> Result<Page> {
        self.inner.query_page(filter, continuation).await
    }

    async fn get(&self, partition: &str, row_key: &str) -> Result<Option<Entity>> {
        self.inner.get(partition, row_key).await
    }

    async fn create(&self, entity: Entity) -> Result<()> {
        self.inner.create(entity).await?;
        self.flush().await
    }

    async fn update(&self, entity: Entity) -> Result<()> {
        self.inner.update(entity).await?;
        self.flush().await
    }

    async fn delete(&self, partition: &str, row_key: &str) -> Result<()> {
        self.inner.delete(partition, row_key).await?;
        self.flush().await
    }
}
