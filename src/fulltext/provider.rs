use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{Level, event};

use super::index::WritableFulltext;
use super::lock::ConfigurationLockGuard;
use crate::core::{EntityKind, FulltextError, Result};

/// Which full-text indices exist and which property keys they cover.
#[derive(Debug, Default)]
pub struct IndexConfiguration {
    indices: Vec<Arc<dyn WritableFulltext>>,
}

impl IndexConfiguration {
    /// Union of the keys covered by every index of `kind`, sorted.
    pub fn indexed_properties(&self, kind: EntityKind) -> Vec<String> {
        let mut keys: Vec<String> = self
            .indices
            .iter()
            .filter(|index| index.kind() == kind)
            .flat_map(|index| index.properties().iter().cloned())
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    pub fn writable_indices(&self, kind: EntityKind) -> Vec<Arc<dyn WritableFulltext>> {
        self.indices
            .iter()
            .filter(|index| index.kind() == kind)
            .cloned()
            .collect()
    }

    pub fn index(&self, name: &str) -> Option<&Arc<dyn WritableFulltext>> {
        self.indices.iter().find(|index| index.name() == name)
    }

    pub fn index_names(&self) -> Vec<String> {
        self.indices.iter().map(|index| index.name().to_string()).collect()
    }
}

/// Owner of the index configuration and its lock.
///
/// Committing transactions hold the lock in shared mode for their whole
/// capture-to-apply window; registering or dropping an index takes it
/// exclusively and therefore waits for them.
#[derive(Debug, Default)]
pub struct FulltextProvider {
    configuration: Arc<RwLock<IndexConfiguration>>,
}

impl FulltextProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn read_lock_configuration(&self) -> ConfigurationLockGuard {
        let guard = Arc::clone(&self.configuration).read_owned().await;
        event!(Level::TRACE, "index configuration lock acquired");
        ConfigurationLockGuard::new(guard)
    }

    /// True while any transaction (or anything else) holds the configuration lock.
    pub fn is_configuration_locked(&self) -> bool {
        self.configuration.try_write().is_err()
    }

    pub async fn register_index(&self, index: Arc<dyn WritableFulltext>) -> Result<()> {
        let mut configuration = self.configuration.write().await;
        if configuration.index(index.name()).is_some() {
            return Err(FulltextError::IndexExists(index.name().to_string()));
        }
        event!(
            Level::INFO,
            index = index.name(),
            kind = %index.kind(),
            "fulltext index registered"
        );
        configuration.indices.push(index);
        Ok(())
    }

    pub async fn drop_index(&self, name: &str) -> Result<Arc<dyn WritableFulltext>> {
        let mut configuration = self.configuration.write().await;
        let position = configuration
            .indices
            .iter()
            .position(|index| index.name() == name)
            .ok_or_else(|| FulltextError::IndexNotFound(name.to_string()))?;
        event!(Level::INFO, index = name, "fulltext index dropped");
        Ok(configuration.indices.remove(position))
    }

    pub async fn node_properties(&self) -> Vec<String> {
        self.configuration
            .read()
            .await
            .indexed_properties(EntityKind::Node)
    }

    pub async fn relationship_properties(&self) -> Vec<String> {
        self.configuration
            .read()
            .await
            .indexed_properties(EntityKind::Relationship)
    }

    pub async fn index_names(&self) -> Vec<String> {
        self.configuration.read().await.index_names()
    }
}
