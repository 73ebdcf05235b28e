// ============================================================================
// fulltext_sync Library
// ============================================================================
//
// Commit hooks that keep full-text indices of a property graph consistent
// with committed transactions.
//
// ============================================================================

pub mod core;
pub mod fulltext;
pub mod storage;
pub mod transaction;

// Re-export main types for convenience
pub use crate::core::{
    CompositeFailure, EntityId, EntityKind, EntitySnapshot, FulltextError, PropertyMap, Result,
    Value,
};
pub use fulltext::{
    CompletionAggregator, CompletionHandle, ConfigurationLockGuard, Document, FulltextProvider,
    FulltextTransactionContext, FulltextTransactionEventUpdater, FulltextUpdateApplier,
    InMemoryFulltextIndex, IndexOperation, UpdaterConfig, UpdaterStats, WritableFulltext,
};
pub use storage::{GraphTransaction, InMemoryGraph};
pub use transaction::{
    PropertyEntry, TransactionData, TransactionEventDispatcher, TransactionEventHandler,
    TransactionId, UpdatePhase,
};

use std::sync::Arc;

/// Fulltext-indexed graph: an `InMemoryGraph` whose commits run through a
/// `FulltextTransactionEventUpdater`.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use fulltext_sync::{EntityKind, FulltextGraph, InMemoryFulltextIndex, UpdaterConfig};
///
/// # #[tokio::main]
/// # async fn main() -> fulltext_sync::Result<()> {
/// let graph = FulltextGraph::new(UpdaterConfig::new());
/// let people = Arc::new(InMemoryFulltextIndex::new("people", EntityKind::Node, &["name"]));
/// graph.register_index(people.clone()).await?;
///
/// let mut tx = graph.begin();
/// let alice = tx.create_node();
/// tx.set_property(EntityKind::Node, alice, "name", "Alice")?;
/// graph.commit(tx).await?;
///
/// assert_eq!(people.document(alice).await.unwrap().text(), "Alice");
/// # Ok(())
/// # }
/// ```
pub struct FulltextGraph {
    graph: InMemoryGraph,
    dispatcher: TransactionEventDispatcher<FulltextTransactionEventUpdater>,
}

impl FulltextGraph {
    pub fn new(config: UpdaterConfig) -> Self {
        let provider = Arc::new(FulltextProvider::new());
        let updater = FulltextTransactionEventUpdater::with_config(provider, config);
        Self {
            graph: InMemoryGraph::new(),
            dispatcher: TransactionEventDispatcher::new(Arc::new(updater)),
        }
    }

    pub async fn register_index(&self, index: Arc<dyn WritableFulltext>) -> Result<()> {
        self.provider().register_index(index).await
    }

    pub fn begin(&self) -> GraphTransaction<'_> {
        self.graph.begin()
    }

    pub async fn commit(&self, tx: GraphTransaction<'_>) -> Result<()> {
        tx.commit(&self.dispatcher).await
    }

    pub fn graph(&self) -> &InMemoryGraph {
        &self.graph
    }

    pub fn provider(&self) -> &Arc<FulltextProvider> {
        self.dispatcher.handler().provider()
    }

    pub fn stats(&self) -> UpdaterStats {
        self.dispatcher.handler().stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_graph_commit_updates_index() {
        let graph = FulltextGraph::new(UpdaterConfig::new());
        let people = Arc::new(InMemoryFulltextIndex::new("people", EntityKind::Node, &["name"]));
        graph.register_index(people.clone()).await.unwrap();

        let mut tx = graph.begin();
        let alice = tx.create_node();
        tx.set_property(EntityKind::Node, alice, "name", "Alice").unwrap();
        graph.commit(tx).await.unwrap();

        assert!(people.document(alice).await.is_some());
        assert_eq!(graph.stats().applied, 1);
        assert!(!graph.provider().is_configuration_locked());
    }

    #[tokio::test]
    async fn test_graph_commit_without_indices() {
        let graph = FulltextGraph::new(UpdaterConfig::new());

        let mut tx = graph.begin();
        let node = tx.create_node();
        tx.set_property(EntityKind::Node, node, "name", "Alice").unwrap();
        graph.commit(tx).await.unwrap();

        assert_eq!(graph.stats().submitted_operations, 0);
        assert_eq!(graph.graph().entity_count(EntityKind::Node).unwrap(), 1);
    }
}
