use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::{EntityId, EntityKind, FulltextError, PropertyMap, Result, Value};
use crate::transaction::{
    PropertyChanges, PropertyEntry, TransactionData, TransactionEventDispatcher,
    TransactionEventHandler, TransactionId,
};

#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipRecord {
    pub start: EntityId,
    pub end: EntityId,
    pub rel_type: String,
    pub properties: PropertyMap,
}

/// Property graph held in memory, committed through the transaction hooks.
#[derive(Debug, Default)]
pub struct InMemoryGraph {
    nodes: RwLock<HashMap<EntityId, PropertyMap>>,
    relationships: RwLock<HashMap<EntityId, RelationshipRecord>>,
    next_node_id: AtomicU64,
    next_relationship_id: AtomicU64,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> GraphTransaction<'_> {
        GraphTransaction {
            graph: self,
            id: TransactionId::new(),
            staged: HashMap::new(),
            new_relationships: HashMap::new(),
            changes: PropertyChanges::new(),
            fail_commit: false,
        }
    }

    /// Committed properties of an entity
    pub fn properties(&self, kind: EntityKind, id: EntityId) -> Result<PropertyMap> {
        let found = match kind {
            EntityKind::Node => self.nodes.read()?.get(&id).cloned(),
            EntityKind::Relationship => self
                .relationships
                .read()?
                .get(&id)
                .map(|record| record.properties.clone()),
        };
        found.ok_or(FulltextError::EntityNotFound { kind, id })
    }

    pub fn relationship(&self, id: EntityId) -> Result<RelationshipRecord> {
        self.relationships
            .read()?
            .get(&id)
            .cloned()
            .ok_or(FulltextError::EntityNotFound {
                kind: EntityKind::Relationship,
                id,
            })
    }

    pub fn entity_count(&self, kind: EntityKind) -> Result<usize> {
        Ok(match kind {
            EntityKind::Node => self.nodes.read()?.len(),
            EntityKind::Relationship => self.relationships.read()?.len(),
        })
    }
}

/// Uncommitted changes against an `InMemoryGraph`.
///
/// Writes go to an overlay and are recorded as property events; the
/// overlay is applied to the graph only if the commit step succeeds.
/// Dropping the transaction discards it.
#[derive(Debug)]
pub struct GraphTransaction<'g> {
    graph: &'g InMemoryGraph,
    id: TransactionId,
    /// `None` marks an entity deleted in this transaction
    staged: HashMap<(EntityKind, EntityId), Option<PropertyMap>>,
    new_relationships: HashMap<EntityId, (EntityId, EntityId, String)>,
    changes: PropertyChanges,
    fail_commit: bool,
}

impl<'g> GraphTransaction<'g> {
    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn changes(&self) -> &PropertyChanges {
        &self.changes
    }

    pub fn create_node(&mut self) -> EntityId {
        let id = EntityId(self.graph.next_node_id.fetch_add(1, Ordering::SeqCst));
        self.staged
            .insert((EntityKind::Node, id), Some(PropertyMap::new()));
        id
    }

    pub fn create_relationship(
        &mut self,
        start: EntityId,
        end: EntityId,
        rel_type: &str,
    ) -> Result<EntityId> {
        self.current(EntityKind::Node, start)?;
        self.current(EntityKind::Node, end)?;

        let id = EntityId(self.graph.next_relationship_id.fetch_add(1, Ordering::SeqCst));
        self.staged
            .insert((EntityKind::Relationship, id), Some(PropertyMap::new()));
        self.new_relationships
            .insert(id, (start, end, rel_type.to_string()));
        Ok(id)
    }

    pub fn set_property(
        &mut self,
        kind: EntityKind,
        id: EntityId,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        let value = value.into();
        let mut properties = self.current(kind, id)?;
        let previous = properties.insert(key.to_string(), value.clone());
        self.staged.insert((kind, id), Some(properties));
        self.changes
            .record_assigned(kind, PropertyEntry::assigned(id, key, value, previous));
        Ok(())
    }

    pub fn remove_property(
        &mut self,
        kind: EntityKind,
        id: EntityId,
        key: &str,
    ) -> Result<Option<Value>> {
        let mut properties = self.current(kind, id)?;
        let Some(previous) = properties.remove(key) else {
            return Ok(None);
        };
        self.staged.insert((kind, id), Some(properties));
        self.changes.record_removed(
            kind,
            PropertyEntry::removed(id, key, Some(previous.clone())),
        );
        Ok(Some(previous))
    }

    /// Deletes an entity, recording the removal of each of its properties.
    pub fn delete_entity(&mut self, kind: EntityKind, id: EntityId) -> Result<()> {
        let properties = self.current(kind, id)?;
        for (key, value) in properties {
            self.changes
                .record_removed(kind, PropertyEntry::removed(id, key, Some(value)));
        }
        self.changes.discard_assigned(kind, id);
        self.staged.insert((kind, id), None);
        Ok(())
    }

    /// Make the commit step fail, so the transaction rolls back after
    /// `before_commit` already ran.
    pub fn fail_commit(&mut self) {
        self.fail_commit = true;
    }

    /// Commits through `dispatcher`.
    ///
    /// # Errors
    /// `TransactionAborted` when nothing was committed; any other error
    /// comes from `after_commit` and means the data is committed.
    pub async fn commit<H: TransactionEventHandler>(
        self,
        dispatcher: &TransactionEventDispatcher<H>,
    ) -> Result<()> {
        let tx = &self;
        dispatcher.commit(tx, || async move { tx.apply() }).await
    }

    fn current(&self, kind: EntityKind, id: EntityId) -> Result<PropertyMap> {
        match self.staged.get(&(kind, id)) {
            Some(Some(properties)) => Ok(properties.clone()),
            Some(None) => Err(FulltextError::EntityNotFound { kind, id }),
            None => self.graph.properties(kind, id),
        }
    }

    fn apply(&self) -> Result<()> {
        if self.fail_commit {
            return Err(FulltextError::TransactionAborted(format!(
                "{} failed to commit",
                self.id
            )));
        }

        let mut nodes = self.graph.nodes.write()?;
        let mut relationships = self.graph.relationships.write()?;

        for ((kind, id), state) in &self.staged {
            match (kind, state) {
                (EntityKind::Node, Some(properties)) => {
                    nodes.insert(*id, properties.clone());
                }
                (EntityKind::Node, None) => {
                    nodes.remove(id);
                }
                (EntityKind::Relationship, Some(properties)) => {
                    if let Some(record) = relationships.get_mut(id) {
                        record.properties = properties.clone();
                    } else if let Some((start, end, rel_type)) = self.new_relationships.get(id) {
                        relationships.insert(
                            *id,
                            RelationshipRecord {
                                start: *start,
                                end: *end,
                                rel_type: rel_type.clone(),
                                properties: properties.clone(),
                            },
                        );
                    }
                }
                (EntityKind::Relationship, None) => {
                    relationships.remove(id);
                }
            }
        }
        Ok(())
    }
}

impl TransactionData for GraphTransaction<'_> {
    fn transaction_id(&self) -> TransactionId {
        self.id
    }

    fn assigned_properties(&self, kind: EntityKind) -> &[PropertyEntry] {
        self.changes.assigned(kind)
    }

    fn removed_properties(&self, kind: EntityKind) -> &[PropertyEntry] {
        self.changes.removed(kind)
    }

    fn properties(&self, kind: EntityKind, id: EntityId, keys: &[String]) -> Result<PropertyMap> {
        let mut properties = self.current(kind, id)?;
        properties.retain(|key, _| keys.contains(key));
        Ok(properties)
    }
}
