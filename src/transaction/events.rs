// ============================================================================
// Transaction Property Events
// ============================================================================
//
// The read-only view of one transaction that the commit hooks observe:
// which properties were assigned or removed, per entity kind, and the
// in-transaction state of each entity.
//
// ============================================================================

use super::TransactionId;
use crate::core::{EntityId, EntityKind, PropertyMap, Result, Value};

/// One property assignment or removal recorded by a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyEntry {
    pub entity: EntityId,
    pub key: String,
    /// New value; `None` for a removal.
    pub value: Option<Value>,
    pub previous: Option<Value>,
}

impl PropertyEntry {
    pub fn assigned(
        entity: EntityId,
        key: impl Into<String>,
        value: Value,
        previous: Option<Value>,
    ) -> Self {
        Self {
            entity,
            key: key.into(),
            value: Some(value),
            previous,
        }
    }

    pub fn removed(entity: EntityId, key: impl Into<String>, previous: Option<Value>) -> Self {
        Self {
            entity,
            key: key.into(),
            value: None,
            previous,
        }
    }

    pub fn is_removal(&self) -> bool {
        self.value.is_none()
    }
}

/// Assigned and removed property events of one transaction, kept per kind
/// in the order they happened.
#[derive(Debug, Clone, Default)]
pub struct PropertyChanges {
    assigned_nodes: Vec<PropertyEntry>,
    removed_nodes: Vec<PropertyEntry>,
    assigned_relationships: Vec<PropertyEntry>,
    removed_relationships: Vec<PropertyEntry>,
}

impl PropertyChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_assigned(&mut self, kind: EntityKind, entry: PropertyEntry) {
        match kind {
            EntityKind::Node => self.assigned_nodes.push(entry),
            EntityKind::Relationship => self.assigned_relationships.push(entry),
        }
    }

    pub fn record_removed(&mut self, kind: EntityKind, entry: PropertyEntry) {
        match kind {
            EntityKind::Node => self.removed_nodes.push(entry),
            EntityKind::Relationship => self.removed_relationships.push(entry),
        }
    }

    /// Drops every assignment recorded for `entity`, used when the entity
    /// is deleted later in the same transaction.
    pub fn discard_assigned(&mut self, kind: EntityKind, entity: EntityId) {
        let assigned = match kind {
            EntityKind::Node => &mut self.assigned_nodes,
            EntityKind::Relationship => &mut self.assigned_relationships,
        };
        assigned.retain(|entry| entry.entity != entity);
    }

    pub fn assigned(&self, kind: EntityKind) -> &[PropertyEntry] {
        match kind {
            EntityKind::Node => &self.assigned_nodes,
            EntityKind::Relationship => &self.assigned_relationships,
        }
    }

    pub fn removed(&self, kind: EntityKind) -> &[PropertyEntry] {
        match kind {
            EntityKind::Node => &self.removed_nodes,
            EntityKind::Relationship => &self.removed_relationships,
        }
    }

    pub fn is_empty(&self) -> bool {
        EntityKind::ALL
            .iter()
            .all(|kind| self.assigned(*kind).is_empty() && self.removed(*kind).is_empty())
    }
}

/// Immutable view of a committing transaction handed to every hook.
pub trait TransactionData: Send + Sync {
    fn transaction_id(&self) -> TransactionId;

    fn assigned_properties(&self, kind: EntityKind) -> &[PropertyEntry];

    fn removed_properties(&self, kind: EntityKind) -> &[PropertyEntry];

    /// Current in-transaction values of `keys` on an entity. Keys the entity
    /// does not carry are left out.
    ///
    /// # Errors
    /// `FulltextError::EntityNotFound` if the entity was deleted.
    fn properties(&self, kind: EntityKind, id: EntityId, keys: &[String]) -> Result<PropertyMap>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_changes_are_kept_per_kind() {
        let mut changes = PropertyChanges::new();
        assert!(changes.is_empty());

        changes.record_assigned(
            EntityKind::Node,
            PropertyEntry::assigned(EntityId(1), "name", "Alice".into(), None),
        );
        changes.record_removed(
            EntityKind::Relationship,
            PropertyEntry::removed(EntityId(1), "since", Some(Value::Integer(2020))),
        );

        assert_eq!(changes.assigned(EntityKind::Node).len(), 1);
        assert!(changes.removed(EntityKind::Node).is_empty());
        assert_eq!(changes.removed(EntityKind::Relationship).len(), 1);
        assert!(changes.removed(EntityKind::Relationship)[0].is_removal());
        assert!(!changes.is_empty());

        changes.discard_assigned(EntityKind::Node, EntityId(1));
        assert!(changes.assigned(EntityKind::Node).is_empty());
        assert_eq!(changes.removed(EntityKind::Relationship).len(), 1);
    }
}
