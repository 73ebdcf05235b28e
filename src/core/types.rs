use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::value::Value;

/// Identifier of a node or a relationship. Node and relationship ids live in
/// separate namespaces and are never compared across kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Node,
    Relationship,
}

impl EntityKind {
    /// Every kind, in the order indices are updated.
    pub const ALL: [EntityKind; 2] = [EntityKind::Node, EntityKind::Relationship];
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node => write!(f, "node"),
            Self::Relationship => write!(f, "relationship"),
        }
    }
}

/// Indexed property key -> current value for one entity.
pub type PropertyMap = BTreeMap<String, Value>;

/// Commit-time state of every touched entity of one kind.
pub type EntitySnapshot = HashMap<EntityId, PropertyMap>;
