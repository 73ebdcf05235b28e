use std::fmt;

use async_trait::async_trait;

use crate::core::{EntityId, EntityKind, PropertyMap, Result};

/// The indexed fields of one entity, as written to one index.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub entity: EntityId,
    pub fields: PropertyMap,
}

impl Document {
    /// Restricts `properties` to the keys an index covers. `None` when the
    /// entity carries none of them, i.e. the index holds nothing for it.
    pub fn project(entity: EntityId, properties: &PropertyMap, keys: &[String]) -> Option<Self> {
        let fields: PropertyMap = properties
            .iter()
            .filter(|(key, value)| keys.contains(*key) && !value.is_null())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        if fields.is_empty() {
            None
        } else {
            Some(Self { entity, fields })
        }
    }

    /// All field values rendered as one searchable string.
    pub fn text(&self) -> String {
        self.fields
            .values()
            .filter_map(|value| value.as_document_text())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A full-text index accepting document removals and upserts for one
/// entity kind.
#[async_trait]
pub trait WritableFulltext: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn kind(&self) -> EntityKind;

    /// Property keys this index covers
    fn properties(&self) -> &[String];

    /// Checked on the committing path before an operation is queued. An
    /// error here is a submission failure.
    fn check_writable(&self) -> Result<()> {
        Ok(())
    }

    async fn remove_documents(&self, entities: Vec<EntityId>) -> Result<()>;

    async fn upsert_documents(&self, documents: Vec<Document>) -> Result<()>;
}
