use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::index::{Document, WritableFulltext};
use crate::core::{EntityId, EntityKind, FulltextError, Result};

/// One operation as applied to an `InMemoryFulltextIndex`.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexOperation {
    Remove(Vec<EntityId>),
    Upsert(Vec<Document>),
}

/// Document map that records every operation it applies. Failures can be
/// switched on to exercise the error paths of the update pipeline.
#[derive(Debug)]
pub struct InMemoryFulltextIndex {
    name: String,
    kind: EntityKind,
    properties: Vec<String>,
    documents: RwLock<HashMap<EntityId, Document>>,
    operations: RwLock<Vec<IndexOperation>>,
    reject_submissions: AtomicBool,
    fail_removals: AtomicBool,
    fail_upserts: AtomicBool,
    latency: Option<Duration>,
}

impl InMemoryFulltextIndex {
    pub fn new(name: &str, kind: EntityKind, properties: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            kind,
            properties: properties.iter().map(|p| p.to_string()).collect(),
            documents: RwLock::new(HashMap::new()),
            operations: RwLock::new(Vec::new()),
            reject_submissions: AtomicBool::new(false),
            fail_removals: AtomicBool::new(false),
            fail_upserts: AtomicBool::new(false),
            latency: None,
        }
    }

    /// Delay every operation by `latency` before applying it
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make `check_writable` fail, as if the index could not be reached
    pub fn reject_submissions(&self, reject: bool) {
        self.reject_submissions.store(reject, Ordering::SeqCst);
    }

    pub fn fail_removals(&self, fail: bool) {
        self.fail_removals.store(fail, Ordering::SeqCst);
    }

    pub fn fail_upserts(&self, fail: bool) {
        self.fail_upserts.store(fail, Ordering::SeqCst);
    }

    pub async fn document(&self, entity: EntityId) -> Option<Document> {
        self.documents.read().await.get(&entity).cloned()
    }

    pub async fn document_count(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Applied operations in completion order
    pub async fn operations(&self) -> Vec<IndexOperation> {
        self.operations.read().await.clone()
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn operation_failure(&self, operation: &str) -> FulltextError {
        FulltextError::Completion {
            index: self.name.clone(),
            operation: operation.to_string(),
            reason: "index writer failed".to_string(),
        }
    }
}

#[async_trait]
impl WritableFulltext for InMemoryFulltextIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> EntityKind {
        self.kind
    }

    fn properties(&self) -> &[String] {
        &self.properties
    }

    fn check_writable(&self) -> Result<()> {
        if self.reject_submissions.load(Ordering::SeqCst) {
            return Err(FulltextError::Submission {
                index: self.name.clone(),
                reason: "index writer unavailable".to_string(),
            });
        }
        Ok(())
    }

    async fn remove_documents(&self, entities: Vec<EntityId>) -> Result<()> {
        self.pause().await;
        if self.fail_removals.load(Ordering::SeqCst) {
            return Err(self.operation_failure("removal"));
        }

        let mut documents = self.documents.write().await;
        for entity in &entities {
            documents.remove(entity);
        }
        drop(documents);

        self.operations.write().await.push(IndexOperation::Remove(entities));
        Ok(())
    }

    async fn upsert_documents(&self, batch: Vec<Document>) -> Result<()> {
        self.pause().await;
        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(self.operation_failure("upsert"));
        }

        let mut documents = self.documents.write().await;
        for document in &batch {
            documents.insert(document.entity, document.clone());
        }
        drop(documents);

        self.operations.write().await.push(IndexOperation::Upsert(batch));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PropertyMap, Value};

    fn doc(id: u64, name: &str) -> Document {
        let mut fields = PropertyMap::new();
        fields.insert("name".into(), Value::from(name));
        Document {
            entity: EntityId(id),
            fields,
        }
    }

    #[tokio::test]
    async fn test_upsert_then_remove() {
        let index = InMemoryFulltextIndex::new("people", EntityKind::Node, &["name"]);

        index.upsert_documents(vec![doc(1, "Alice"), doc(2, "Bob")]).await.unwrap();
        index.upsert_documents(vec![doc(1, "Alicia")]).await.unwrap();
        assert_eq!(index.document_count().await, 2);
        assert_eq!(index.document(EntityId(1)).await.unwrap().text(), "Alicia");

        index.remove_documents(vec![EntityId(2)]).await.unwrap();
        assert!(index.document(EntityId(2)).await.is_none());
        assert_eq!(index.operations().await.len(), 3);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let index = InMemoryFulltextIndex::new("people", EntityKind::Node, &["name"]);
        assert!(index.check_writable().is_ok());

        index.reject_submissions(true);
        assert!(matches!(index.check_writable(), Err(FulltextError::Submission { .. })));

        index.fail_upserts(true);
        assert!(index.upsert_documents(vec![doc(1, "Alice")]).await.is_err());
        assert_eq!(index.document_count().await, 0);
        assert!(index.operations().await.is_empty());

        index.fail_removals(true);
        assert!(index.remove_documents(vec![EntityId(1)]).await.is_err());
    }
}
