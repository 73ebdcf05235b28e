use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{Level, event};

use super::config::UpdaterConfig;
use super::index::{Document, WritableFulltext};
use crate::core::{EntityId, EntitySnapshot, FulltextError, Result};
use crate::transaction::PropertyEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOperation {
    Removal,
    Upsert,
}

impl fmt::Display for UpdateOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Removal => write!(f, "removal"),
            Self::Upsert => write!(f, "upsert"),
        }
    }
}

/// One submitted index operation. Must be awaited exactly once.
#[derive(Debug)]
#[must_use = "submitted index operations must be awaited"]
pub struct CompletionHandle {
    index: String,
    operation: UpdateOperation,
    handle: JoinHandle<Result<()>>,
}

impl CompletionHandle {
    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn operation(&self) -> UpdateOperation {
        self.operation
    }

    /// Waits for the operation, tagging any failure with the index and
    /// operation it came from.
    pub async fn await_completion(self) -> Result<()> {
        match self.handle.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err @ FulltextError::Completion { .. })) => Err(err),
            Ok(Err(err)) => Err(FulltextError::Completion {
                index: self.index,
                operation: self.operation.to_string(),
                reason: err.to_string(),
            }),
            Err(join_err) => {
                let reason = match FulltextError::from(join_err) {
                    FulltextError::Completion { reason, .. } => reason,
                    other => other.to_string(),
                };
                Err(FulltextError::Completion {
                    index: self.index,
                    operation: self.operation.to_string(),
                    reason,
                })
            }
        }
    }
}

/// Queues removal and upsert operations on the tokio runtime.
///
/// Submission returns as soon as the task is spawned; at most
/// `max_inflight_operations` of them touch an index at once.
#[derive(Debug)]
pub struct FulltextUpdateApplier {
    config: UpdaterConfig,
    permits: Arc<Semaphore>,
    closed: AtomicBool,
    submitted: AtomicU64,
}

impl FulltextUpdateApplier {
    pub fn new(config: UpdaterConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_inflight_operations.max(1)));
        Self {
            config,
            permits,
            closed: AtomicBool::new(false),
            submitted: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    /// Operations submitted since creation
    pub fn submitted_operations(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Removes the documents of entities that lost every property `index`
    /// covers, including entities deleted in the transaction and entities
    /// whose covered properties were all assigned null. Entities still
    /// holding covered values are rewritten by the upsert instead.
    pub fn remove_property_data(
        &self,
        removed: &[PropertyEntry],
        assigned: &[PropertyEntry],
        snapshot: &EntitySnapshot,
        index: &Arc<dyn WritableFulltext>,
    ) -> Result<CompletionHandle> {
        self.check_submittable(index.as_ref())?;

        let keys = index.properties();
        let entities: Vec<EntityId> = removed
            .iter()
            .chain(assigned)
            .filter(|entry| keys.contains(&entry.key))
            .map(|entry| entry.entity)
            .filter(|entity| {
                snapshot
                    .get(entity)
                    .and_then(|properties| Document::project(*entity, properties, keys))
                    .is_none()
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let target = Arc::clone(index);
        self.spawn(index.as_ref(), UpdateOperation::Removal, async move {
            target.remove_documents(entities).await
        })
    }

    /// Writes the commit-time document of every snapshot entity `index`
    /// covers, as one operation.
    pub fn update_property_data(
        &self,
        snapshot: &EntitySnapshot,
        index: &Arc<dyn WritableFulltext>,
    ) -> Result<CompletionHandle> {
        self.check_submittable(index.as_ref())?;

        let keys = index.properties();
        let mut documents: Vec<Document> = snapshot
            .iter()
            .filter_map(|(entity, properties)| Document::project(*entity, properties, keys))
            .collect();
        documents.sort_by_key(|document| document.entity);

        let target = Arc::clone(index);
        self.spawn(index.as_ref(), UpdateOperation::Upsert, async move {
            target.upsert_documents(documents).await
        })
    }

    /// Refuses further submissions. Already queued operations still run,
    /// except those still waiting for a permit, which fail.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.permits.close();
        event!(Level::DEBUG, "fulltext update applier shut down");
    }

    pub fn is_shutdown(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn check_submittable(&self, index: &dyn WritableFulltext) -> Result<()> {
        if self.is_shutdown() {
            return Err(FulltextError::Submission {
                index: index.name().to_string(),
                reason: "update applier is shut down".to_string(),
            });
        }
        index.check_writable().map_err(|err| match err {
            err @ FulltextError::Submission { .. } => err,
            other => FulltextError::Submission {
                index: index.name().to_string(),
                reason: other.to_string(),
            },
        })
    }

    fn spawn<F>(
        &self,
        index: &dyn WritableFulltext,
        operation: UpdateOperation,
        work: F,
    ) -> Result<CompletionHandle>
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current().map_err(|err| FulltextError::Submission {
            index: index.name().to_string(),
            reason: err.to_string(),
        })?;

        let name = index.name().to_string();
        let permits = Arc::clone(&self.permits);
        let slow_threshold = self.config.log_slow_operations;
        let task_name = name.clone();

        let handle = runtime.spawn(async move {
            let _permit = permits.acquire_owned().await.map_err(|_| FulltextError::Completion {
                index: task_name.clone(),
                operation: operation.to_string(),
                reason: "update applier shut down before the operation ran".to_string(),
            })?;

            let started = Instant::now();
            let result = work.await;
            let elapsed = started.elapsed();

            if slow_threshold.is_some_and(|threshold| elapsed > threshold) {
                event!(
                    Level::WARN,
                    index = %task_name,
                    %operation,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "slow fulltext index operation"
                );
            }
            result
        });

        self.submitted.fetch_add(1, Ordering::Relaxed);
        event!(Level::TRACE, index = %name, %operation, "fulltext index operation submitted");

        Ok(CompletionHandle {
            index: name,
            operation,
            handle,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EntityKind, PropertyMap, Value};
    use crate::fulltext::{IndexOperation, InMemoryFulltextIndex};

    fn people() -> Arc<InMemoryFulltextIndex> {
        Arc::new(InMemoryFulltextIndex::new("people", EntityKind::Node, &["name"]))
    }

    fn named(name: &str) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert("name".into(), Value::from(name));
        props
    }

    #[tokio::test]
    async fn test_upsert_writes_snapshot_documents() {
        let index = people();
        let dynamic: Arc<dyn WritableFulltext> = index.clone();
        let applier = FulltextUpdateApplier::new(UpdaterConfig::new());

        let mut snapshot = EntitySnapshot::new();
        snapshot.insert(EntityId(2), named("Bob"));
        snapshot.insert(EntityId(1), named("Alice"));
        snapshot.insert(EntityId(3), PropertyMap::new());

        let handle = applier.update_property_data(&snapshot, &dynamic).unwrap();
        assert_eq!(handle.operation(), UpdateOperation::Upsert);
        handle.await_completion().await.unwrap();

        let ops = index.operations().await;
        assert_eq!(ops.len(), 1);
        match &ops[0] {
            IndexOperation::Upsert(docs) => {
                let ids: Vec<_> = docs.iter().map(|d| d.entity).collect();
                assert_eq!(ids, vec![EntityId(1), EntityId(2)]);
            }
            other => panic!("unexpected operation {:?}", other),
        }
        assert_eq!(applier.submitted_operations(), 1);
    }

    #[tokio::test]
    async fn test_removal_targets_entities_without_indexed_values() {
        let index = people();
        let dynamic: Arc<dyn WritableFulltext> = index.clone();
        let applier = FulltextUpdateApplier::new(UpdaterConfig::new());

        let mut snapshot = EntitySnapshot::new();
        snapshot.insert(EntityId(1), named("Alice"));
        snapshot.insert(EntityId(2), PropertyMap::new());

        let removed = vec![
            PropertyEntry::removed(EntityId(1), "name", None),
            PropertyEntry::removed(EntityId(2), "name", None),
            PropertyEntry::removed(EntityId(2), "name", None),
            PropertyEntry::removed(EntityId(3), "name", None),
            PropertyEntry::removed(EntityId(4), "age", None),
        ];

        applier
            .remove_property_data(&removed, &[], &snapshot, &dynamic)
            .unwrap()
            .await_completion()
            .await
            .unwrap();

        assert_eq!(
            index.operations().await,
            vec![IndexOperation::Remove(vec![EntityId(2), EntityId(3)])]
        );
    }

    #[tokio::test]
    async fn test_removal_targets_entities_assigned_null() {
        let index = people();
        let dynamic: Arc<dyn WritableFulltext> = index.clone();
        let applier = FulltextUpdateApplier::new(UpdaterConfig::new());

        let mut cleared = PropertyMap::new();
        cleared.insert("name".into(), Value::Null);
        let mut snapshot = EntitySnapshot::new();
        snapshot.insert(EntityId(1), cleared);
        snapshot.insert(EntityId(2), named("Bob"));

        let assigned = vec![
            PropertyEntry::assigned(EntityId(1), "name", Value::Null, Some(Value::from("Alice"))),
            PropertyEntry::assigned(EntityId(2), "name", Value::from("Bob"), None),
        ];

        applier
            .remove_property_data(&[], &assigned, &snapshot, &dynamic)
            .unwrap()
            .await_completion()
            .await
            .unwrap();

        assert_eq!(index.operations().await, vec![IndexOperation::Remove(vec![EntityId(1)])]);
    }

    #[tokio::test]
    async fn test_submission_fails_synchronously() {
        let index = people();
        index.reject_submissions(true);
        let dynamic: Arc<dyn WritableFulltext> = index.clone();
        let applier = FulltextUpdateApplier::new(UpdaterConfig::new());

        let err = applier
            .update_property_data(&EntitySnapshot::new(), &dynamic)
            .unwrap_err();
        assert!(matches!(err, FulltextError::Submission { .. }));
        assert_eq!(applier.submitted_operations(), 0);

        index.reject_submissions(false);
        applier.shutdown();
        let err = applier
            .update_property_data(&EntitySnapshot::new(), &dynamic)
            .unwrap_err();
        assert!(matches!(err, FulltextError::Submission { reason, .. } if reason.contains("shut down")));
    }

    #[tokio::test]
    async fn test_completion_failure_is_tagged() {
        let index = people();
        index.fail_upserts(true);
        let dynamic: Arc<dyn WritableFulltext> = index.clone();
        let applier = FulltextUpdateApplier::new(UpdaterConfig::new());

        let err = applier
            .update_property_data(&EntitySnapshot::new(), &dynamic)
            .unwrap()
            .await_completion()
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FulltextError::Completion { index, operation, .. } if index == "people" && operation == "upsert"
        ));
    }

    #[test]
    fn test_submission_outside_runtime_fails() {
        let dynamic: Arc<dyn WritableFulltext> = people();
        let applier = FulltextUpdateApplier::new(UpdaterConfig::new());

        let err = applier
            .update_property_data(&EntitySnapshot::new(), &dynamic)
            .unwrap_err();
        assert!(matches!(err, FulltextError::Submission { .. }));
    }
}
