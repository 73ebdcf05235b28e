// ============================================================================
// Fulltext Transaction Event Updater
// ============================================================================
//
// Keeps full-text indices in step with committed transactions:
// - before_commit: take the configuration lock, capture commit-time
//   property state of touched node/relationship entities
// - after_commit:  submit a removal and an upsert per index, await all,
//   release the lock, then report any failure. Awaiting and release run
//   on a spawned task, so a cancelled caller still leaves the lock held
//   until the index work is done
// - after_rollback: release the lock, submit nothing
//
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::{Instrument, Level, event, info_span};

use super::aggregate::CompletionAggregator;
use super::applier::FulltextUpdateApplier;
use super::config::UpdaterConfig;
use super::lock::ConfigurationLockGuard;
use super::provider::FulltextProvider;
use super::snapshot::build_entity_snapshot;
use crate::core::{EntityKind, EntitySnapshot, FulltextError, Result};
use crate::transaction::{TransactionData, TransactionEventHandler, UpdatePhase};

/// State carried from `before_commit` to `after_commit`/`after_rollback`.
///
/// Only the updater can create one, and only together with a held
/// configuration lock; consuming it releases the lock.
#[derive(Debug)]
pub struct FulltextTransactionContext {
    nodes: EntitySnapshot,
    relationships: EntitySnapshot,
    guard: ConfigurationLockGuard,
    phase: UpdatePhase,
}

impl FulltextTransactionContext {
    pub fn snapshot(&self, kind: EntityKind) -> &EntitySnapshot {
        match kind {
            EntityKind::Node => &self.nodes,
            EntityKind::Relationship => &self.relationships,
        }
    }

    pub fn phase(&self) -> UpdatePhase {
        self.phase
    }

    fn advance(&mut self, next: UpdatePhase) {
        debug_assert!(self.phase.can_advance_to(next), "{} -> {}", self.phase, next);
        self.phase = next;
    }
}

#[derive(Debug, Default)]
struct UpdaterCounters {
    applied: AtomicU64,
    failed: AtomicU64,
    aborted: AtomicU64,
}

/// Point-in-time copy of the updater counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdaterStats {
    pub applied: u64,
    pub failed: u64,
    pub aborted: u64,
    pub submitted_operations: u64,
}

/// Commit hook keeping full-text indices consistent with committed
/// property changes.
#[derive(Debug)]
pub struct FulltextTransactionEventUpdater {
    provider: Arc<FulltextProvider>,
    applier: Arc<FulltextUpdateApplier>,
    counters: UpdaterCounters,
}

impl FulltextTransactionEventUpdater {
    pub fn new(provider: Arc<FulltextProvider>, applier: Arc<FulltextUpdateApplier>) -> Self {
        Self {
            provider,
            applier,
            counters: UpdaterCounters::default(),
        }
    }

    pub fn with_config(provider: Arc<FulltextProvider>, config: UpdaterConfig) -> Self {
        Self::new(provider, Arc::new(FulltextUpdateApplier::new(config)))
    }

    pub fn provider(&self) -> &Arc<FulltextProvider> {
        &self.provider
    }

    pub fn applier(&self) -> &Arc<FulltextUpdateApplier> {
        &self.applier
    }

    pub fn stats(&self) -> UpdaterStats {
        UpdaterStats {
            applied: self.counters.applied.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            aborted: self.counters.aborted.load(Ordering::Relaxed),
            submitted_operations: self.applier.submitted_operations(),
        }
    }

    async fn capture(&self, data: &dyn TransactionData) -> Result<FulltextTransactionContext> {
        let guard = self.provider.read_lock_configuration().await;

        let capture = |kind: EntityKind| {
            let keys = guard.indexed_properties(kind);
            build_entity_snapshot(data, kind, &keys)
        };
        // On error the guard is dropped here, before the error reaches the caller.
        let nodes = capture(EntityKind::Node)?;
        let relationships = capture(EntityKind::Relationship)?;

        event!(
            Level::DEBUG,
            nodes = nodes.len(),
            relationships = relationships.len(),
            "fulltext snapshot captured"
        );
        Ok(FulltextTransactionContext {
            nodes,
            relationships,
            guard,
            phase: UpdatePhase::Capturing,
        })
    }

    async fn apply(
        &self,
        data: &dyn TransactionData,
        mut context: FulltextTransactionContext,
    ) -> Result<()> {
        context.advance(UpdatePhase::Applying);
        let mut aggregator = CompletionAggregator::new();

        for kind in EntityKind::ALL {
            let snapshot = context.snapshot(kind);
            let removed = data.removed_properties(kind);
            let assigned = data.assigned_properties(kind);

            for index in context.guard.writable_indices(kind) {
                // A failed submission ends this index's pass only.
                match self.applier.remove_property_data(removed, assigned, snapshot, &index) {
                    Ok(handle) => aggregator.push(handle),
                    Err(err) => {
                        aggregator.record_submission_failure(err);
                        continue;
                    }
                }
                match self.applier.update_property_data(snapshot, &index) {
                    Ok(handle) => aggregator.push(handle),
                    Err(err) => aggregator.record_submission_failure(err),
                }
            }
        }

        // The guard travels with the outstanding operations, so dropping this
        // future cannot release the lock while index work is still running.
        let FulltextTransactionContext { guard, phase, .. } = context;
        let result = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime
                .spawn(settle(aggregator, guard).in_current_span())
                .await
                .unwrap_or_else(|err| Err(FulltextError::from(err))),
            Err(_) => settle(aggregator, guard).await,
        };

        let next = if result.is_ok() {
            UpdatePhase::Applied
        } else {
            UpdatePhase::Failed
        };
        debug_assert!(phase.can_advance_to(next), "{} -> {}", phase, next);
        let phase = next;

        match &result {
            Ok(()) => {
                self.counters.applied.fetch_add(1, Ordering::Relaxed);
                event!(Level::DEBUG, %phase, "fulltext indices updated");
            }
            Err(err) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                event!(Level::ERROR, %phase, error = %err, "fulltext indices may be stale");
            }
        }
        result
    }
}

/// Awaits every submitted operation, then releases the configuration lock.
async fn settle(aggregator: CompletionAggregator, guard: ConfigurationLockGuard) -> Result<()> {
    let result = aggregator.await_all().await;
    guard.release();
    result
}

#[async_trait]
impl TransactionEventHandler for FulltextTransactionEventUpdater {
    type State = FulltextTransactionContext;

    async fn before_commit(&self, data: &dyn TransactionData) -> Result<Self::State> {
        let span = info_span!("fulltext.before_commit", txn = %data.transaction_id());
        self.capture(data).instrument(span).await
    }

    async fn after_commit(&self, data: &dyn TransactionData, state: Self::State) -> Result<()> {
        let span = info_span!("fulltext.after_commit", txn = %data.transaction_id());
        self.apply(data, state).instrument(span).await
    }

    async fn after_rollback(&self, data: &dyn TransactionData, mut state: Self::State) {
        state.advance(UpdatePhase::Aborted);
        state.guard.release();
        self.counters.aborted.fetch_add(1, Ordering::Relaxed);
        event!(
            Level::DEBUG,
            txn = %data.transaction_id(),
            phase = %state.phase,
            "fulltext update discarded"
        );
    }
}
