// ============================================================================
// Transaction Event Dispatcher
// ============================================================================

use super::{TransactionData, TransactionEventHandler, TransactionId, TransactionState};
use crate::core::{FulltextError, Result};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{Instrument, Level, event, info_span};

/// Drives one commit through a `TransactionEventHandler`.
///
/// ```text
/// before_commit ──err──> Err (commit never attempted)
///      │
///   commit step ──err──> after_rollback ──> Err(TransactionAborted)
///      │
///  after_commit ──> its result (data stays committed either way)
/// ```
pub struct TransactionEventDispatcher<H: TransactionEventHandler> {
    handler: Arc<H>,
    active: Arc<RwLock<HashMap<TransactionId, TransactionState>>>,
    committed: AtomicU64,
    aborted: AtomicU64,
}

impl<H: TransactionEventHandler> TransactionEventDispatcher<H> {
    pub fn new(handler: Arc<H>) -> Self {
        Self {
            handler,
            active: Arc::new(RwLock::new(HashMap::new())),
            committed: AtomicU64::new(0),
            aborted: AtomicU64::new(0),
        }
    }

    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    /// Runs the hooks around `commit`, the host's own commit step.
    ///
    /// # Errors
    /// - whatever `before_commit` returned, if it failed
    /// - `FulltextError::TransactionAborted` if the commit step failed
    /// - whatever `after_commit` returned; the transaction is committed then
    pub async fn commit<F, Fut>(&self, data: &dyn TransactionData, commit: F) -> Result<()>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<()>> + Send,
    {
        let txn_id = data.transaction_id();
        let span = info_span!("transaction.commit", txn = %txn_id);
        self.run_hooks(txn_id, data, commit).instrument(span).await
    }

    async fn run_hooks<F, Fut>(&self, txn_id: TransactionId, data: &dyn TransactionData, commit: F) -> Result<()>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<()>> + Send,
    {
        self.active
            .write()
            .await
            .insert(txn_id, TransactionState::Active);

        let state = match self.handler.before_commit(data).await {
            Ok(state) => state,
            Err(err) => {
                event!(Level::WARN, error = %err, "before_commit hook failed, transaction not committed");
                self.finish(txn_id, TransactionState::Aborted).await;
                return Err(err);
            }
        };

        if let Err(err) = commit().await {
            event!(Level::WARN, error = %err, "commit failed, rolling back");
            self.handler.after_rollback(data, state).await;
            self.finish(txn_id, TransactionState::Aborted).await;
            return Err(match err {
                aborted @ FulltextError::TransactionAborted(_) => aborted,
                other => FulltextError::TransactionAborted(other.to_string()),
            });
        }

        let result = self.handler.after_commit(data, state).await;
        self.finish(txn_id, TransactionState::Committed).await;
        if let Err(err) = &result {
            event!(Level::ERROR, error = %err, "after_commit hook failed on a committed transaction");
        }
        result
    }

    async fn finish(&self, txn_id: TransactionId, state: TransactionState) {
        self.active.write().await.remove(&txn_id);
        match state {
            TransactionState::Committed => self.committed.fetch_add(1, Ordering::Relaxed),
            TransactionState::Aborted => self.aborted.fetch_add(1, Ordering::Relaxed),
            TransactionState::Active => return,
        };
        event!(Level::DEBUG, txn = %txn_id, state = %state, "transaction finished");
    }

    pub async fn active_transactions(&self) -> usize {
        self.active.read().await.len()
    }

    pub fn committed_count(&self) -> u64 {
        self.committed.load(Ordering::Relaxed)
    }

    pub fn aborted_count(&self) -> u64 {
        self.aborted.load(Ordering::Relaxed)
    }
}
