use async_trait::async_trait;

use super::TransactionData;
use crate::core::Result;

/// Extension point invoked by the host around each commit.
///
/// `before_commit` runs while the transaction can still be aborted and
/// hands back a `State` that is moved into exactly one of `after_commit`
/// or `after_rollback`.
#[async_trait]
pub trait TransactionEventHandler: Send + Sync {
    type State: Send;

    async fn before_commit(&self, data: &dyn TransactionData) -> Result<Self::State>;

    /// Runs after the host committed. An error here does not undo the
    /// commit; it only reports that derived data may be stale.
    async fn after_commit(&self, data: &dyn TransactionData, state: Self::State) -> Result<()>;

    /// Runs when the host failed to commit after `before_commit` succeeded.
    async fn after_rollback(&self, data: &dyn TransactionData, state: Self::State);
}
