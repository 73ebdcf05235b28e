use std::time::{Duration, Instant};

use std::sync::Arc;

use tokio::sync::OwnedRwLockReadGuard;
use tracing::{Level, event};

use super::index::WritableFulltext;
use super::provider::IndexConfiguration;
use crate::core::EntityKind;

/// Shared hold on the index configuration for one transaction.
///
/// Acquired in `before_commit` and kept until the transaction's
/// `after_commit` or `after_rollback` finishes. Releasing consumes the
/// guard, so a second release does not type-check; dropping it releases
/// as well.
#[derive(Debug)]
pub struct ConfigurationLockGuard {
    guard: OwnedRwLockReadGuard<IndexConfiguration>,
    acquired_at: Instant,
}

impl ConfigurationLockGuard {
    pub(crate) fn new(guard: OwnedRwLockReadGuard<IndexConfiguration>) -> Self {
        Self {
            guard,
            acquired_at: Instant::now(),
        }
    }

    /// The configuration as it stood when the lock was taken.
    pub fn configuration(&self) -> &IndexConfiguration {
        &self.guard
    }

    /// Keys covered by any index of `kind`, sorted.
    pub fn indexed_properties(&self, kind: EntityKind) -> Vec<String> {
        self.guard.indexed_properties(kind)
    }

    pub fn writable_indices(&self, kind: EntityKind) -> Vec<Arc<dyn WritableFulltext>> {
        self.guard.writable_indices(kind)
    }

    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }

    pub fn release(self) {
        event!(
            Level::TRACE,
            held_ms = self.held_for().as_millis() as u64,
            "index configuration lock released"
        );
    }
}
