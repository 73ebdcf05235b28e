// ============================================================================
// Transaction State Management
// ============================================================================
//
// Two small state machines:
// - TransactionState: the host transaction (Active -> Committed/Aborted)
// - UpdatePhase: the index update riding on it
//   (Capturing -> Applying -> Applied/Failed, or Capturing -> Aborted)
//
// ============================================================================

use std::sync::atomic::{AtomicU64, Ordering};

/// Global transaction ID counter
static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Generate a new unique transaction ID
    pub fn new() -> Self {
        TransactionId(NEXT_TXN_ID.fetch_add(1, Ordering::SeqCst))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn_{}", self.0)
    }
}

/// Host transaction state
///
/// ```text
/// Active ──commit──> Committed
///   │
///   └──rollback──> Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    Aborted,
}

impl TransactionState {
    pub fn is_active(&self) -> bool {
        matches!(self, TransactionState::Active)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionState::Committed | TransactionState::Aborted
        )
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionState::Active => write!(f, "ACTIVE"),
            TransactionState::Committed => write!(f, "COMMITTED"),
            TransactionState::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// Phase of the full-text update attached to one transaction
///
/// ```text
/// Capturing ──after_commit──> Applying ──> Applied
///   │                            └──────> Failed
///   └──after_rollback──> Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePhase {
    /// Snapshots built, configuration lock held
    Capturing,
    /// Index operations submitted, awaiting completion
    Applying,
    Applied,
    /// Composite failure reported after the lock was released
    Failed,
    /// Rolled back, nothing submitted
    Aborted,
}

impl UpdatePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UpdatePhase::Applied | UpdatePhase::Failed | UpdatePhase::Aborted
        )
    }

    /// Whether `next` is a legal successor of this phase.
    pub fn can_advance_to(&self, next: UpdatePhase) -> bool {
        matches!(
            (self, next),
            (UpdatePhase::Capturing, UpdatePhase::Applying)
                | (UpdatePhase::Capturing, UpdatePhase::Aborted)
                | (UpdatePhase::Applying, UpdatePhase::Applied)
                | (UpdatePhase::Applying, UpdatePhase::Failed)
        )
    }
}

impl std::fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdatePhase::Capturing => write!(f, "CAPTURING"),
            UpdatePhase::Applying => write!(f, "APPLYING"),
            UpdatePhase::Applied => write!(f, "APPLIED"),
            UpdatePhase::Failed => write!(f, "FAILED"),
            UpdatePhase::Aborted => write!(f, "ABORTED"),
        }
    }
}
