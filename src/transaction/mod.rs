// ============================================================================
// Transaction Hook Module
// ============================================================================
//
// The host-facing side of the update pipeline: the event view a committing
// transaction exposes, the hook trait invoked around commit, and a
// dispatcher that drives one transaction through the hooks.
//
// ============================================================================

pub mod events;
pub mod hooks;
pub mod manager;
pub mod state;

pub use events::{PropertyChanges, PropertyEntry, TransactionData};
pub use hooks::TransactionEventHandler;
pub use manager::TransactionEventDispatcher;
pub use state::{TransactionId, TransactionState, UpdatePhase};
