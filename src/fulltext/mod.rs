// ============================================================================
// Fulltext Index Update Pipeline
// ============================================================================
//
// snapshot -> capture commit-time property state per entity kind
// lock     -> shared hold on index configuration across both commit phases
// applier  -> spawn removal/upsert operations per index
// aggregate-> await every operation, merge failures into one
// updater  -> the commit hook wiring it together
//
// ============================================================================

pub mod aggregate;
pub mod applier;
pub mod config;
pub mod index;
pub mod lock;
pub mod memory;
pub mod provider;
pub mod snapshot;
pub mod updater;

pub use aggregate::CompletionAggregator;
pub use applier::{CompletionHandle, FulltextUpdateApplier, UpdateOperation};
pub use config::UpdaterConfig;
pub use index::{Document, WritableFulltext};
pub use lock::ConfigurationLockGuard;
pub use memory::{InMemoryFulltextIndex, IndexOperation};
pub use provider::{FulltextProvider, IndexConfiguration};
pub use snapshot::build_entity_snapshot;
pub use updater::{FulltextTransactionContext, FulltextTransactionEventUpdater, UpdaterStats};
