use futures::future::join_all;
use tracing::{Level, event};

use super::applier::CompletionHandle;
use crate::core::{CompositeFailure, FulltextError, Result};

/// Collects the handles and submission failures of one apply pass and
/// awaits them all.
///
/// Awaiting never stops at the first failure: every handle is observed,
/// and every failure ends up in the single `CompositeFailure` returned.
#[derive(Debug, Default)]
pub struct CompletionAggregator {
    submission_failures: Vec<FulltextError>,
    handles: Vec<CompletionHandle>,
}

impl CompletionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handle: CompletionHandle) {
        self.handles.push(handle);
    }

    pub fn record_submission_failure(&mut self, err: FulltextError) {
        event!(Level::ERROR, error = %err, "fulltext index update could not be submitted");
        self.submission_failures.push(err);
    }

    pub fn pending(&self) -> usize {
        self.handles.len()
    }

    pub fn has_submission_failures(&self) -> bool {
        !self.submission_failures.is_empty()
    }

    /// Awaits every handle. The first submission failure, if any, becomes
    /// the primary cause; completion failures are kept as secondary causes
    /// in submission order.
    pub async fn await_all(self) -> Result<()> {
        let message = if self.submission_failures.is_empty() {
            "Failed to update fulltext index"
        } else {
            "Failed to submit all index updates"
        };

        let outcomes = join_all(self.handles.into_iter().map(CompletionHandle::await_completion)).await;

        let completion_failures = outcomes
            .into_iter()
            .filter_map(|outcome| outcome.err())
            .inspect(|err| {
                event!(Level::ERROR, error = %err, "fulltext index operation failed");
            });

        match CompositeFailure::from_failures(message, self.submission_failures, completion_failures) {
            None => Ok(()),
            Some(composite) => Err(composite.into()),
        }
    }
}
