use std::fmt;

use thiserror::Error;

use super::types::{EntityId, EntityKind};

#[derive(Error, Debug, Clone)]
pub enum FulltextError {
    #[error("{kind} {id} not found")]
    EntityNotFound { kind: EntityKind, id: EntityId },

    #[error("Failed to submit update to index '{index}': {reason}")]
    Submission { index: String, reason: String },

    #[error("{operation} on index '{index}' failed: {reason}")]
    Completion {
        index: String,
        operation: String,
        reason: String,
    },

    #[error(transparent)]
    Composite(#[from] CompositeFailure),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Transaction aborted: {0}")]
    TransactionAborted(String),

    #[error("Index '{0}' not found")]
    IndexNotFound(String),

    #[error("Index '{0}' already exists")]
    IndexExists(String),
}

impl FulltextError {
    /// True for the benign read failure on an entity deleted in the same transaction.
    pub fn is_entity_not_found(&self) -> bool {
        matches!(self, Self::EntityNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, FulltextError>;

impl<T> From<std::sync::PoisonError<T>> for FulltextError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for FulltextError {
    fn from(err: tokio::task::JoinError) -> Self {
        let reason = if err.is_panic() {
            "index task panicked".to_string()
        } else {
            err.to_string()
        };
        Self::Completion {
            index: "<unknown>".to_string(),
            operation: "task".to_string(),
            reason,
        }
    }
}

/// Aggregate of every failure recorded while applying one transaction.
///
/// Completion failures are always secondary causes, in submission order.
/// The primary cause is the first submission failure; later submission
/// failures are secondary too. Without any submission failure the first
/// completion failure doubles as the primary cause.
#[derive(Debug, Clone)]
pub struct CompositeFailure {
    message: String,
    primary: Box<FulltextError>,
    secondary: Vec<FulltextError>,
    primary_in_secondary: bool,
}

impl CompositeFailure {
    /// Builds the composite from recorded failures. Returns `None` when
    /// nothing failed.
    pub fn from_failures(
        message: impl Into<String>,
        submission_failures: impl IntoIterator<Item = FulltextError>,
        completion_failures: impl IntoIterator<Item = FulltextError>,
    ) -> Option<Self> {
        let mut submission_failures = submission_failures.into_iter();
        let completion_failures: Vec<FulltextError> = completion_failures.into_iter().collect();

        let (primary, secondary, primary_in_secondary) = match submission_failures.next() {
            Some(primary) => (
                primary,
                submission_failures.chain(completion_failures).collect::<Vec<_>>(),
                false,
            ),
            None => (completion_failures.first()?.clone(), completion_failures, true),
        };

        Some(Self {
            message: message.into(),
            primary: Box::new(primary),
            secondary,
            primary_in_secondary,
        })
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn primary(&self) -> &FulltextError {
        &self.primary
    }

    pub fn secondary(&self) -> &[FulltextError] {
        &self.secondary
    }

    /// Every distinct recorded failure, primary cause first.
    pub fn causes(&self) -> impl Iterator<Item = &FulltextError> {
        let head = (!self.primary_in_secondary).then_some(self.primary.as_ref());
        head.into_iter().chain(self.secondary.iter())
    }

    /// Number of distinct recorded failures
    pub fn len(&self) -> usize {
        self.secondary.len() + usize::from(!self.primary_in_secondary)
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for CompositeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.message, self.primary)?;
        let more = self.len() - 1;
        if more > 0 {
            write!(f, " (+{} more)", more)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompositeFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.primary.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completion(index: &str) -> FulltextError {
        FulltextError::Completion {
            index: index.to_string(),
            operation: "upsert".to_string(),
            reason: "disk full".to_string(),
        }
    }

    fn submission(index: &str) -> FulltextError {
        FulltextError::Submission {
            index: index.to_string(),
            reason: "io".to_string(),
        }
    }

    fn index_names(causes: &[FulltextError]) -> Vec<&str> {
        causes
            .iter()
            .map(|e| match e {
                FulltextError::Completion { index, .. } | FulltextError::Submission { index, .. } => {
                    index.as_str()
                }
                _ => "",
            })
            .collect()
    }

    #[test]
    fn test_composite_requires_a_failure() {
        assert!(CompositeFailure::from_failures("nothing", Vec::new(), Vec::new()).is_none());
    }

    #[test]
    fn test_completion_failures_are_always_secondary() {
        let composite = CompositeFailure::from_failures(
            "apply",
            Vec::new(),
            vec![completion("a"), completion("b"), completion("c")],
        )
        .unwrap();

        assert_eq!(composite.len(), 3);
        assert!(matches!(composite.primary(), FulltextError::Completion { index, .. } if index == "a"));
        assert_eq!(index_names(composite.secondary()), vec!["a", "b", "c"]);
        assert_eq!(composite.causes().count(), 3);
    }

    #[test]
    fn test_single_completion_failure_is_secondary() {
        let composite = CompositeFailure::from_failures("apply", Vec::new(), vec![completion("b")]).unwrap();

        assert_eq!(composite.len(), 1);
        assert_eq!(index_names(composite.secondary()), vec!["b"]);
        assert_eq!(composite.to_string(), "apply: upsert on index 'b' failed: disk full");
    }

    #[test]
    fn test_submission_failure_is_primary() {
        let composite = CompositeFailure::from_failures(
            "apply",
            vec![submission("x"), submission("y")],
            vec![completion("a")],
        )
        .unwrap();

        assert!(matches!(composite.primary(), FulltextError::Submission { index, .. } if index == "x"));
        assert_eq!(index_names(composite.secondary()), vec!["y", "a"]);
        assert_eq!(composite.len(), 3);
        let all: Vec<_> = composite.causes().cloned().collect();
        assert_eq!(index_names(&all), vec!["x", "y", "a"]);
    }

    #[test]
    fn test_composite_display_and_source() {
        use std::error::Error;

        let composite =
            CompositeFailure::from_failures("apply", Vec::new(), vec![completion("a"), completion("b")]).unwrap();
        let text = composite.to_string();
        assert!(text.starts_with("apply: upsert on index 'a' failed"));
        assert!(text.ends_with("(+1 more)"));
        assert!(composite.source().is_some());
    }
}
