// Immutable configuration of an event store instance.
//
// Purpose
// - Hold batch size, snapshot retention and the conflict classifier in one value that is
//   passed at construction. Changing it means building a new configured instance.

use crate::modules::event_store::core::conflict::{ConflictClassifier, UniqueKeyViolationClassifier};
use crate::modules::event_store::core::retention::SnapshotRetentionPolicy;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(100).unwrap();

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("batch size must be a positive integer")]
    ZeroBatchSize,

    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

#[derive(Clone)]
pub struct EventStoreConfig {
    batch_size: NonZeroUsize,
    retention: SnapshotRetentionPolicy,
    classifier: Option<Arc<dyn ConflictClassifier>>,
}

impl Default for EventStoreConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            retention: SnapshotRetentionPolicy::unbounded(),
            classifier: Some(Arc::new(UniqueKeyViolationClassifier::default())),
        }
    }
}

impl fmt::Debug for EventStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStoreConfig")
            .field("batch_size", &self.batch_size)
            .field("retention", &self.retention)
            .field("translates_conflicts", &self.classifier.is_some())
            .finish()
    }
}

impl EventStoreConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Result<Self, ConfigError> {
        self.batch_size = NonZeroUsize::new(batch_size).ok_or(ConfigError::ZeroBatchSize)?;
        Ok(self)
    }

    pub fn with_max_snapshots_archived(mut self, max_snapshots_archived: usize) -> Self {
        self.retention = SnapshotRetentionPolicy::keep_newest(max_snapshots_archived);
        self
    }

    pub fn with_conflict_classifier(mut self, classifier: impl ConflictClassifier + 'static) -> Self {
        self.classifier = Some(Arc::new(classifier));
        self
    }

    /// Backend failures are then always reported raw, conflicts included.
    pub fn without_conflict_classifier(mut self) -> Self {
        self.classifier = None;
        self
    }

    pub fn batch_size(&self) -> NonZeroUsize {
        self.batch_size
    }

    pub fn retention(&self) -> SnapshotRetentionPolicy {
        self.retention
    }

    pub fn classifier(&self) -> Option<&dyn ConflictClassifier> {
        self.classifier.as_deref()
    }
}
