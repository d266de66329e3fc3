use crate::shared::core::primitives::AggregateIdentifier;
use crate::shared::infrastructure::entry_store::{BackendFailure, EntryStore};

/// How many snapshots survive per aggregate after a new one is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotRetentionPolicy {
    max_snapshots_archived: usize,
}

impl Default for SnapshotRetentionPolicy {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl SnapshotRetentionPolicy {
    pub fn keep_newest(max_snapshots_archived: usize) -> Self {
        Self {
            max_snapshots_archived,
        }
    }

    pub fn unbounded() -> Self {
        Self::keep_newest(usize::MAX)
    }

    pub fn max_snapshots_archived(&self) -> usize {
        self.max_snapshots_archived
    }

    pub async fn apply<S>(
        &self,
        store: &S,
        aggregate_type: &str,
        aggregate_identifier: &AggregateIdentifier,
    ) -> Result<(), BackendFailure>
    where
        S: EntryStore + ?Sized,
    {
        store
            .prune_snapshots(aggregate_type, aggregate_identifier, self.max_snapshots_archived)
            .await
    }
}
