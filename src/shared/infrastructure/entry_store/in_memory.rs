// In memory implementation of the EntryStore port.
//
// Purpose
// - Default backend of the event store, and the backend of choice for tests.
//
// Responsibilities
// - Store event and snapshot records in an EntryTable behind an async RwLock.
// - Enforce the per-aggregate sequence uniqueness constraint under the write lock, so two
//   racing writers of the same key see exactly one success.
// - Offer test hooks to go offline and to slow writes down.

use crate::shared::core::primitives::AggregateIdentifier;
use crate::shared::infrastructure::entry_store::table::EntryTable;
use crate::shared::infrastructure::entry_store::{BackendFailure, EntryStore, SerializedEntry};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryEntryStore {
    table: RwLock<EntryTable>,
    delay_persist_ms: AtomicU64,
    is_offline: bool,
}

impl InMemoryEntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle_offline(&mut self) {
        self.is_offline = !self.is_offline;
    }

    /// Simulated write latency, applied before the write lock is taken.
    pub fn set_delay_persist_ms(&self, ms: u64) {
        self.delay_persist_ms.store(ms, Ordering::Relaxed);
    }

    pub async fn event_count(&self) -> usize {
        self.table.read().await.event_count()
    }

    /// Every stored snapshot of one aggregate, in write order.
    pub async fn snapshots(
        &self,
        aggregate_type: &str,
        aggregate_identifier: &AggregateIdentifier,
    ) -> Vec<SerializedEntry> {
        self.table
            .read()
            .await
            .snapshots_of(aggregate_type, aggregate_identifier)
    }

    fn ensure_online(&self) -> Result<(), BackendFailure> {
        if self.is_offline {
            return Err(BackendFailure::unavailable("Entry store offline"));
        }
        Ok(())
    }

    async fn simulate_latency(&self) {
        let ms = self.delay_persist_ms.load(Ordering::Relaxed);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl EntryStore for InMemoryEntryStore {
    async fn persist_event(&self, entry: SerializedEntry) -> Result<(), BackendFailure> {
        self.ensure_online()?;
        self.simulate_latency().await;
        self.table.write().await.insert_event(entry)
    }

    async fn persist_events(&self, entries: Vec<SerializedEntry>) -> Result<(), BackendFailure> {
        self.ensure_online()?;
        self.simulate_latency().await;
        let mut table = self.table.write().await;
        table.check_insertable(&entries)?;
        for entry in entries {
            table.insert_event(entry)?;
        }
        Ok(())
    }

    async fn persist_snapshot(&self, entry: SerializedEntry) -> Result<(), BackendFailure> {
        self.ensure_online()?;
        self.simulate_latency().await;
        self.table.write().await.insert_snapshot(entry);
        Ok(())
    }

    async fn fetch_batch(
        &self,
        aggregate_type: &str,
        aggregate_identifier: &AggregateIdentifier,
        first_sequence: u64,
        max_count: usize,
    ) -> Result<Vec<SerializedEntry>, BackendFailure> {
        self.ensure_online()?;
        Ok(self.table.read().await.fetch_batch(
            aggregate_type,
            aggregate_identifier,
            first_sequence,
            max_count,
        ))
    }

    async fn fetch_latest_snapshot(
        &self,
        aggregate_type: &str,
        aggregate_identifier: &AggregateIdentifier,
    ) -> Result<Option<SerializedEntry>, BackendFailure> {
        self.ensure_online()?;
        Ok(self
            .table
            .read()
            .await
            .latest_snapshot(aggregate_type, aggregate_identifier))
    }

    async fn prune_snapshots(
        &self,
        aggregate_type: &str,
        aggregate_identifier: &AggregateIdentifier,
        keep_newest: usize,
    ) -> Result<(), BackendFailure> {
        self.ensure_online()?;
        let removed = self.table.write().await.prune_snapshots(
            aggregate_type,
            aggregate_identifier,
            keep_newest,
        );
        if removed > 0 {
            tracing::debug!(
                aggregate_type,
                aggregate_identifier = %aggregate_identifier,
                removed,
                "pruned snapshots"
            );
        }
        Ok(())
    }

    fn visit_all<'a>(
        &'a self,
        aggregate_type: Option<&'a str>,
    ) -> BoxStream<'a, Result<SerializedEntry, BackendFailure>> {
        if let Err(failure) = self.ensure_online() {
            return stream::once(async move { Err(failure) }).boxed();
        }
        visit_table(&self.table, aggregate_type)
    }
}

/// Lazily walks a guarded table in storage order, re-reading it on every step.
pub(crate) fn visit_table<'a>(
    table: &'a RwLock<EntryTable>,
    aggregate_type: Option<&'a str>,
) -> BoxStream<'a, Result<SerializedEntry, BackendFailure>> {
    stream::unfold(0usize, move |position| async move {
        let next = table.read().await.next_event_from(position, aggregate_type);
        next.map(|(index, entry)| (Ok(entry), index + 1))
    })
    .boxed()
}
