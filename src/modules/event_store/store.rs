// Event store facade: the only entry point command handlers, repositories and migration
// tools use to reach stored events.
//
// Responsibilities
// - Encode and append events, translating classified write conflicts.
// - Read an aggregate's history through the stream assembler.
// - Append snapshots and apply the retention policy.
// - Visit every stored event for replay tooling.
//
// Boundaries
// - No retries and no locking. Concurrent writers are separated by the backend's
//   uniqueness constraint; recovery decisions belong to the caller.

use crate::modules::event_store::core::config::EventStoreConfig;
use crate::modules::event_store::core::conflict::Classification;
use crate::modules::event_store::core::stream::{DomainEventStream, assemble};
use crate::modules::event_store::errors::EventStoreError;
use crate::modules::event_store::visitor::EventVisitor;
use crate::shared::core::primitives::{AggregateIdentifier, DomainEventMessage};
use crate::shared::infrastructure::codec::{EventCodec, JsonCodec, decode_entry, encode_message};
use crate::shared::infrastructure::entry_store::in_memory::InMemoryEntryStore;
use crate::shared::infrastructure::entry_store::{BackendFailure, EntryStore, SerializedEntry};
use futures::StreamExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

pub struct EventStore<P, S = InMemoryEntryStore>
where
    S: EntryStore,
{
    entry_store: Arc<S>,
    codec: Arc<dyn EventCodec<P>>,
    config: EventStoreConfig,
}

impl<P> EventStore<P, InMemoryEntryStore>
where
    P: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// In memory backend, JSON payloads, default configuration.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryEntryStore::new()),
            JsonCodec::new(),
            EventStoreConfig::default(),
        )
    }
}

impl<P, S> EventStore<P, S>
where
    P: Send + Sync + 'static,
    S: EntryStore,
{
    pub fn new(
        entry_store: Arc<S>,
        codec: impl EventCodec<P> + 'static,
        config: EventStoreConfig,
    ) -> Self {
        Self {
            entry_store,
            codec: Arc::new(codec),
            config,
        }
    }

    /// A store sharing this one's backend and codec under a different configuration.
    pub fn with_config(&self, config: EventStoreConfig) -> Self {
        Self {
            entry_store: self.entry_store.clone(),
            codec: self.codec.clone(),
            config,
        }
    }

    pub fn config(&self) -> &EventStoreConfig {
        &self.config
    }

    pub fn entry_store(&self) -> &Arc<S> {
        &self.entry_store
    }

    /// Appends events one by one in order. The first conflict aborts the rest of the batch;
    /// records written before it stay durable.
    pub async fn append_events(
        &self,
        aggregate_type: &str,
        events: &[DomainEventMessage<P>],
    ) -> Result<(), EventStoreError> {
        for event in events {
            let entry = encode_message(&*self.codec, aggregate_type, event)?;
            if let Err(failure) = self.entry_store.persist_event(entry).await {
                return Err(self.translate(
                    aggregate_type,
                    &event.aggregate_identifier,
                    event.sequence_number,
                    failure,
                ));
            }
        }
        tracing::debug!(aggregate_type, count = events.len(), "appended events");
        Ok(())
    }

    /// Appends events all-or-nothing when the backend supports it. A conflict reports the
    /// sequence the backend names as colliding, or the batch's first one when it names none.
    pub async fn append_events_atomically(
        &self,
        aggregate_type: &str,
        events: &[DomainEventMessage<P>],
    ) -> Result<(), EventStoreError> {
        let Some(first) = events.first() else {
            return Ok(());
        };
        let entries = events
            .iter()
            .map(|event| encode_message(&*self.codec, aggregate_type, event))
            .collect::<Result<Vec<SerializedEntry>, _>>()?;
        if let Err(failure) = self.entry_store.persist_events(entries).await {
            let sequence_number = failure
                .conflicting_sequence()
                .unwrap_or(first.sequence_number);
            return Err(self.translate(
                aggregate_type,
                &first.aggregate_identifier,
                sequence_number,
                failure,
            ));
        }
        tracing::debug!(aggregate_type, count = events.len(), "appended events atomically");
        Ok(())
    }

    pub async fn read_events(
        &self,
        aggregate_type: &str,
        aggregate_identifier: &AggregateIdentifier,
    ) -> Result<DomainEventStream<P>, EventStoreError> {
        let store: Arc<dyn EntryStore> = self.entry_store.clone();
        assemble(
            store,
            self.codec.clone(),
            aggregate_type,
            aggregate_identifier,
            self.config.batch_size(),
        )
        .await
    }

    /// Stores a snapshot, then prunes older snapshots of the same aggregate.
    pub async fn append_snapshot_event(
        &self,
        aggregate_type: &str,
        snapshot: &DomainEventMessage<P>,
    ) -> Result<(), EventStoreError> {
        let entry = encode_message(&*self.codec, aggregate_type, snapshot)?;
        self.entry_store.persist_snapshot(entry).await?;
        self.config
            .retention()
            .apply(&*self.entry_store, aggregate_type, &snapshot.aggregate_identifier)
            .await?;
        tracing::debug!(
            aggregate_type,
            aggregate_identifier = %snapshot.aggregate_identifier,
            sequence_number = snapshot.sequence_number,
            "appended snapshot"
        );
        Ok(())
    }

    /// Feeds every stored event, never snapshots, to the visitor in storage order.
    pub async fn visit_events<V>(
        &self,
        visitor: &mut V,
        aggregate_type: Option<&str>,
    ) -> Result<(), EventStoreError>
    where
        V: EventVisitor<P> + ?Sized,
    {
        let mut entries = self.entry_store.visit_all(aggregate_type);
        let mut visited = 0u64;
        while let Some(entry) = entries.next().await {
            visitor.visit(decode_entry(&*self.codec, entry?)?);
            visited += 1;
        }
        tracing::debug!(aggregate_type, visited, "visited events");
        Ok(())
    }

    fn translate(
        &self,
        aggregate_type: &str,
        aggregate_identifier: &AggregateIdentifier,
        sequence_number: u64,
        failure: BackendFailure,
    ) -> EventStoreError {
        let classification = self
            .config
            .classifier()
            .map(|classifier| classifier.classify(&failure));
        if classification == Some(Classification::Conflict) {
            tracing::warn!(
                aggregate_type,
                aggregate_identifier = %aggregate_identifier,
                sequence_number,
                "append rejected by a concurrent write"
            );
            return EventStoreError::ConcurrencyConflict {
                aggregate_type: aggregate_type.to_string(),
                aggregate_identifier: aggregate_identifier.clone(),
                sequence_number,
                cause: failure,
            };
        }
        tracing::error!(
            aggregate_type,
            aggregate_identifier = %aggregate_identifier,
            sequence_number,
            error = %failure,
            "append failed"
        );
        EventStoreError::Backend(failure)
    }
}
