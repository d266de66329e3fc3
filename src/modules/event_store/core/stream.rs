// Stream assembler: one continuous, ascending view of an aggregate's history.
//
// Purpose
// - Combine the latest usable snapshot with paged event fetches so large histories replay
//   with bounded memory.
//
// Rules
// - A snapshot that cannot be decoded is ignored and the history replays from sequence 0.
// - An event that cannot be decoded ends the read with a codec error.
// - A page shorter than the batch size means the history is exhausted; no further fetch.
// - The stream is forward-only and not restartable; re-read to replay again.

use crate::modules::event_store::errors::EventStoreError;
use crate::shared::core::primitives::{AggregateIdentifier, DomainEventMessage};
use crate::shared::infrastructure::codec::{EventCodec, decode_entry};
use crate::shared::infrastructure::entry_store::EntryStore;
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Where replay starts, decided once when the stream is built.
enum SnapshotStart<P> {
    Snapshot(DomainEventMessage<P>),
    None,
}

pub struct DomainEventStream<P> {
    store: Arc<dyn EntryStore>,
    codec: Arc<dyn EventCodec<P>>,
    aggregate_type: String,
    aggregate_identifier: AggregateIdentifier,
    batch_size: NonZeroUsize,
    next_sequence: u64,
    buffer: VecDeque<DomainEventMessage<P>>,
    exhausted: bool,
}

/// Builds the stream and loads its first page, so an unknown aggregate fails right here.
pub async fn assemble<P>(
    store: Arc<dyn EntryStore>,
    codec: Arc<dyn EventCodec<P>>,
    aggregate_type: &str,
    aggregate_identifier: &AggregateIdentifier,
    batch_size: NonZeroUsize,
) -> Result<DomainEventStream<P>, EventStoreError> {
    let start = load_snapshot(&*store, &*codec, aggregate_type, aggregate_identifier).await?;

    let mut stream = DomainEventStream {
        store,
        codec,
        aggregate_type: aggregate_type.to_string(),
        aggregate_identifier: aggregate_identifier.clone(),
        batch_size,
        next_sequence: 0,
        buffer: VecDeque::with_capacity(batch_size.get() + 1),
        exhausted: false,
    };
    if let SnapshotStart::Snapshot(snapshot) = start {
        stream.next_sequence = snapshot.sequence_number.saturating_add(1);
        stream.buffer.push_back(snapshot);
    }
    stream.fetch_next_batch().await?;

    if stream.buffer.is_empty() {
        return Err(EventStoreError::AggregateNotFound {
            aggregate_type: aggregate_type.to_string(),
            aggregate_identifier: aggregate_identifier.clone(),
        });
    }
    tracing::debug!(
        aggregate_type,
        aggregate_identifier = %aggregate_identifier,
        first_sequence = stream.buffer.front().map(|e| e.sequence_number),
        "assembled event stream"
    );
    Ok(stream)
}

async fn load_snapshot<P>(
    store: &dyn EntryStore,
    codec: &dyn EventCodec<P>,
    aggregate_type: &str,
    aggregate_identifier: &AggregateIdentifier,
) -> Result<SnapshotStart<P>, EventStoreError> {
    let Some(entry) = store
        .fetch_latest_snapshot(aggregate_type, aggregate_identifier)
        .await?
    else {
        return Ok(SnapshotStart::None);
    };
    let sequence_number = entry.sequence_number;
    match decode_entry(codec, entry) {
        Ok(snapshot) => Ok(SnapshotStart::Snapshot(snapshot)),
        Err(error) => {
            tracing::warn!(
                aggregate_type,
                aggregate_identifier = %aggregate_identifier,
                sequence_number,
                error = %error,
                "snapshot could not be decoded, replaying the full history"
            );
            Ok(SnapshotStart::None)
        }
    }
}

impl<P> DomainEventStream<P> {
    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn aggregate_identifier(&self) -> &AggregateIdentifier {
        &self.aggregate_identifier
    }

    /// The next message without consuming it.
    pub async fn peek(&mut self) -> Result<Option<&DomainEventMessage<P>>, EventStoreError> {
        self.fill().await?;
        Ok(self.buffer.front())
    }

    pub async fn next(&mut self) -> Result<Option<DomainEventMessage<P>>, EventStoreError> {
        self.fill().await?;
        Ok(self.buffer.pop_front())
    }

    pub async fn try_collect(mut self) -> Result<Vec<DomainEventMessage<P>>, EventStoreError> {
        let mut events = Vec::new();
        while let Some(event) = self.next().await? {
            events.push(event);
        }
        Ok(events)
    }

    async fn fill(&mut self) -> Result<(), EventStoreError> {
        if self.buffer.is_empty() && !self.exhausted {
            self.fetch_next_batch().await?;
        }
        Ok(())
    }

    async fn fetch_next_batch(&mut self) -> Result<(), EventStoreError> {
        let result = self.try_fetch_next_batch().await;
        if result.is_err() {
            // a failed read is over; later calls see the end of the stream
            self.exhausted = true;
            self.buffer.clear();
        }
        result
    }

    async fn try_fetch_next_batch(&mut self) -> Result<(), EventStoreError> {
        let max_count = self.batch_size.get();
        let entries = self
            .store
            .fetch_batch(
                &self.aggregate_type,
                &self.aggregate_identifier,
                self.next_sequence,
                max_count,
            )
            .await?;
        if entries.len() < max_count {
            self.exhausted = true;
        }
        for entry in entries {
            self.next_sequence = entry.sequence_number.saturating_add(1);
            self.buffer.push_back(decode_entry(&*self.codec, entry)?);
        }
        Ok(())
    }
}
