// Event payload codec and the glue between typed messages and serialized entries.
//
// Responsibilities
// - Turn a payload into bytes and back. Only the payload goes through the codec;
//   identity, sequence, timestamp and metadata are copied verbatim.
//
// Boundaries
// - A codec failure is reported per record. Whether it is fatal is decided by the caller.

use crate::shared::core::primitives::DomainEventMessage;
use crate::shared::infrastructure::entry_store::SerializedEntry;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode payload: {0}")]
    Encode(#[source] BoxError),

    #[error("failed to decode payload: {0}")]
    Decode(#[source] BoxError),
}

pub trait EventCodec<P>: Send + Sync {
    fn encode(&self, payload: &P) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, bytes: &[u8]) -> Result<P, CodecError>;
}

/// serde_json codec for any serde payload.
pub struct JsonCodec<P> {
    _payload: PhantomData<fn() -> P>,
}

impl<P> JsonCodec<P> {
    pub fn new() -> Self {
        Self {
            _payload: PhantomData,
        }
    }
}

impl<P> Default for JsonCodec<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> EventCodec<P> for JsonCodec<P>
where
    P: Serialize + DeserializeOwned,
{
    fn encode(&self, payload: &P) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(payload).map_err(|e| CodecError::Encode(Box::new(e)))
    }

    fn decode(&self, bytes: &[u8]) -> Result<P, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(Box::new(e)))
    }
}

pub fn encode_message<P>(
    codec: &dyn EventCodec<P>,
    aggregate_type: &str,
    message: &DomainEventMessage<P>,
) -> Result<SerializedEntry, CodecError> {
    Ok(SerializedEntry {
        event_identifier: message.event_identifier,
        aggregate_type: aggregate_type.to_string(),
        aggregate_identifier: message.aggregate_identifier.clone(),
        sequence_number: message.sequence_number,
        timestamp: message.timestamp,
        metadata: message.metadata.clone(),
        payload: codec.encode(&message.payload)?,
    })
}

pub fn decode_entry<P>(
    codec: &dyn EventCodec<P>,
    entry: SerializedEntry,
) -> Result<DomainEventMessage<P>, CodecError> {
    Ok(DomainEventMessage {
        payload: codec.decode(&entry.payload)?,
        event_identifier: entry.event_identifier,
        aggregate_identifier: entry.aggregate_identifier,
        sequence_number: entry.sequence_number,
        timestamp: entry.timestamp,
        metadata: entry.metadata,
    })
}
