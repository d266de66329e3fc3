use crate::shared::core::primitives::AggregateIdentifier;
use crate::shared::infrastructure::codec::CodecError;
use crate::shared::infrastructure::entry_store::BackendFailure;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("aggregate not found: {aggregate_type}/{aggregate_identifier}")]
    AggregateNotFound {
        aggregate_type: String,
        aggregate_identifier: AggregateIdentifier,
    },

    #[error(
        "concurrency conflict appending {aggregate_type}/{aggregate_identifier} at sequence {sequence_number}"
    )]
    ConcurrencyConflict {
        aggregate_type: String,
        aggregate_identifier: AggregateIdentifier,
        sequence_number: u64,
        #[source]
        cause: BackendFailure,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Backend(#[from] BackendFailure),
}

impl EventStoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::AggregateNotFound { .. })
    }
}
