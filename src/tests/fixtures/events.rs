// Shared test fixtures: a stub aggregate payload and message builders.

use crate::shared::core::primitives::{AggregateIdentifier, DomainEventMessage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StubPayload {
    StateChanged { counter: u64 },
    Snapshot { counter: u64 },
}

/// `count` consecutive events for one aggregate, sequences `0..count`.
pub fn make_events(
    aggregate_identifier: &AggregateIdentifier,
    count: u64,
) -> Vec<DomainEventMessage<StubPayload>> {
    make_events_from(aggregate_identifier, 0, count)
}

pub fn make_events_from(
    aggregate_identifier: &AggregateIdentifier,
    first_sequence: u64,
    count: u64,
) -> Vec<DomainEventMessage<StubPayload>> {
    (first_sequence..first_sequence + count)
        .map(|sequence| {
            DomainEventMessage::new(
                aggregate_identifier.clone(),
                sequence,
                StubPayload::StateChanged { counter: sequence },
            )
        })
        .collect()
}

/// Snapshot standing in for the state after the event at `sequence`.
pub fn make_snapshot(
    aggregate_identifier: &AggregateIdentifier,
    sequence: u64,
) -> DomainEventMessage<StubPayload> {
    DomainEventMessage::new(
        aggregate_identifier.clone(),
        sequence,
        StubPayload::Snapshot {
            counter: sequence + 1,
        },
    )
}
