// Domain primitives shared by every layer of the store.
//
// Purpose
// - Name the aggregate an event belongs to and carry one event (or snapshot) in memory.
//
// Boundaries
// - No encoding here. Payloads stay typed until the codec turns them into bytes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Opaque identifier of one aggregate instance within its aggregate type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateIdentifier(String);

impl AggregateIdentifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn random() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AggregateIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AggregateIdentifier {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for AggregateIdentifier {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<Uuid> for AggregateIdentifier {
    fn from(value: Uuid) -> Self {
        Self(value.to_string())
    }
}

/// The pair every ordering, conflict and retention rule is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AggregateKey {
    pub aggregate_type: String,
    pub aggregate_identifier: AggregateIdentifier,
}

impl AggregateKey {
    pub fn new(aggregate_type: impl Into<String>, aggregate_identifier: AggregateIdentifier) -> Self {
        Self {
            aggregate_type: aggregate_type.into(),
            aggregate_identifier,
        }
    }
}

impl fmt::Display for AggregateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.aggregate_type, self.aggregate_identifier)
    }
}

/// Key-value annotations travelling with an event. Stored as-is, never run through the codec.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetaData(BTreeMap<String, serde_json::Value>);

impl MetaData {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }
}

/// One state change of an aggregate at a given sequence number.
///
/// Snapshots use the same shape: a snapshot message at sequence `S` stands in for the
/// full aggregate state after the event at `S`.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainEventMessage<P> {
    pub event_identifier: Uuid,
    pub aggregate_identifier: AggregateIdentifier,
    pub sequence_number: u64,
    pub timestamp: DateTime<Utc>,
    pub metadata: MetaData,
    pub payload: P,
}

impl<P> DomainEventMessage<P> {
    pub fn new(
        aggregate_identifier: impl Into<AggregateIdentifier>,
        sequence_number: u64,
        payload: P,
    ) -> Self {
        Self {
            event_identifier: Uuid::now_v7(),
            aggregate_identifier: aggregate_identifier.into(),
            sequence_number,
            timestamp: Utc::now(),
            metadata: MetaData::empty(),
            payload,
        }
    }

    pub fn with_metadata(mut self, metadata: MetaData) -> Self {
        self.metadata = metadata;
        self
    }
}
