// Entry store port: the only boundary that touches persistence.
//
// Purpose
// - Describe the capabilities the event store needs from a backend as one async trait.
//
// Responsibilities
// - Persist serialized event and snapshot records keyed by (type, identifier, sequence).
// - Fetch events in pages, the latest snapshot, and every event in storage order.
// - Prune old snapshots.
//
// Boundaries
// - Backends report every failure as a BackendFailure. Telling a conflict apart from
//   any other failure is the conflict classifier's job, not the backend's.

use crate::shared::core::primitives::{AggregateIdentifier, MetaData};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub mod in_memory;
pub mod jsonl;
pub mod table;

/// SQLSTATE reported for unique constraint violations.
pub const UNIQUE_VIOLATION: &str = "23505";

/// Name of the uniqueness constraint over (type, aggregate identifier, sequence number).
pub const DOMAIN_EVENT_ENTRY_KEY: &str = "domain_event_entry_pk";

/// A raw record as it is written to and read from a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedEntry {
    pub event_identifier: Uuid,
    pub aggregate_type: String,
    pub aggregate_identifier: AggregateIdentifier,
    pub sequence_number: u64,
    pub timestamp: DateTime<Utc>,
    pub metadata: MetaData,
    pub payload: Vec<u8>,
}

/// Any failure raised by a backend, conflict or not.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct BackendFailure {
    message: String,
    sql_state: Option<String>,
    constraint: Option<String>,
    conflicting_sequence: Option<u64>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl BackendFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            sql_state: None,
            constraint: None,
            conflicting_sequence: None,
            source: None,
        }
    }

    pub fn unique_violation(constraint: &str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            sql_state: Some(UNIQUE_VIOLATION.to_string()),
            constraint: Some(constraint.to_string()),
            conflicting_sequence: None,
            source: None,
        }
    }

    pub fn io(context: &str, error: std::io::Error) -> Self {
        Self {
            message: format!("{context}: {error}"),
            sql_state: None,
            constraint: None,
            conflicting_sequence: None,
            source: Some(Box::new(error)),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        // 08006: connection failure
        Self::new(message).with_sql_state("08006")
    }

    pub fn with_sql_state(mut self, sql_state: impl Into<String>) -> Self {
        self.sql_state = Some(sql_state.into());
        self
    }

    /// Names the sequence number whose key already existed.
    pub fn with_conflicting_sequence(mut self, sequence_number: u64) -> Self {
        self.conflicting_sequence = Some(sequence_number);
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn sql_state(&self) -> Option<&str> {
        self.sql_state.as_deref()
    }

    pub fn constraint(&self) -> Option<&str> {
        self.constraint.as_deref()
    }

    pub fn conflicting_sequence(&self) -> Option<u64> {
        self.conflicting_sequence
    }
}

#[async_trait]
pub trait EntryStore: Send + Sync + 'static {
    /// Durably stores one event record. A record whose key already exists is rejected.
    async fn persist_event(&self, entry: SerializedEntry) -> Result<(), BackendFailure>;

    /// Stores several event records.
    ///
    /// The default writes record by record and leaves earlier records durable when a later
    /// one fails. Backends that can do better override it with an all-or-nothing write.
    async fn persist_events(&self, entries: Vec<SerializedEntry>) -> Result<(), BackendFailure> {
        for entry in entries {
            self.persist_event(entry).await?;
        }
        Ok(())
    }

    /// Durably stores one snapshot record. Snapshots never collide with events.
    async fn persist_snapshot(&self, entry: SerializedEntry) -> Result<(), BackendFailure>;

    /// At most `max_count` events of one aggregate with sequence >= `first_sequence`, ascending.
    async fn fetch_batch(
        &self,
        aggregate_type: &str,
        aggregate_identifier: &AggregateIdentifier,
        first_sequence: u64,
        max_count: usize,
    ) -> Result<Vec<SerializedEntry>, BackendFailure>;

    async fn fetch_latest_snapshot(
        &self,
        aggregate_type: &str,
        aggregate_identifier: &AggregateIdentifier,
    ) -> Result<Option<SerializedEntry>, BackendFailure>;

    /// Deletes all but the `keep_newest` highest-sequence snapshots of one aggregate.
    async fn prune_snapshots(
        &self,
        aggregate_type: &str,
        aggregate_identifier: &AggregateIdentifier,
        keep_newest: usize,
    ) -> Result<(), BackendFailure>;

    /// Every event record (never snapshots) in storage order, optionally of one type only.
    fn visit_all<'a>(
        &'a self,
        aggregate_type: Option<&'a str>,
    ) -> BoxStream<'a, Result<SerializedEntry, BackendFailure>>;
}
