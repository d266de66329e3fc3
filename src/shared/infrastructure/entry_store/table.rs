// Backend-agnostic record table used by the built-in entry stores.
//
// Responsibilities
// - Keep events in insertion order and index them per aggregate key and sequence number.
// - Enforce the (type, identifier, sequence) uniqueness constraint.
// - Keep snapshots per aggregate key and select or prune them by sequence number.
//
// Boundaries
// - No locking. The owning backend guards the table and decides what "durable" means.

use crate::shared::core::primitives::{AggregateIdentifier, AggregateKey};
use crate::shared::infrastructure::entry_store::{
    BackendFailure, DOMAIN_EVENT_ENTRY_KEY, SerializedEntry,
};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Default)]
pub struct EntryTable {
    events: Vec<SerializedEntry>,
    index: HashMap<AggregateKey, BTreeMap<u64, usize>>,
    snapshots: HashMap<AggregateKey, Vec<SerializedEntry>>,
}

fn key_of(entry: &SerializedEntry) -> AggregateKey {
    AggregateKey::new(entry.aggregate_type.clone(), entry.aggregate_identifier.clone())
}

fn duplicate_key(entry: &SerializedEntry) -> BackendFailure {
    BackendFailure::unique_violation(
        DOMAIN_EVENT_ENTRY_KEY,
        format!(
            "Constraint violation: duplicate key value violates unique constraint \"{}\" (type, aggregate_identifier, sequence_number)=({}, {}, {})",
            DOMAIN_EVENT_ENTRY_KEY,
            entry.aggregate_type,
            entry.aggregate_identifier,
            entry.sequence_number
        ),
    )
    .with_conflicting_sequence(entry.sequence_number)
}

impl EntryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn contains_event(&self, entry: &SerializedEntry) -> bool {
        self.index
            .get(&key_of(entry))
            .is_some_and(|sequences| sequences.contains_key(&entry.sequence_number))
    }

    /// Rejects entries that collide with stored events or with each other, without writing.
    pub fn check_insertable(&self, entries: &[SerializedEntry]) -> Result<(), BackendFailure> {
        let mut batch_keys = HashSet::with_capacity(entries.len());
        for entry in entries {
            let fresh = batch_keys.insert((key_of(entry), entry.sequence_number));
            if !fresh || self.contains_event(entry) {
                return Err(duplicate_key(entry));
            }
        }
        Ok(())
    }

    pub fn insert_event(&mut self, entry: SerializedEntry) -> Result<(), BackendFailure> {
        let sequences = self.index.entry(key_of(&entry)).or_default();
        if sequences.contains_key(&entry.sequence_number) {
            return Err(duplicate_key(&entry));
        }
        sequences.insert(entry.sequence_number, self.events.len());
        self.events.push(entry);
        Ok(())
    }

    pub fn insert_snapshot(&mut self, entry: SerializedEntry) {
        self.snapshots.entry(key_of(&entry)).or_default().push(entry);
    }

    pub fn fetch_batch(
        &self,
        aggregate_type: &str,
        aggregate_identifier: &AggregateIdentifier,
        first_sequence: u64,
        max_count: usize,
    ) -> Vec<SerializedEntry> {
        let key = AggregateKey::new(aggregate_type, aggregate_identifier.clone());
        self.index
            .get(&key)
            .map(|sequences| {
                sequences
                    .range(first_sequence..)
                    .take(max_count)
                    .map(|(_, position)| self.events[*position].clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Highest sequence wins; among equal sequences the most recently written one.
    pub fn latest_snapshot(
        &self,
        aggregate_type: &str,
        aggregate_identifier: &AggregateIdentifier,
    ) -> Option<SerializedEntry> {
        let key = AggregateKey::new(aggregate_type, aggregate_identifier.clone());
        self.snapshots.get(&key).and_then(|snapshots| {
            snapshots
                .iter()
                .enumerate()
                .max_by_key(|(written, snapshot)| (snapshot.sequence_number, *written))
                .map(|(_, snapshot)| snapshot.clone())
        })
    }

    pub fn snapshots_of(
        &self,
        aggregate_type: &str,
        aggregate_identifier: &AggregateIdentifier,
    ) -> Vec<SerializedEntry> {
        let key = AggregateKey::new(aggregate_type, aggregate_identifier.clone());
        self.snapshots.get(&key).cloned().unwrap_or_default()
    }

    /// The `keep_newest` highest-sequence snapshots of one key, or `None` when none would go.
    pub fn retained_snapshots(
        &self,
        aggregate_type: &str,
        aggregate_identifier: &AggregateIdentifier,
        keep_newest: usize,
    ) -> Option<Vec<SerializedEntry>> {
        let key = AggregateKey::new(aggregate_type, aggregate_identifier.clone());
        let snapshots = self.snapshots.get(&key)?;
        if snapshots.len() <= keep_newest {
            return None;
        }
        let mut kept = snapshots.clone();
        // stable: equal sequences keep write order, so the oldest write goes first
        kept.sort_by_key(|snapshot| snapshot.sequence_number);
        kept.drain(..snapshots.len() - keep_newest);
        Some(kept)
    }

    pub fn replace_snapshots(
        &mut self,
        aggregate_type: &str,
        aggregate_identifier: &AggregateIdentifier,
        kept: Vec<SerializedEntry>,
    ) {
        let key = AggregateKey::new(aggregate_type, aggregate_identifier.clone());
        if kept.is_empty() {
            self.snapshots.remove(&key);
        } else {
            self.snapshots.insert(key, kept);
        }
    }

    /// Keeps the `keep_newest` highest-sequence snapshots of one key. Returns how many were removed.
    pub fn prune_snapshots(
        &mut self,
        aggregate_type: &str,
        aggregate_identifier: &AggregateIdentifier,
        keep_newest: usize,
    ) -> usize {
        let Some(kept) = self.retained_snapshots(aggregate_type, aggregate_identifier, keep_newest)
        else {
            return 0;
        };
        let removed = self.snapshots_of(aggregate_type, aggregate_identifier).len() - kept.len();
        self.replace_snapshots(aggregate_type, aggregate_identifier, kept);
        removed
    }

    pub fn all_snapshots(&self) -> impl Iterator<Item = &SerializedEntry> {
        self.snapshots.values().flatten()
    }

    /// First event at or after `position` in storage order matching the type filter.
    pub fn next_event_from(
        &self,
        position: usize,
        aggregate_type: Option<&str>,
    ) -> Option<(usize, SerializedEntry)> {
        self.events
            .iter()
            .enumerate()
            .skip(position)
            .find(|(_, entry)| aggregate_type.is_none_or(|t| entry.aggregate_type == t))
            .map(|(index, entry)| (index, entry.clone()))
    }
}
