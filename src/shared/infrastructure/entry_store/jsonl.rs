// Log-structured EntryStore backed by JSON lines files.
//
// Purpose
// - Durable backend for local tooling and single-process deployments.
//
// Layout
// - <dir>/events.jsonl     append-only event batches
// - <dir>/snapshots.jsonl  snapshot batches, rewritten atomically when pruned
// - Every line is one batch: a JSON array of records. A batch is committed once its
//   terminating newline is on disk.
//
// Responsibilities
// - Rebuild the in memory EntryTable from the logs on open.
// - Check the uniqueness constraint before a batch reaches the log, then append and sync.
// - Drop an incomplete final batch left by a crash, and stray bytes left by a failed append.

use crate::shared::core::primitives::AggregateIdentifier;
use crate::shared::infrastructure::entry_store::in_memory::visit_table;
use crate::shared::infrastructure::entry_store::table::EntryTable;
use crate::shared::infrastructure::entry_store::{BackendFailure, EntryStore, SerializedEntry};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::sync::RwLock;

const EVENTS_FILE: &str = "events.jsonl";
const SNAPSHOTS_FILE: &str = "snapshots.jsonl";

pub struct JsonlEntryStore {
    events_path: PathBuf,
    snapshots_path: PathBuf,
    table: RwLock<EntryTable>,
    // bytes of committed batches per log; only changed under the table write lock
    events_len: AtomicU64,
    snapshots_len: AtomicU64,
}

impl JsonlEntryStore {
    /// Opens the store in `dir`, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, BackendFailure> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .map_err(|e| BackendFailure::io(&format!("create {}", dir.display()), e))?;
        let events_path = dir.join(EVENTS_FILE);
        let snapshots_path = dir.join(SNAPSHOTS_FILE);

        let mut table = EntryTable::new();
        let events = read_log(&events_path)?;
        for entry in events.entries {
            table.insert_event(entry)?;
        }
        let snapshots = read_log(&snapshots_path)?;
        let snapshot_count = snapshots.entries.len();
        for entry in snapshots.entries {
            table.insert_snapshot(entry);
        }
        tracing::debug!(
            path = %dir.display(),
            events = table.event_count(),
            snapshots = snapshot_count,
            "opened jsonl entry store"
        );

        Ok(Self {
            events_path,
            snapshots_path,
            table: RwLock::new(table),
            events_len: AtomicU64::new(events.committed_len),
            snapshots_len: AtomicU64::new(snapshots.committed_len),
        })
    }

    async fn append_events_batch(&self, entries: &[SerializedEntry]) -> Result<(), BackendFailure> {
        let committed = self.events_len.load(Ordering::Acquire);
        let len = append_batch(&self.events_path, committed, entries).await?;
        self.events_len.store(len, Ordering::Release);
        Ok(())
    }
}

#[derive(Default)]
struct LogContents {
    entries: Vec<SerializedEntry>,
    committed_len: u64,
}

fn read_log(path: &Path) -> Result<LogContents, BackendFailure> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LogContents::default()),
        Err(e) => return Err(BackendFailure::io(&format!("read {}", path.display()), e)),
    };

    let mut entries = Vec::new();
    let mut committed = 0;
    let mut rest = bytes.as_slice();
    let mut line_number = 0;
    while let Some(end) = rest.iter().position(|b| *b == b'\n') {
        line_number += 1;
        let (line, after) = (&rest[..end], &rest[end + 1..]);
        if !line.trim_ascii().is_empty() {
            match serde_json::from_slice::<Vec<SerializedEntry>>(line) {
                Ok(batch) => entries.extend(batch),
                Err(_) if after.trim_ascii().is_empty() => break,
                Err(e) => {
                    return Err(BackendFailure::new(format!(
                        "corrupt record in {} at line {line_number}: {e}",
                        path.display()
                    )));
                }
            }
        }
        committed += end + 1;
        rest = after;
    }

    if committed < bytes.len() {
        tracing::warn!(
            path = %path.display(),
            dropped_bytes = bytes.len() - committed,
            "dropping incomplete batch at end of log"
        );
        truncate_log(path, committed as u64)?;
    }
    Ok(LogContents {
        entries,
        committed_len: committed as u64,
    })
}

fn truncate_log(path: &Path, len: u64) -> Result<(), BackendFailure> {
    let context = format!("truncate {}", path.display());
    let file = std::fs::OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| BackendFailure::io(&context, e))?;
    file.set_len(len).map_err(|e| BackendFailure::io(&context, e))?;
    file.sync_all().map_err(|e| BackendFailure::io(&context, e))
}

fn encode_batch<'a>(
    path: &Path,
    entries: impl IntoIterator<Item = &'a SerializedEntry>,
    buffer: &mut Vec<u8>,
) -> Result<(), BackendFailure> {
    let batch: Vec<&SerializedEntry> = entries.into_iter().collect();
    serde_json::to_writer(&mut *buffer, &batch)
        .map_err(|e| BackendFailure::new(format!("encode batch for {}: {e}", path.display())))?;
    buffer.push(b'\n');
    Ok(())
}

/// Appends one batch after the `committed` bytes of the log and returns the new committed length.
async fn append_batch(
    path: &Path,
    committed: u64,
    entries: &[SerializedEntry],
) -> Result<u64, BackendFailure> {
    let mut line = Vec::new();
    encode_batch(path, entries, &mut line)?;
    let context = format!("append to {}", path.display());
    let mut file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)
        .await
        .map_err(|e| BackendFailure::io(&context, e))?;

    let on_disk = file
        .metadata()
        .await
        .map_err(|e| BackendFailure::io(&context, e))?
        .len();
    if on_disk != committed {
        tracing::warn!(
            path = %path.display(),
            stray_bytes = on_disk.saturating_sub(committed),
            "cutting bytes left by a failed append"
        );
        file.set_len(committed)
            .await
            .map_err(|e| BackendFailure::io(&context, e))?;
    }

    if let Err(error) = write_at(&mut file, committed, &line).await {
        if let Err(rollback) = file.set_len(committed).await {
            // the next append retries the cut
            tracing::error!(path = %path.display(), error = %rollback, "failed to roll back append");
        }
        return Err(BackendFailure::io(&context, error));
    }
    Ok(committed + line.len() as u64)
}

async fn write_at(file: &mut fs::File, offset: u64, bytes: &[u8]) -> std::io::Result<()> {
    file.seek(SeekFrom::Start(offset)).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_data().await
}

/// Replaces the log with `bytes` through a synced temp file and returns the new length.
async fn rewrite_log(path: &Path, bytes: &[u8]) -> Result<u64, BackendFailure> {
    let temp_path = path.with_extension("jsonl.tmp");
    let context = format!("rewrite {}", path.display());
    let written = async {
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&temp_path, path).await
    }
    .await;
    if let Err(error) = written {
        let _ = fs::remove_file(&temp_path).await;
        return Err(BackendFailure::io(&context, error));
    }
    Ok(bytes.len() as u64)
}

#[async_trait]
impl EntryStore for JsonlEntryStore {
    async fn persist_event(&self, entry: SerializedEntry) -> Result<(), BackendFailure> {
        let mut table = self.table.write().await;
        table.check_insertable(std::slice::from_ref(&entry))?;
        self.append_events_batch(std::slice::from_ref(&entry)).await?;
        table.insert_event(entry)
    }

    async fn persist_events(&self, entries: Vec<SerializedEntry>) -> Result<(), BackendFailure> {
        let mut table = self.table.write().await;
        table.check_insertable(&entries)?;
        self.append_events_batch(&entries).await?;
        for entry in entries {
            table.insert_event(entry)?;
        }
        Ok(())
    }

    async fn persist_snapshot(&self, entry: SerializedEntry) -> Result<(), BackendFailure> {
        let mut table = self.table.write().await;
        let committed = self.snapshots_len.load(Ordering::Acquire);
        let len = append_batch(&self.snapshots_path, committed, std::slice::from_ref(&entry)).await?;
        self.snapshots_len.store(len, Ordering::Release);
        table.insert_snapshot(entry);
        Ok(())
    }

    async fn fetch_batch(
        &self,
        aggregate_type: &str,
        aggregate_identifier: &AggregateIdentifier,
        first_sequence: u64,
        max_count: usize,
    ) -> Result<Vec<SerializedEntry>, BackendFailure> {
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
        let mut table = self.table.write().await;
        let Some(kept) = table.retained_snapshots(aggregate_type, aggregate_identifier, keep_newest)
        else {
            return Ok(());
        };
        let removed = table.snapshots_of(aggregate_type, aggregate_identifier).len() - kept.len();

        let mut log = Vec::new();
        let others = table.all_snapshots().filter(|snapshot| {
            snapshot.aggregate_type != aggregate_type
                || snapshot.aggregate_identifier != *aggregate_identifier
        });
        for snapshot in others.chain(kept.iter()) {
            encode_batch(&self.snapshots_path, [snapshot], &mut log)?;
        }
        let len = rewrite_log(&self.snapshots_path, &log).await?;

        self.snapshots_len.store(len, Ordering::Release);
        table.replace_snapshots(aggregate_type, aggregate_identifier, kept);
        tracing::debug!(
            aggregate_type,
            aggregate_identifier = %aggregate_identifier,
            removed,
            "pruned snapshots and compacted snapshot log"
        );
        Ok(())
    }

    fn visit_all<'a>(
        &'a self,
        aggregate_type: Option<&'a str>,
    ) -> BoxStream<'a, Result<SerializedEntry, BackendFailure>> {
        visit_table(&self.table, aggregate_type)
    }
}
