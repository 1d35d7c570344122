// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot-plus-journal key-value store.
//!
//! All records live in memory; durability comes from an append-only journal
//! of write batches, compacted into a zstd snapshot when it grows large and
//! on graceful shutdown. Every write is synced before the call returns.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

const SNAPSHOT_FILE: &str = "snapshot.json.zst";
const JOURNAL_FILE: &str = "journal.log";

/// Journal size that triggers inline compaction into a fresh snapshot.
const COMPACT_THRESHOLD_BYTES: u64 = 8 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state store corrupt: {0}")]
    Corrupt(String),
}

/// One write in a journal batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WriteOp {
    Put { key: String, value: Vec<u8> },
    Delete { key: String },
}

/// Result of a `transact` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactOutcome {
    /// All version expectations held; writes are durable.
    Committed,
    /// At least one read key changed since the caller observed it.
    /// Re-read and retry.
    Conflict,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Record {
    version: u64,
    value: Vec<u8>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    records: BTreeMap<String, Record>,
}

struct Inner {
    records: BTreeMap<String, Record>,
    journal: File,
    journal_bytes: u64,
    dir: PathBuf,
}

/// Durable key-value snapshot of daemon state.
///
/// Thread-safe; share via `Arc`. Keys are hierarchical strings
/// (see [`crate::keys`]); values are opaque byte strings produced by the
/// [`crate::codec`] envelope.
pub struct StateStore {
    inner: Mutex<Inner>,
}

impl StateStore {
    /// Open (or create) a store rooted at `dir`.
    ///
    /// Loads the snapshot, then replays the journal. A torn final journal
    /// line (crash mid-append) is dropped; damage anywhere else is reported
    /// as [`StoreError::Corrupt`].
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir)?;

        let snapshot_path = dir.join(SNAPSHOT_FILE);
        let mut records = if snapshot_path.exists() {
            let compressed = std::fs::read(&snapshot_path)?;
            let raw = zstd::decode_all(compressed.as_slice())
                .map_err(|e| StoreError::Corrupt(format!("snapshot: {e}")))?;
            let snapshot: Snapshot = serde_json::from_slice(&raw)
                .map_err(|e| StoreError::Corrupt(format!("snapshot: {e}")))?;
            snapshot.records
        } else {
            BTreeMap::new()
        };

        let journal_path = dir.join(JOURNAL_FILE);
        let mut journal = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&journal_path)?;

        let replayed = replay_journal(&journal_path, &mut records)?;
        if replayed > 0 {
            tracing::info!(batches = replayed, "replayed journal after snapshot");
        }

        journal.seek(SeekFrom::End(0))?;
        let journal_bytes = journal.metadata()?.len();

        Ok(Self {
            inner: Mutex::new(Inner { records, journal, journal_bytes, dir: dir.to_path_buf() }),
        })
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.lock().records.get(key).map(|r| r.value.clone())
    }

    /// Value plus its current version (for `transact` read sets).
    pub fn get_versioned(&self, key: &str) -> Option<(Vec<u8>, u64)> {
        self.inner.lock().records.get(key).map(|r| (r.value.clone(), r.version))
    }

    /// Current version of a key; 0 when absent.
    pub fn version(&self, key: &str) -> u64 {
        self.inner.lock().records.get(key).map(|r| r.version).unwrap_or(0)
    }

    /// Write a value. Durable on return.
    pub fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let ops = vec![WriteOp::Put { key: key.to_string(), value }];
        inner.commit(&ops)
    }

    /// Remove a key. Durable on return; removing an absent key is a no-op.
    pub fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if !inner.records.contains_key(key) {
            return Ok(());
        }
        let ops = vec![WriteOp::Delete { key: key.to_string() }];
        inner.commit(&ops)
    }

    /// Atomically apply `writes` if every `(key, version)` in `reads` still
    /// holds (absent keys have version 0).
    pub fn transact(
        &self,
        reads: &[(&str, u64)],
        writes: Vec<WriteOp>,
    ) -> Result<TransactOutcome, StoreError> {
        let mut inner = self.inner.lock();
        for (key, expected) in reads {
            let current = inner.records.get(*key).map(|r| r.version).unwrap_or(0);
            if current != *expected {
                return Ok(TransactOutcome::Conflict);
            }
        }
        inner.commit(&writes)?;
        Ok(TransactOutcome::Committed)
    }

    /// All `(key, value)` pairs whose key starts with `prefix`, key-ordered.
    pub fn list_prefix(&self, prefix: &str) -> Vec<(String, Vec<u8>)> {
        let inner = self.inner.lock();
        inner
            .records
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, r)| (k.clone(), r.value.clone()))
            .collect()
    }

    /// Compact the journal into a fresh snapshot now.
    ///
    /// Called on graceful shutdown; also triggered automatically when the
    /// journal exceeds its size threshold.
    pub fn compact(&self) -> Result<(), StoreError> {
        self.inner.lock().write_snapshot()
    }
}

impl Inner {
    /// Apply a batch to memory, append it to the journal, and sync.
    fn commit(&mut self, ops: &[WriteOp]) -> Result<(), StoreError> {
        for op in ops {
            match op {
                WriteOp::Put { key, value } => {
                    let entry = self
                        .records
                        .entry(key.clone())
                        .or_insert(Record { version: 0, value: Vec::new() });
                    entry.version += 1;
                    entry.value = value.clone();
                }
                WriteOp::Delete { key } => {
                    self.records.remove(key);
                }
            }
        }

        let mut line = serde_json::to_vec(ops)
            .map_err(|e| StoreError::Corrupt(format!("journal encode: {e}")))?;
        line.push(b'\n');
        self.journal.write_all(&line)?;
        self.journal.sync_data()?;
        self.journal_bytes += line.len() as u64;

        if self.journal_bytes > COMPACT_THRESHOLD_BYTES {
            self.write_snapshot()?;
        }
        Ok(())
    }

    /// Write the snapshot atomically (tmp + rename) and truncate the journal.
    fn write_snapshot(&mut self) -> Result<(), StoreError> {
        let raw = serde_json::to_vec(&Snapshot { records: self.records.clone() })
            .map_err(|e| StoreError::Corrupt(format!("snapshot encode: {e}")))?;
        let compressed = zstd::encode_all(raw.as_slice(), 3)
            .map_err(|e| StoreError::Corrupt(format!("snapshot compress: {e}")))?;

        let tmp = self.dir.join(format!("{SNAPSHOT_FILE}.tmp"));
        let dest = self.dir.join(SNAPSHOT_FILE);
        std::fs::write(&tmp, &compressed)?;
        std::fs::rename(&tmp, &dest)?;

        self.journal.set_len(0)?;
        self.journal.seek(SeekFrom::Start(0))?;
        self.journal.sync_data()?;
        self.journal_bytes = 0;

        tracing::debug!(
            records = self.records.len(),
            bytes = compressed.len(),
            "state snapshot written"
        );
        Ok(())
    }
}

/// Replay journal batches into `records`. Returns the batch count applied.
fn replay_journal(
    path: &Path,
    records: &mut BTreeMap<String, Record>,
) -> Result<usize, StoreError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let lines: Vec<String> = reader.lines().collect::<Result<_, _>>()?;

    let mut applied = 0usize;
    let last = lines.len();
    for (idx, line) in lines.iter().enumerate() {
        if line.is_empty() {
            continue;
        }
        let ops: Vec<WriteOp> = match serde_json::from_str(line) {
            Ok(ops) => ops,
            // A torn final line is expected crash damage; anything earlier
            // means the journal itself is damaged.
            Err(e) if idx + 1 == last => {
                tracing::warn!("dropping torn journal tail: {e}");
                break;
            }
            Err(e) => {
                return Err(StoreError::Corrupt(format!("journal line {}: {e}", idx + 1)));
            }
        };
        for op in ops {
            match op {
                WriteOp::Put { key, value } => {
                    let entry =
                        records.entry(key).or_insert(Record { version: 0, value: Vec::new() });
                    entry.version += 1;
                    entry.value = value;
                }
                WriteOp::Delete { key } => {
                    records.remove(&key);
                }
            }
        }
        applied += 1;
    }
    Ok(applied)
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
