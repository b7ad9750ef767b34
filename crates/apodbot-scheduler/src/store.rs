//! File-based schedule store — one JSON document holding every per-target send time.
//!
//! Every mutation rewrites the whole file (the table is bounded by the number
//! of chats). All read-modify-write sequences run under one async mutex;
//! [`ScheduleStore::lock`] hands out that lock so callers can compose several
//! operations without re-entering it.

use std::path::{Path, PathBuf};

use apodbot_core::error::{ApodError, Result};
use apodbot_core::time::SendTime;
use apodbot_core::types::Target;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard};

use crate::codec;

/// File name of the persisted schedule.
pub const SCHEDULE_FILE: &str = "apod_task_config.json";

/// One validated schedule row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub target: Target,
    pub send_time: SendTime,
}

impl ScheduleEntry {
    pub fn new(target: Target, send_time: SendTime) -> Self {
        Self { target, send_time }
    }

    fn to_record(&self) -> TaskRecord {
        TaskRecord {
            send_time: self.send_time.to_string(),
            target: codec::to_value(&self.target),
        }
    }
}

/// A row exactly as stored on disk. Rows are kept raw so one bad row never
/// hides the others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub send_time: String,
    pub target: Value,
}

impl TaskRecord {
    /// Decode into a validated entry.
    pub fn decode(&self) -> Result<ScheduleEntry> {
        let send_time = SendTime::parse(&self.send_time)?;
        let target = codec::from_value(&self.target)?;
        Ok(ScheduleEntry { target, send_time })
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ScheduleFile {
    #[serde(default)]
    tasks: Vec<TaskRecord>,
}

/// Durable schedule table guarded by a store-wide lock.
pub struct ScheduleStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ScheduleStore {
    /// Store the schedule as `apod_task_config.json` inside `dir`.
    pub fn new(dir: &Path) -> Self {
        Self::at(dir.join(SCHEDULE_FILE))
    }

    /// Store the schedule at an explicit file path.
    pub fn at(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire the store lock for a multi-step sequence.
    pub async fn lock(&self) -> LockedStore<'_> {
        LockedStore {
            store: self,
            _guard: self.lock.lock().await,
        }
    }

    /// All decodable entries. Never fails; see [`LockedStore::load`].
    pub async fn load(&self) -> Vec<ScheduleEntry> {
        self.lock().await.load().await
    }

    pub async fn load_records(&self) -> Vec<TaskRecord> {
        self.lock().await.load_records().await
    }

    pub async fn upsert(&self, entry: &ScheduleEntry) -> Result<()> {
        self.lock().await.upsert(entry).await
    }

    pub async fn remove(&self, target: &Target) -> Result<bool> {
        self.lock().await.remove(target).await
    }

    pub async fn replace_all(&self, entries: &[ScheduleEntry]) -> Result<()> {
        self.lock().await.replace_all(entries).await
    }
}

/// The store with its lock held. Dropping it releases the lock.
pub struct LockedStore<'a> {
    store: &'a ScheduleStore,
    _guard: MutexGuard<'a, ()>,
}

impl LockedStore<'_> {
    /// Raw rows. Missing, empty or unparseable files read as an empty table,
    /// and so does a file that cannot be read at all.
    pub async fn load_records(&self) -> Vec<TaskRecord> {
        match self.read_records().await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("⚠️ {e}, treating schedule as empty");
                Vec::new()
            }
        }
    }

    /// Raw rows for a read-modify-write. Unreadable files are an error so a
    /// mutation never rewrites the table from a partial view. Corrupt content
    /// is backed up to `*.json.corrupt` and reads as empty.
    async fn read_records(&self) -> Result<Vec<TaskRecord>> {
        let path = &self.store.path;
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ApodError::Io(std::io::Error::new(
                    e.kind(),
                    format!("failed to read {}: {e}", path.display()),
                )));
            }
        };
        let parsed = std::str::from_utf8(&bytes)
            .map_err(|e| e.to_string())
            .and_then(|content| {
                if content.trim().is_empty() {
                    return Ok(ScheduleFile::default());
                }
                serde_json::from_str::<ScheduleFile>(content).map_err(|e| e.to_string())
            });
        match parsed {
            Ok(file) => Ok(file.tasks),
            Err(reason) => {
                let err = ApodError::StoreCorrupt(format!("{}: {reason}", path.display()));
                tracing::warn!("⚠️ {err}, treating schedule as empty");
                self.keep_corrupt_copy(&bytes).await;
                Ok(Vec::new())
            }
        }
    }

    /// Decodable entries; undecodable rows are logged and skipped.
    pub async fn load(&self) -> Vec<ScheduleEntry> {
        self.load_records()
            .await
            .iter()
            .filter_map(|record| match record.decode() {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("⚠️ Skipping schedule row: {e}");
                    None
                }
            })
            .collect()
    }

    /// Insert or replace the row for `entry.target`, keeping its position.
    pub async fn upsert(&self, entry: &ScheduleEntry) -> Result<()> {
        let mut records = self.read_records().await?;
        let position = records
            .iter()
            .position(|r| codec::same_target(&r.target, &entry.target));
        records.retain(|r| !codec::same_target(&r.target, &entry.target));
        let record = entry.to_record();
        match position {
            Some(idx) => records.insert(idx.min(records.len()), record),
            None => records.push(record),
        }
        self.save_records(&records).await?;
        tracing::info!("💾 Schedule saved: {} at {}", entry.target, entry.send_time);
        Ok(())
    }

    /// Remove the row for `target`. Returns whether one existed; absent rows are not an error.
    pub async fn remove(&self, target: &Target) -> Result<bool> {
        let mut records = self.read_records().await?;
        let before = records.len();
        records.retain(|r| !codec::same_target(&r.target, target));
        if records.len() == before {
            return Ok(false);
        }
        self.save_records(&records).await?;
        tracing::info!("🗑️ Schedule removed: {target}");
        Ok(true)
    }

    /// Overwrite the whole table.
    pub async fn replace_all(&self, entries: &[ScheduleEntry]) -> Result<()> {
        let records: Vec<TaskRecord> = entries.iter().map(ScheduleEntry::to_record).collect();
        self.save_records(&records).await
    }

    async fn save_records(&self, records: &[TaskRecord]) -> Result<()> {
        let path = &self.store.path;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = ScheduleFile {
            tasks: records.to_vec(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        // Temp file plus rename: the table is replaced atomically.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        tracing::debug!("💾 Saved {} schedule rows to {}", records.len(), path.display());
        Ok(())
    }

    async fn keep_corrupt_copy(&self, content: &[u8]) {
        let backup = self.store.path.with_extension("json.corrupt");
        if let Err(e) = tokio::fs::write(&backup, content).await {
            tracing::warn!("⚠️ Could not back up corrupt schedule: {e}");
        }
    }
}
