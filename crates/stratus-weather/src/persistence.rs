//! Durable storage for the cache snapshot.
//!
//! Saves are best-effort: failures are logged and the next save overwrites.
//! Loads that fail are treated as a first run.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use stratus_core::PersistenceError;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

use crate::types::CacheSnapshot;

/// Where the cache snapshot lives between launches.
pub trait SnapshotStore: Send + Sync {
    /// Returns `None` when nothing was stored or the stored data is unreadable.
    fn load(&self) -> Option<CacheSnapshot>;

    /// Queue `snapshot` for writing. Never blocks on I/O and never fails.
    fn save(&self, snapshot: &CacheSnapshot);
}

enum WriteRequest {
    Write(Vec<u8>),
    Flush(oneshot::Sender<()>),
}

/// JSON file store with a single writer task.
///
/// Writes are applied in the order `save` was called and go through a
/// temporary file plus rename, so readers never see a partial file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    tx: mpsc::UnboundedSender<WriteRequest>,
}

impl JsonFileStore {
    /// Open the store and start its writer task on the current tokio runtime.
    ///
    /// Fails when called outside a runtime.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let runtime = Handle::try_current()
            .map_err(|e| PersistenceError::Write(format!("snapshot writer needs a tokio runtime: {}", e)))?;

        let path = path.into();
        let (tx, rx) = mpsc::unbounded_channel();
        runtime.spawn(run_writer(path.clone(), rx));
        Ok(Self { path, tx })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait until every save queued before this call has hit the disk.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(WriteRequest::Flush(done_tx)).is_err() {
            tracing::warn!("Snapshot writer stopped; nothing to flush");
            return;
        }
        let _ = done_rx.await;
    }

    fn read(&self) -> Result<Option<CacheSnapshot>, PersistenceError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PersistenceError::Read(e.to_string())),
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| PersistenceError::Corrupt(e.to_string()))
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> Option<CacheSnapshot> {
        match self.read() {
            Ok(Some(snapshot)) => {
                tracing::info!("Loaded weather cache from {}", self.path.display());
                Some(snapshot)
            }
            Ok(None) => {
                tracing::info!("No weather cache at {}, starting fresh", self.path.display());
                None
            }
            Err(e) => {
                tracing::warn!("Ignoring weather cache at {}: {}", self.path.display(), e);
                None
            }
        }
    }

    fn save(&self, snapshot: &CacheSnapshot) {
        let bytes = match serde_json::to_vec_pretty(snapshot) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Failed to serialize weather cache: {}", e);
                return;
            }
        };

        if self.tx.send(WriteRequest::Write(bytes)).is_err() {
            tracing::warn!("Snapshot writer stopped; weather cache not saved");
        }
    }
}

async fn run_writer(path: PathBuf, mut rx: mpsc::UnboundedReceiver<WriteRequest>) {
    while let Some(request) = rx.recv().await {
        match request {
            WriteRequest::Write(bytes) => {
                if let Err(e) = write_atomically(&path, &bytes).await {
                    tracing::warn!("{}", e);
                }
            }
            WriteRequest::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    tracing::debug!("Snapshot writer for {} exiting", path.display());
}

async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PersistenceError::Write(format!("create {}: {}", parent.display(), e)))?;
    }

    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| PersistenceError::Write(format!("write {}: {}", tmp.display(), e)))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| PersistenceError::Write(format!("rename to {}: {}", path.display(), e)))?;

    tracing::debug!("Saved weather cache ({} bytes)", bytes.len());
    Ok(())
}

/// Store that keeps the last saved snapshot in memory.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    saved: Mutex<Option<CacheSnapshot>>,
    save_count: Mutex<usize>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `snapshot` already stored, as if saved by a previous run.
    pub fn with_snapshot(snapshot: CacheSnapshot) -> Self {
        Self {
            saved: Mutex::new(Some(snapshot)),
            save_count: Mutex::new(0),
        }
    }

    pub fn saved(&self) -> Option<CacheSnapshot> {
        self.saved.lock().clone()
    }

    pub fn save_count(&self) -> usize {
        *self.save_count.lock()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> Option<CacheSnapshot> {
        self.saved.lock().clone()
    }

    fn save(&self, snapshot: &CacheSnapshot) {
        *self.saved.lock() = Some(snapshot.clone());
        *self.save_count.lock() += 1;
    }
}
