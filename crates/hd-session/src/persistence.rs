use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use hd_core::types::PersistedSessionRecord;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("persistence backend unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, PersistenceError>;

// ---------------------------------------------------------------------------
// PersistenceGateway
// ---------------------------------------------------------------------------

/// Durable storage of the terminal session records.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// `Ok(None)` when nothing was ever saved.
    async fn load_terminal_state(&self) -> Result<Option<Vec<PersistedSessionRecord>>>;

    /// Replace the stored collection. Callers go through the debounced
    /// writer rather than calling this directly.
    async fn save_terminal_state(&self, records: &[PersistedSessionRecord]) -> Result<()>;

    /// Delete one record right away.
    async fn remove_session(&self, id: Uuid) -> Result<()>;

    /// Delete every record.
    async fn clear(&self) -> Result<()>;

    /// Move stored state that failed to load out of the way, so the next
    /// save cannot overwrite it. An error means it is still in place.
    async fn preserve_unreadable(&self) -> Result<()>;
}

// ---------------------------------------------------------------------------
// FileGateway
// ---------------------------------------------------------------------------

/// Stores the records as one JSON array in `terminal_sessions.json`.
pub struct FileGateway {
    path: PathBuf,
}

impl FileGateway {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("terminal_sessions.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where [`preserve_unreadable`](PersistenceGateway::preserve_unreadable)
    /// moves a file that failed to load.
    pub fn backup_path(&self) -> PathBuf {
        self.path.with_extension("json.bak")
    }

    async fn read_records(&self) -> Result<Option<Vec<PersistedSessionRecord>>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write through a temp file so a crash never leaves a half-written array.
    async fn write_records(&self, records: &[PersistedSessionRecord]) -> Result<()> {
        let json = serde_json::to_string_pretty(records)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl PersistenceGateway for FileGateway {
    async fn load_terminal_state(&self) -> Result<Option<Vec<PersistedSessionRecord>>> {
        self.read_records().await
    }

    async fn save_terminal_state(&self, records: &[PersistedSessionRecord]) -> Result<()> {
        self.write_records(records).await?;
        debug!(count = records.len(), path = %self.path.display(), "terminal state saved");
        Ok(())
    }

    async fn remove_session(&self, id: Uuid) -> Result<()> {
        let Some(mut records) = self.read_records().await? else {
            return Ok(());
        };
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() != before {
            self.write_records(&records).await?;
            debug!(%id, "terminal record removed");
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn preserve_unreadable(&self) -> Result<()> {
        let backup = self.backup_path();
        match tokio::fs::rename(&self.path, &backup).await {
            Ok(()) => {
                warn!(
                    path = %self.path.display(),
                    backup = %backup.display(),
                    "unreadable terminal state moved aside"
                );
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryGateway
// ---------------------------------------------------------------------------

/// Volatile gateway that keeps every save it receives. Useful for embedding
/// the engine without a disk and for observing write order.
#[derive(Default)]
pub struct MemoryGateway {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    records: Option<Vec<PersistedSessionRecord>>,
    saves: Vec<Vec<PersistedSessionRecord>>,
    removed: Vec<Uuid>,
    fail_saves: bool,
    fail_loads: bool,
    pinned: bool,
    preserved: Option<Vec<PersistedSessionRecord>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<PersistedSessionRecord>) -> Self {
        let gateway = Self::default();
        gateway.lock().records = Some(records);
        gateway
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| {
            warn!("memory gateway lock was poisoned, recovering");
            e.into_inner()
        })
    }

    pub fn records(&self) -> Option<Vec<PersistedSessionRecord>> {
        self.lock().records.clone()
    }

    /// Every collection passed to `save_terminal_state`, in order.
    pub fn saves(&self) -> Vec<Vec<PersistedSessionRecord>> {
        self.lock().saves.clone()
    }

    pub fn removed(&self) -> Vec<Uuid> {
        self.lock().removed.clone()
    }

    /// Make subsequent saves fail until switched back.
    pub fn set_fail_saves(&self, fail: bool) {
        self.lock().fail_saves = fail;
    }

    /// Make loads fail, as if the stored state could not be parsed.
    pub fn set_fail_loads(&self, fail: bool) {
        self.lock().fail_loads = fail;
    }

    /// Make `preserve_unreadable` fail, leaving the state where it is.
    pub fn set_pinned(&self, pinned: bool) {
        self.lock().pinned = pinned;
    }

    /// Records moved aside by `preserve_unreadable`, if any.
    pub fn preserved(&self) -> Option<Vec<PersistedSessionRecord>> {
        self.lock().preserved.clone()
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn load_terminal_state(&self) -> Result<Option<Vec<PersistedSessionRecord>>> {
        let state = self.lock();
        if state.fail_loads {
            return Err(PersistenceError::Unavailable("loads disabled".into()));
        }
        Ok(state.records.clone())
    }

    async fn save_terminal_state(&self, records: &[PersistedSessionRecord]) -> Result<()> {
        let mut state = self.lock();
        if state.fail_saves {
            return Err(PersistenceError::Unavailable("saves disabled".into()));
        }
        state.saves.push(records.to_vec());
        state.records = Some(records.to_vec());
        Ok(())
    }

    async fn remove_session(&self, id: Uuid) -> Result<()> {
        let mut state = self.lock();
        state.removed.push(id);
        if let Some(records) = state.records.as_mut() {
            records.retain(|r| r.id != id);
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.lock().records = None;
        Ok(())
    }

    async fn preserve_unreadable(&self) -> Result<()> {
        let mut state = self.lock();
        if state.pinned {
            return Err(PersistenceError::Unavailable("state is pinned".into()));
        }
        state.preserved = state.records.take();
        state.fail_loads = false;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FlushSignal
// ---------------------------------------------------------------------------

type FlushCallback = Box<dyn Fn() + Send + Sync>;

/// Host-side "flush now" notification, raised e.g. right before quitting.
#[derive(Clone, Default)]
pub struct FlushSignal {
    inner: Arc<FlushInner>,
}

#[derive(Default)]
struct FlushInner {
    next_id: AtomicU64,
    callbacks: Mutex<HashMap<u64, FlushCallback>>,
}

impl FlushSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `cb` to run on every flush request.
    pub fn on_flush(&self, cb: impl Fn() + Send + Sync + 'static) -> FlushSubscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.callbacks().insert(id, Box::new(cb));
        FlushSubscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Run every registered callback. Returns how many ran.
    pub fn request_flush(&self) -> usize {
        let callbacks = self.callbacks();
        for cb in callbacks.values() {
            cb();
        }
        callbacks.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.callbacks().len()
    }

    fn callbacks(&self) -> std::sync::MutexGuard<'_, HashMap<u64, FlushCallback>> {
        self.inner.callbacks.lock().unwrap_or_else(|e| {
            warn!("flush signal lock was poisoned, recovering");
            e.into_inner()
        })
    }
}

/// Handle returned by [`FlushSignal::on_flush`].
pub struct FlushSubscription {
    id: u64,
    inner: Weak<FlushInner>,
}

impl FlushSubscription {
    pub fn unsubscribe(self) {
        if let Some(inner) = self.inner.upgrade() {
            let mut callbacks = inner.callbacks.lock().unwrap_or_else(|e| e.into_inner());
            callbacks.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn flush_runs_callbacks_until_unsubscribed() {
        let signal = FlushSignal::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let sub = signal.on_flush(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(signal.request_flush(), 1);
        sub.unsubscribe();
        assert_eq!(signal.request_flush(), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn unsubscribe_after_signal_dropped_is_harmless() {
        let signal = FlushSignal::new();
        let sub = signal.on_flush(|| {});
        drop(signal);
        sub.unsubscribe();
    }
}
