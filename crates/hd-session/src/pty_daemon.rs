use std::collections::HashMap;
use std::io::{Read as IoRead, Write as IoWrite};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use hd_core::config::{DaemonConfig, SessionConfig};
use hd_core::types::PtyId;
use portable_pty::{native_pty_system, CommandBuilder, PtySize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::buffer::{sanitize, OutputBuffer, RawAccessPolicy};
use crate::daemon::{
    BufferRead, BufferReadMode, CreateRequest, CreatedPty, DaemonError, OutputChunk,
    PtyDaemonClient, PtyStatus, Result,
};

fn lock<'a, T>(m: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    m.lock().unwrap_or_else(|e| {
        warn!("{what} lock was poisoned, recovering");
        e.into_inner()
    })
}

// ---------------------------------------------------------------------------
// PtySlot
// ---------------------------------------------------------------------------

/// Output side shared between a slot and its reader thread.
struct SlotOutput {
    buffer: OutputBuffer,
    subscribers: Vec<flume::Sender<OutputChunk>>,
}

impl SlotOutput {
    /// Buffer the chunk and fan it out in one step, so a subscriber either
    /// sees it live or finds it in the next snapshot, never neither.
    fn publish(&mut self, data: &[u8]) {
        let offset = self.buffer.written();
        self.buffer.push(data);
        self.subscribers.retain(|tx| {
            tx.send(OutputChunk {
                offset,
                data: data.to_vec(),
            })
            .is_ok()
        });
    }
}

struct PtySlot {
    child: Arc<Mutex<Box<dyn portable_pty::Child + Send + Sync>>>,
    master: Mutex<Box<dyn portable_pty::MasterPty + Send>>,
    writer: flume::Sender<Vec<u8>>,
    output: Arc<Mutex<SlotOutput>>,
    session_id: String,
}

impl PtySlot {
    fn is_alive(&self) -> bool {
        let mut child = lock(&self.child, "child");
        matches!(child.try_wait(), Ok(None))
    }
}

// ---------------------------------------------------------------------------
// LocalPtyDaemon
// ---------------------------------------------------------------------------

/// In-process PTY daemon backed by `portable-pty`.
///
/// Owns the process table: ids are minted here and only here.
pub struct LocalPtyDaemon {
    max_ptys: usize,
    buffer_capacity: usize,
    shell: String,
    slots: Mutex<HashMap<PtyId, PtySlot>>,
    next_id: AtomicU64,
    raw_access: Mutex<RawAccessPolicy>,
}

impl LocalPtyDaemon {
    pub fn new(daemon: &DaemonConfig, session: &SessionConfig) -> Self {
        let shell = session
            .shell
            .clone()
            .or_else(|| std::env::var("SHELL").ok())
            .unwrap_or_else(|| "/bin/sh".to_string());
        info!(max_ptys = daemon.max_ptys, %shell, "creating LocalPtyDaemon");
        Self {
            max_ptys: daemon.max_ptys,
            buffer_capacity: daemon.buffer_capacity,
            shell,
            slots: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            raw_access: Mutex::new(RawAccessPolicy::new(daemon.raw_buffer_access)),
        }
    }

    /// Number of PTYs currently tracked, dead or alive.
    pub fn active_count(&self) -> usize {
        lock(&self.slots, "daemon").len()
    }

    /// Whether another PTY fits. A full table first drops processes that
    /// exited on their own; until then their backlog stays readable.
    fn has_room(&self, slots: &mut HashMap<PtyId, PtySlot>) -> bool {
        if slots.len() < self.max_ptys {
            return true;
        }
        let before = slots.len();
        slots.retain(|id, slot| {
            let alive = slot.is_alive();
            if !alive {
                debug!(%id, "reaping exited pty");
            }
            alive
        });
        let reaped = before - slots.len();
        if reaped > 0 {
            info!(reaped, "released exited ptys");
        }
        slots.len() < self.max_ptys
    }

    pub fn max_ptys(&self) -> usize {
        self.max_ptys
    }

    fn spawn_slot(&self, request: &CreateRequest) -> Result<PtySlot> {
        let pair = native_pty_system()
            .openpty(PtySize {
                rows: request.rows,
                cols: request.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| DaemonError::SpawnFailed(e.to_string()))?;

        let program = request.command.as_deref().unwrap_or(&self.shell);
        let mut command = CommandBuilder::new(program);
        for arg in &request.args {
            command.arg(arg);
        }
        if let Some(cwd) = &request.cwd {
            command.cwd(cwd);
        }
        command.env("TERM", "xterm-256color");
        command.env("COLORTERM", "truecolor");
        for (k, v) in &request.env {
            command.env(k, v);
        }

        let child = pair
            .slave
            .spawn_command(command)
            .map_err(|e| DaemonError::SpawnFailed(e.to_string()))?;
        debug!(program, args = ?request.args, "spawned PTY process");

        let output = Arc::new(Mutex::new(SlotOutput {
            buffer: OutputBuffer::new(self.buffer_capacity),
            subscribers: Vec::new(),
        }));

        // -- stdout reader thread --
        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| DaemonError::SpawnFailed(e.to_string()))?;
        let reader_output = Arc::clone(&output);
        std::thread::spawn(move || {
            let mut buf = [0u8; 4096];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => lock(&reader_output, "output").publish(&buf[..n]),
                    Err(e) => {
                        // EIO is expected on some platforms when the child exits
                        if e.kind() != std::io::ErrorKind::Other {
                            debug!("pty reader error: {e}");
                        }
                        break;
                    }
                }
            }
        });

        // -- stdin writer thread --
        let (write_tx, write_rx) = flume::bounded::<Vec<u8>>(256);
        let mut writer = pair
            .master
            .take_writer()
            .map_err(|e| DaemonError::SpawnFailed(e.to_string()))?;
        std::thread::spawn(move || {
            while let Ok(data) = write_rx.recv() {
                if writer.write_all(&data).is_err() {
                    break;
                }
                let _ = writer.flush();
            }
        });

        Ok(PtySlot {
            child: Arc::new(Mutex::new(child)),
            master: Mutex::new(pair.master),
            writer: write_tx,
            output,
            session_id: Uuid::new_v4().to_string(),
        })
    }
}

#[async_trait]
impl PtyDaemonClient for LocalPtyDaemon {
    async fn create(&self, request: CreateRequest) -> Result<CreatedPty> {
        if !self.has_room(&mut lock(&self.slots, "daemon")) {
            return Err(DaemonError::AtCapacity { max: self.max_ptys });
        }

        let slot = self.spawn_slot(&request)?;
        let id = PtyId(format!(
            "pty-{}",
            self.next_id.fetch_add(1, Ordering::Relaxed)
        ));
        let session_id = slot.session_id.clone();

        let mut slots = lock(&self.slots, "daemon");
        if !self.has_room(&mut slots) {
            // Lost a race with another create; do not leak the process.
            let _ = lock(&slot.child, "child").kill();
            return Err(DaemonError::AtCapacity { max: self.max_ptys });
        }
        slots.insert(id.clone(), slot);
        info!(%id, "pty created");
        Ok(CreatedPty {
            id,
            session_id: Some(session_id),
        })
    }

    async fn write(&self, id: &PtyId, text: &str) -> Result<bool> {
        let slots = lock(&self.slots, "daemon");
        match slots.get(id) {
            Some(slot) => Ok(slot.writer.send(text.as_bytes().to_vec()).is_ok()),
            None => Ok(false),
        }
    }

    async fn resize(&self, id: &PtyId, cols: u16, rows: u16) -> Result<()> {
        let slots = lock(&self.slots, "daemon");
        let slot = slots
            .get(id)
            .ok_or_else(|| DaemonError::NotFound(id.clone()))?;
        let master = lock(&slot.master, "master");
        master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| DaemonError::Internal(format!("resize failed: {e}")))?;
        debug!(%id, cols, rows, "PTY resized");
        Ok(())
    }

    async fn kill(&self, id: &PtyId) -> Result<()> {
        let removed = lock(&self.slots, "daemon").remove(id);
        match removed {
            Some(slot) => {
                let mut child = lock(&slot.child, "child");
                if let Err(e) = child.kill() {
                    // Already exited on its own; nothing left to do.
                    debug!(%id, "kill after exit: {e}");
                }
                let _ = child.try_wait();
                info!(%id, "pty killed");
            }
            None => debug!(%id, "kill for unknown pty ignored"),
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<PtyStatus>> {
        let slots = lock(&self.slots, "daemon");
        let mut table: Vec<PtyStatus> = slots
            .iter()
            .map(|(id, slot)| PtyStatus {
                id: id.clone(),
                alive: slot.is_alive(),
            })
            .collect();
        table.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(table)
    }

    async fn subscribe(&self, id: &PtyId) -> Result<flume::Receiver<OutputChunk>> {
        let slots = lock(&self.slots, "daemon");
        let slot = slots
            .get(id)
            .ok_or_else(|| DaemonError::NotFound(id.clone()))?;
        let (tx, rx) = flume::unbounded();
        lock(&slot.output, "output").subscribers.push(tx);
        debug!(%id, "output listener registered");
        Ok(rx)
    }

    async fn read_buffer(&self, id: &PtyId, mode: BufferReadMode) -> Result<BufferRead> {
        if mode == BufferReadMode::Raw
            && !lock(&self.raw_access, "raw access").authorize_read(id.as_str())
        {
            return Err(DaemonError::RawAccessDenied);
        }
        let slots = lock(&self.slots, "daemon");
        let slot = slots
            .get(id)
            .ok_or_else(|| DaemonError::NotFound(id.clone()))?;
        let output = lock(&slot.output, "output");
        let (bytes, truncated) = output.buffer.snapshot();
        let data = match mode {
            BufferReadMode::Sanitized => sanitize(&bytes),
            BufferReadMode::Raw => String::from_utf8_lossy(&bytes).into_owned(),
        };
        Ok(BufferRead {
            id: id.clone(),
            data,
            truncated,
            mode,
            end_offset: output.buffer.written(),
        })
    }

    async fn grant_raw_access(&self, reason: &str) -> Result<()> {
        if lock(&self.raw_access, "raw access").grant(reason) {
            Ok(())
        } else {
            Err(DaemonError::RawAccessDenied)
        }
    }

    async fn revoke_raw_access(&self) {
        lock(&self.raw_access, "raw access").revoke();
    }
}

impl Drop for LocalPtyDaemon {
    fn drop(&mut self) {
        let slots = self.slots.get_mut().unwrap_or_else(|e| e.into_inner());
        for (id, slot) in slots.drain() {
            let _ = lock(&slot.child, "child").kill();
            debug!(%id, "pty killed on daemon shutdown");
        }
    }
}

impl std::fmt::Debug for LocalPtyDaemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalPtyDaemon")
            .field("max_ptys", &self.max_ptys)
            .field("active_count", &self.active_count())
            .finish()
    }
}
