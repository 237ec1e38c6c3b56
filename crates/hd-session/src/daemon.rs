use async_trait::async_trait;
use hd_core::types::PtyId;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("pty daemon is at capacity ({max})")]
    AtCapacity { max: usize },

    #[error("pty not found: {0}")]
    NotFound(PtyId),

    #[error("pty spawn failed: {0}")]
    SpawnFailed(String),

    #[error("raw buffer access is not granted")]
    RawAccessDenied,

    #[error("pty daemon unreachable: {0}")]
    Unreachable(String),

    #[error("pty I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pty internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, DaemonError>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Everything the daemon needs to start a process inside a new PTY.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
    pub cwd: Option<String>,
    pub cols: u16,
    pub rows: u16,
    /// Program to run. `None` starts the user's shell.
    pub command: Option<String>,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl CreateRequest {
    pub fn shell(cols: u16, rows: u16) -> Self {
        Self {
            cwd: None,
            cols,
            rows,
            command: None,
            args: Vec::new(),
            env: Vec::new(),
        }
    }
}

/// Daemon confirmation of a created process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPty {
    pub id: PtyId,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtyStatus {
    pub id: PtyId,
    pub alive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferReadMode {
    /// Escape sequences stripped and credential-looking tokens redacted.
    Sanitized,
    /// Bytes exactly as emitted. Requires an active raw-access grant.
    Raw,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferRead {
    pub id: PtyId,
    pub data: String,
    /// Older output was dropped from the ring before this read.
    pub truncated: bool,
    pub mode: BufferReadMode,
    /// Total bytes the PTY had emitted when the snapshot was taken.
    pub end_offset: u64,
}

/// One chunk of live output. `offset` is the position of the chunk's first
/// byte in the PTY's total output stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    pub offset: u64,
    pub data: Vec<u8>,
}

impl OutputChunk {
    /// `true` when the chunk was already contained in a buffer snapshot
    /// ending at `end_offset`.
    pub fn covered_by(&self, end_offset: u64) -> bool {
        self.offset < end_offset
    }
}

// ---------------------------------------------------------------------------
// PtyDaemonClient
// ---------------------------------------------------------------------------

/// Client side of the process daemon that owns every real PTY.
///
/// Kill is idempotent: killing an unknown or already-dead PTY succeeds.
#[async_trait]
pub trait PtyDaemonClient: Send + Sync {
    async fn create(&self, request: CreateRequest) -> Result<CreatedPty>;

    /// Write text to the PTY. `Ok(false)` when the target is gone.
    async fn write(&self, id: &PtyId, text: &str) -> Result<bool>;

    async fn resize(&self, id: &PtyId, cols: u16, rows: u16) -> Result<()>;

    async fn kill(&self, id: &PtyId) -> Result<()>;

    /// Snapshot of the daemon's process table.
    async fn list(&self) -> Result<Vec<PtyStatus>>;

    /// Register an output listener. Must be called before [`read_buffer`]
    /// when attaching, so nothing emitted in between is lost.
    ///
    /// [`read_buffer`]: PtyDaemonClient::read_buffer
    async fn subscribe(&self, id: &PtyId) -> Result<flume::Receiver<OutputChunk>>;

    async fn read_buffer(&self, id: &PtyId, mode: BufferReadMode) -> Result<BufferRead>;

    /// Enable raw buffer reads for the rest of this session.
    async fn grant_raw_access(&self, reason: &str) -> Result<()>;

    async fn revoke_raw_access(&self);
}
