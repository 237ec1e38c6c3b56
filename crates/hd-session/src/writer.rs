use std::sync::Arc;
use std::time::Duration;

use hd_core::types::PersistedSessionRecord;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::persistence::{PersistenceError, PersistenceGateway, Result};

enum WriterCommand {
    Save(Vec<PersistedSessionRecord>),
    Remove(Uuid, oneshot::Sender<Result<()>>),
    Clear(oneshot::Sender<Result<()>>),
    Flush(Option<oneshot::Sender<()>>),
    Shutdown(oneshot::Sender<()>),
}

/// Sole writer of the persisted session state.
///
/// Saves are debounced: a burst of [`schedule`](Self::schedule) calls ends in
/// one write of the newest collection once the burst has been quiet for the
/// debounce window. Removals and clears go straight through, in order with
/// the saves.
pub struct PersistenceWriter {
    tx: flume::Sender<WriterCommand>,
    task: Option<JoinHandle<()>>,
}

/// Cheap handle that can only ask the writer to flush. Safe to move into
/// synchronous callbacks.
#[derive(Clone)]
pub struct FlushHandle {
    tx: flume::Sender<WriterCommand>,
}

impl FlushHandle {
    pub fn request_flush(&self) {
        if self.tx.send(WriterCommand::Flush(None)).is_err() {
            debug!("flush requested after persistence writer stopped");
        }
    }
}

impl PersistenceWriter {
    /// Start the writer task on the current tokio runtime.
    pub fn spawn(gateway: Arc<dyn PersistenceGateway>, debounce: Duration) -> Self {
        let (tx, rx) = flume::unbounded();
        let task = tokio::spawn(run(gateway, rx, debounce));
        Self {
            tx,
            task: Some(task),
        }
    }

    /// Queue `records` as the newest state to persist.
    pub fn schedule(&self, records: Vec<PersistedSessionRecord>) {
        if self.tx.send(WriterCommand::Save(records)).is_err() {
            warn!("persistence writer stopped; dropping save");
        }
    }

    /// Delete one record now, bypassing the debounce.
    pub async fn remove(&self, id: Uuid) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.send(WriterCommand::Remove(id, ack))?;
        done.await.map_err(|_| stopped())?
    }

    /// Drop any pending save and delete every record.
    pub async fn clear(&self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.send(WriterCommand::Clear(ack))?;
        done.await.map_err(|_| stopped())?
    }

    /// Write any pending save now and wait until it is done.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.send(WriterCommand::Flush(Some(ack))).is_ok() {
            let _ = done.await;
        }
    }

    pub fn flush_handle(&self) -> FlushHandle {
        FlushHandle {
            tx: self.tx.clone(),
        }
    }

    /// Flush pending state and stop the task.
    pub async fn shutdown(mut self) {
        let (ack, done) = oneshot::channel();
        if self.send(WriterCommand::Shutdown(ack)).is_ok() {
            let _ = done.await;
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    fn send(&self, cmd: WriterCommand) -> Result<()> {
        self.tx.send(cmd).map_err(|_| stopped())
    }
}

fn stopped() -> PersistenceError {
    PersistenceError::Unavailable("persistence writer stopped".into())
}

async fn write_pending(
    gateway: &dyn PersistenceGateway,
    pending: &mut Option<Vec<PersistedSessionRecord>>,
) {
    let Some(records) = pending.take() else {
        return;
    };
    if let Err(e) = gateway.save_terminal_state(&records).await {
        // Not retried: the next save carries the then-current state anyway.
        warn!(error = %e, count = records.len(), "failed to persist terminal state");
    }
}

async fn run(
    gateway: Arc<dyn PersistenceGateway>,
    rx: flume::Receiver<WriterCommand>,
    debounce: Duration,
) {
    let mut pending: Option<Vec<PersistedSessionRecord>> = None;
    let mut deadline: Option<Instant> = None;

    loop {
        let next = match deadline {
            Some(at) => {
                tokio::select! {
                    cmd = rx.recv_async() => cmd.ok(),
                    _ = tokio::time::sleep_until(at) => {
                        deadline = None;
                        write_pending(gateway.as_ref(), &mut pending).await;
                        continue;
                    }
                }
            }
            None => rx.recv_async().await.ok(),
        };

        let Some(cmd) = next else {
            // Every sender is gone.
            write_pending(gateway.as_ref(), &mut pending).await;
            break;
        };

        match cmd {
            WriterCommand::Save(records) => {
                pending = Some(records);
                deadline = Some(Instant::now() + debounce);
            }
            WriterCommand::Remove(id, ack) => {
                if let Some(records) = pending.as_mut() {
                    records.retain(|r| r.id != id);
                }
                let result = gateway.remove_session(id).await;
                if let Err(e) = &result {
                    warn!(%id, error = %e, "failed to remove terminal record");
                }
                let _ = ack.send(result);
            }
            WriterCommand::Clear(ack) => {
                pending = None;
                deadline = None;
                let _ = ack.send(gateway.clear().await);
            }
            WriterCommand::Flush(ack) => {
                deadline = None;
                write_pending(gateway.as_ref(), &mut pending).await;
                if let Some(ack) = ack {
                    let _ = ack.send(());
                }
            }
            WriterCommand::Shutdown(ack) => {
                write_pending(gateway.as_ref(), &mut pending).await;
                let _ = ack.send(());
                break;
            }
        }
    }
    debug!("persistence writer stopped");
}
