#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use hd_core::types::{AgentConfig, AgentRole, PersistedSessionRecord, PtyId, TerminalInstance};
use hd_session::daemon::{
    BufferRead, BufferReadMode, CreateRequest, CreatedPty, DaemonError, OutputChunk,
    PtyDaemonClient, PtyStatus, Result,
};

/// In-memory daemon that records every call in order.
#[derive(Default)]
pub struct ScriptedDaemon {
    state: Mutex<State>,
    unreachable: AtomicBool,
}

#[derive(Default)]
struct State {
    next_id: u64,
    alive: HashSet<PtyId>,
    buffers: HashMap<PtyId, Vec<u8>>,
    subscribers: HashMap<PtyId, Vec<flume::Sender<OutputChunk>>>,
    created: Vec<CreateRequest>,
    killed: Vec<PtyId>,
    events: Vec<String>,
}

impl ScriptedDaemon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alive(ids: &[&str]) -> Self {
        let daemon = Self::default();
        daemon.lock().alive = ids.iter().map(|id| PtyId::from(*id)).collect();
        daemon
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("scripted daemon lock")
    }

    pub fn killed(&self) -> Vec<PtyId> {
        self.lock().killed.clone()
    }

    pub fn created(&self) -> Vec<CreateRequest> {
        self.lock().created.clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.lock().events.clone()
    }

    pub fn is_alive(&self, id: &PtyId) -> bool {
        self.lock().alive.contains(id)
    }

    /// Simulate the process printing `data`.
    pub fn emit(&self, id: &PtyId, data: &[u8]) {
        let mut state = self.lock();
        let buffer = state.buffers.entry(id.clone()).or_default();
        let offset = buffer.len() as u64;
        buffer.extend_from_slice(data);
        if let Some(subs) = state.subscribers.get_mut(id) {
            subs.retain(|tx| {
                tx.send(OutputChunk {
                    offset,
                    data: data.to_vec(),
                })
                .is_ok()
            });
        }
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(DaemonError::Unreachable("scripted outage".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PtyDaemonClient for ScriptedDaemon {
    async fn create(&self, request: CreateRequest) -> Result<CreatedPty> {
        self.check_reachable()?;
        let mut state = self.lock();
        state.next_id += 1;
        let id = PtyId(format!("pty-{}", state.next_id));
        state.alive.insert(id.clone());
        state.created.push(request);
        state.events.push(format!("create:{id}"));
        Ok(CreatedPty {
            id: id.clone(),
            session_id: Some(format!("session-{id}")),
        })
    }

    async fn write(&self, id: &PtyId, _text: &str) -> Result<bool> {
        self.check_reachable()?;
        Ok(self.lock().alive.contains(id))
    }

    async fn resize(&self, id: &PtyId, _cols: u16, _rows: u16) -> Result<()> {
        self.check_reachable()?;
        if self.lock().alive.contains(id) {
            Ok(())
        } else {
            Err(DaemonError::NotFound(id.clone()))
        }
    }

    async fn kill(&self, id: &PtyId) -> Result<()> {
        self.check_reachable()?;
        let mut state = self.lock();
        state.alive.remove(id);
        state.subscribers.remove(id);
        state.killed.push(id.clone());
        state.events.push(format!("kill:{id}"));
        Ok(())
    }

    async fn list(&self) -> Result<Vec<PtyStatus>> {
        self.check_reachable()?;
        let state = self.lock();
        Ok(state
            .alive
            .iter()
            .map(|id| PtyStatus {
                id: id.clone(),
                alive: true,
            })
            .collect())
    }

    async fn subscribe(&self, id: &PtyId) -> Result<flume::Receiver<OutputChunk>> {
        self.check_reachable()?;
        let mut state = self.lock();
        if !state.alive.contains(id) {
            return Err(DaemonError::NotFound(id.clone()));
        }
        let (tx, rx) = flume::unbounded();
        state.subscribers.entry(id.clone()).or_default().push(tx);
        state.events.push(format!("subscribe:{id}"));
        Ok(rx)
    }

    async fn read_buffer(&self, id: &PtyId, mode: BufferReadMode) -> Result<BufferRead> {
        self.check_reachable()?;
        let mut state = self.lock();
        if !state.alive.contains(id) {
            return Err(DaemonError::NotFound(id.clone()));
        }
        state.events.push(format!("read:{id}"));
        let bytes = state.buffers.get(id).cloned().unwrap_or_default();
        Ok(BufferRead {
            id: id.clone(),
            data: String::from_utf8_lossy(&bytes).into_owned(),
            truncated: false,
            mode,
            end_offset: bytes.len() as u64,
        })
    }

    async fn grant_raw_access(&self, _reason: &str) -> Result<()> {
        Err(DaemonError::RawAccessDenied)
    }

    async fn revoke_raw_access(&self) {}
}

pub fn record(title: &str, pty: Option<&str>) -> PersistedSessionRecord {
    let mut instance = TerminalInstance::shell(title);
    instance.pty_id = pty.map(PtyId::from);
    instance.session_id = pty.map(|p| format!("session-{p}"));
    instance.to_record(Utc::now())
}

pub fn leader_config(id: &str) -> AgentConfig {
    AgentConfig::new(id, format!("Leader {id}"), AgentRole::Leader)
}

pub fn worker_config(id: &str) -> AgentConfig {
    AgentConfig::new(id, format!("Worker {id}"), AgentRole::Worker)
}
