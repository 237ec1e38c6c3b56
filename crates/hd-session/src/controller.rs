use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use hd_core::config::SessionConfig;
use hd_core::types::{Agent, AgentConfig, AgentRole, PtyId, TerminalInstance, ViewMode};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::agents::AgentDirectory;
use crate::cli_config;
use crate::daemon::{
    BufferReadMode, CreateRequest, CreatedPty, DaemonError, OutputChunk, PtyDaemonClient,
};
use crate::error::{Result, SessionError};
use crate::guard::{GuardedAction, LeaderInvariantGuard};
use crate::link::{self, LinkSource};
use crate::persistence::{FlushSignal, FlushSubscription, PersistenceGateway};
use crate::store::{self, SessionStateStore};
use crate::writer::PersistenceWriter;

// ---------------------------------------------------------------------------
// AttachedTerminal
// ---------------------------------------------------------------------------

/// Result of attaching to a running terminal: the backlog as of attach time
/// plus the live stream that continues after it.
pub struct AttachedTerminal {
    pub pty_id: PtyId,
    pub backlog: String,
    pub truncated: bool,
    /// Output offset the backlog ends at.
    pub end_offset: u64,
    pub output: flume::Receiver<OutputChunk>,
}

impl AttachedTerminal {
    /// Next live chunk, skipping anything the backlog already contained.
    /// `None` once the PTY is gone.
    pub async fn next_chunk(&self) -> Option<OutputChunk> {
        loop {
            let chunk = self.output.recv_async().await.ok()?;
            if !chunk.covered_by(self.end_offset) {
                return Some(chunk);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SessionController
// ---------------------------------------------------------------------------

/// Single owner of the terminal session state.
///
/// Every mutation goes through `&mut self`, so store updates are serialized.
/// Nothing is persisted until [`init`](Self::init) has restored the previous
/// state: the writer does not exist before then.
pub struct SessionController {
    daemon: Arc<dyn PtyDaemonClient>,
    gateway: Arc<dyn PersistenceGateway>,
    store: SessionStateStore,
    agents: AgentDirectory,
    writer: Option<PersistenceWriter>,
    flush_subscription: Option<FlushSubscription>,
    config: SessionConfig,
}

impl SessionController {
    pub fn new(
        daemon: Arc<dyn PtyDaemonClient>,
        gateway: Arc<dyn PersistenceGateway>,
        config: SessionConfig,
    ) -> Self {
        Self {
            daemon,
            gateway,
            store: SessionStateStore::new(),
            agents: AgentDirectory::default(),
            writer: None,
            flush_subscription: None,
            config,
        }
    }

    pub fn instances(&self) -> &[TerminalInstance] {
        self.store.instances()
    }

    pub fn get(&self, id: Uuid) -> Option<&TerminalInstance> {
        self.store.get(id)
    }

    pub fn selected(&self) -> Option<Uuid> {
        self.store.selected()
    }

    pub fn is_ready(&self) -> bool {
        self.store.is_ready()
    }

    /// Whether changes reach the gateway. False before `init` and after a
    /// load failure whose state could not be moved aside.
    pub fn is_persisting(&self) -> bool {
        self.writer.is_some()
    }

    pub fn agents(&self) -> &AgentDirectory {
        &self.agents
    }

    /// Registry events (register, deregister, heartbeat) land here.
    pub fn agents_mut(&mut self) -> &mut AgentDirectory {
        &mut self.agents
    }

    /// Role the instance at `index` resolves to under the leader invariant.
    pub fn resolved_role(&self, index: usize) -> Option<AgentRole> {
        LeaderInvariantGuard::resolved_role(self.store.instances(), self.agents.agents(), index)
    }

    pub fn resolve_agent(&self, index: usize) -> Option<&Agent> {
        let instance = self.store.instances().get(index)?;
        link::resolve_agent(instance, index, self.agents.agents())
    }

    // -- lifecycle ----------------------------------------------------------

    /// Restore persisted state against the daemon's live process table, then
    /// start the writer.
    ///
    /// State that fails to load is moved aside before anything is saved; if
    /// that fails too, the controller runs without persistence rather than
    /// overwrite it. An unreachable daemon makes every persisted PTY
    /// reference count as dead.
    pub async fn init(&mut self, flush: Option<&FlushSignal>) -> Result<()> {
        if self.store.is_ready() {
            return Ok(());
        }

        let (records, saving) = match self.gateway.load_terminal_state().await {
            Ok(records) => (records.unwrap_or_default(), true),
            Err(e) => {
                warn!(error = %e, "failed to load terminal state; starting empty");
                match self.gateway.preserve_unreadable().await {
                    Ok(()) => (Vec::new(), true),
                    Err(e) => {
                        error!(
                            error = %e,
                            "could not move unreadable terminal state aside; saving disabled"
                        );
                        (Vec::new(), false)
                    }
                }
            }
        };

        let alive: HashSet<PtyId> = match self.daemon.list().await {
            Ok(table) => table.into_iter().filter(|p| p.alive).map(|p| p.id).collect(),
            Err(e) => {
                warn!(error = %e, "pty daemon unreachable; treating persisted ptys as dead");
                HashSet::new()
            }
        };

        let restored = records.len();
        self.store.restore(records, &alive);

        if saving {
            let writer = PersistenceWriter::spawn(
                Arc::clone(&self.gateway),
                Duration::from_millis(self.config.debounce_ms),
            );
            if let Some(signal) = flush {
                let handle = writer.flush_handle();
                self.flush_subscription = Some(signal.on_flush(move || handle.request_flush()));
            }
            self.writer = Some(writer);
            self.persist();
        }

        let attached = self
            .store
            .instances()
            .iter()
            .filter(|t| t.pty_id.is_some())
            .count();
        info!(
            restored,
            still_running = attached,
            persisting = saving,
            "session controller ready"
        );
        Ok(())
    }

    /// Flush pending writes, stop the writer and refuse further mutations.
    pub async fn shutdown(&mut self) {
        if let Some(sub) = self.flush_subscription.take() {
            sub.unsubscribe();
        }
        self.persist();
        if let Some(writer) = self.writer.take() {
            writer.shutdown().await;
        }
        self.store.teardown();
        debug!("session controller torn down");
    }

    pub async fn flush(&mut self) {
        self.persist();
        if let Some(writer) = &self.writer {
            writer.flush().await;
        }
    }

    // -- creation -----------------------------------------------------------

    /// Replace the whole collection with a fresh leader.
    ///
    /// The previous leader's PTY is killed first, then every other PTY, and
    /// only then is the new leader installed.
    pub async fn create_leader(&mut self, config: AgentConfig) -> Result<Uuid> {
        self.ensure_ready()?;
        if config.role != AgentRole::Leader {
            return Err(SessionError::InvalidRole {
                expected: AgentRole::Leader,
                actual: config.role,
            });
        }

        let instances = self.store.instances();
        let leader = LeaderInvariantGuard::leader_index(instances, self.agents.agents());
        let mut doomed: Vec<PtyId> = Vec::new();
        if let Some(pty) = leader.and_then(|i| instances[i].pty_id.clone()) {
            doomed.push(pty);
        }
        doomed.extend(
            instances
                .iter()
                .enumerate()
                .filter(|(i, _)| Some(*i) != leader)
                .filter_map(|(_, t)| t.pty_id.clone()),
        );
        for pty in &doomed {
            self.kill_quietly(pty).await;
        }

        self.agents.register(Agent::new(config.clone()));
        let next = store::create_leader(config);
        let id = next[0].id;
        self.store.apply(next)?;
        self.store.select(id);
        self.persist();
        info!(%id, killed = doomed.len(), "leader installed");
        Ok(id)
    }

    /// Append a worker instance. Its PTY is created later by [`launch`](Self::launch)
    /// or reported through [`on_pty_ready`](Self::on_pty_ready).
    pub fn spawn_worker(&mut self, config: AgentConfig) -> Result<Uuid> {
        self.ensure_ready()?;
        if config.role != AgentRole::Worker {
            return Err(SessionError::InvalidRole {
                expected: AgentRole::Worker,
                actual: config.role,
            });
        }
        self.agents.register(Agent::new(config.clone()));
        let instance = TerminalInstance::for_agent(config);
        self.append(instance)
    }

    /// Append an ad-hoc shell, optionally rooted at `cwd`.
    pub fn open_terminal(&mut self, title: &str, cwd: Option<String>) -> Result<Uuid> {
        self.ensure_ready()?;
        let mut instance = TerminalInstance::shell(title);
        instance.working_dir = cwd;
        self.append(instance)
    }

    fn append(&mut self, instance: TerminalInstance) -> Result<Uuid> {
        let id = instance.id;
        let next = store::append(self.store.instances(), instance);
        self.store.apply(next)?;
        if self.store.selected().is_none() {
            self.store.select(id);
        }
        self.persist();
        debug!(%id, "terminal instance added");
        Ok(id)
    }

    // -- process binding ----------------------------------------------------

    /// Create the instance's process and bind it. An instance that already
    /// has a PTY keeps it.
    pub async fn launch(&mut self, id: Uuid, cols: u16, rows: u16) -> Result<PtyId> {
        self.ensure_ready()?;
        let index = self.index(id)?;
        let instance = &self.store.instances()[index];
        if let Some(pty) = &instance.pty_id {
            return Ok(pty.clone());
        }
        let generation = instance.restart_count;

        let identity = link::resolve_linked(instance, index, self.agents.agents()).map(|r| {
            cli_config::LaunchIdentity {
                agent_id: r.agent.id(),
                role: r.agent.role(),
            }
        });
        let request = match cli_config::build(identity, instance) {
            Some(spec) => CreateRequest {
                cwd: spec.cwd,
                cols,
                rows,
                command: spec.command,
                args: spec.args,
                env: spec.env,
            },
            None => CreateRequest {
                cwd: instance.launch_dir().map(str::to_string),
                env: vec![(cli_config::ENV_TERMINAL_ID.to_string(), id.to_string())],
                ..CreateRequest::shell(cols, rows)
            },
        };

        debug!(%id, command = ?request.command, generation, "launching terminal");
        let created = self.daemon.create(request).await?;
        self.on_pty_ready(id, generation, created).await
    }

    /// Bind a process the daemon confirmed for `id` at `generation`.
    ///
    /// This is the only place a PTY reference is ever stored. A report for an
    /// instance that was closed or restarted in the meantime kills the
    /// orphan instead.
    pub async fn on_pty_ready(
        &mut self,
        id: Uuid,
        generation: u32,
        created: CreatedPty,
    ) -> Result<PtyId> {
        if !self.store.is_ready() {
            self.kill_quietly(&created.id).await;
            return Err(SessionError::NotRestored);
        }
        let Some(current) = self.store.get(id).map(|t| t.restart_count) else {
            warn!(%id, pty = %created.id, "pty ready for a closed terminal; killing orphan");
            self.kill_quietly(&created.id).await;
            return Err(SessionError::NotFound(id));
        };
        if current != generation {
            warn!(%id, pty = %created.id, generation, current, "stale pty ready; killing orphan");
            self.kill_quietly(&created.id).await;
            return Err(SessionError::StaleLaunch {
                id,
                reported: generation,
                current,
            });
        }

        let pty = created.id.clone();
        let next = store::mark_ready(
            self.store.instances(),
            id,
            generation,
            created.id,
            created.session_id,
        )
        .ok_or(SessionError::NotFound(id))?;
        self.store.apply(next)?;
        self.persist();
        info!(%id, %pty, "terminal bound to pty");
        Ok(pty)
    }

    /// Attach to the instance's output: subscribe first, then read the
    /// backlog, then go live.
    pub async fn attach(&mut self, id: Uuid) -> Result<AttachedTerminal> {
        self.ensure_ready()?;
        let pty = self
            .store
            .get(id)
            .ok_or(SessionError::NotFound(id))?
            .pty_id
            .clone()
            .ok_or(SessionError::NotLaunched(id))?;

        let output = match self.daemon.subscribe(&pty).await {
            Ok(rx) => rx,
            Err(DaemonError::NotFound(gone)) => {
                warn!(%id, pty = %gone, "pty vanished before attach; dropping reference");
                if let Some(next) = store::detach_pty(self.store.instances(), id) {
                    self.store.apply(next)?;
                    self.persist();
                }
                return Err(SessionError::NotLaunched(id));
            }
            Err(e) => return Err(e.into()),
        };
        let backlog = self.daemon.read_buffer(&pty, BufferReadMode::Sanitized).await?;

        let next = store::set_view_mode(self.store.instances(), id, ViewMode::Live)
            .ok_or(SessionError::NotFound(id))?;
        self.store.apply(next)?;
        debug!(%id, %pty, offset = backlog.end_offset, "terminal attached");

        Ok(AttachedTerminal {
            pty_id: pty,
            backlog: backlog.data,
            truncated: backlog.truncated,
            end_offset: backlog.end_offset,
            output,
        })
    }

    pub async fn write(&self, id: Uuid, text: &str) -> Result<bool> {
        let pty = self.live_pty(id)?;
        Ok(self.daemon.write(&pty, text).await?)
    }

    pub async fn resize(&self, id: Uuid, cols: u16, rows: u16) -> Result<()> {
        let pty = self.live_pty(id)?;
        Ok(self.daemon.resize(&pty, cols, rows).await?)
    }

    // -- destruction --------------------------------------------------------

    /// Close an instance. Rejected without any change when it resolves to
    /// leader.
    pub async fn close(&mut self, id: Uuid) -> Result<()> {
        self.ensure_ready()?;
        let index = self.index(id)?;
        let instances = self.store.instances();
        LeaderInvariantGuard::check(GuardedAction::Close, instances, self.agents.agents(), index)?;

        let closing = instances[index].clone();
        let next_selected = if self.store.selected() == Some(id) {
            store::next_selection(instances, index)
        } else {
            None
        };
        let registered = link::resolve_linked(&closing, index, self.agents.agents())
            .filter(|r| r.source == LinkSource::Direct)
            .map(|r| r.agent.id().to_string());

        if let Some(pty) = &closing.pty_id {
            self.kill_quietly(pty).await;
        }
        if let Some(agent) = registered {
            self.agents.deregister(&agent);
        }

        let next = store::remove(self.store.instances(), id);
        self.store.apply(next)?;
        if let Some(sel) = next_selected {
            self.store.select(sel);
        }
        if let Some(writer) = &self.writer {
            if let Err(e) = writer.remove(id).await {
                warn!(%id, error = %e, "failed to delete persisted terminal record");
            }
        }
        self.persist();
        info!(%id, title = %closing.title, "terminal closed");
        Ok(())
    }

    /// Kill the instance's process but keep the instance, pending.
    pub async fn kill(&mut self, id: Uuid) -> Result<()> {
        self.ensure_ready()?;
        let index = self.index(id)?;
        LeaderInvariantGuard::check(
            GuardedAction::Kill,
            self.store.instances(),
            self.agents.agents(),
            index,
        )?;
        let Some(pty) = self.store.instances()[index].pty_id.clone() else {
            return Ok(());
        };
        self.kill_quietly(&pty).await;
        if let Some(next) = store::detach_pty(self.store.instances(), id) {
            self.store.apply(next)?;
        }
        self.persist();
        Ok(())
    }

    /// Kill the current process (if any) and start a new generation. Returns
    /// the new restart count.
    pub async fn restart(&mut self, id: Uuid) -> Result<u32> {
        self.ensure_ready()?;
        let pty = self
            .store
            .get(id)
            .ok_or(SessionError::NotFound(id))?
            .pty_id
            .clone();
        if let Some(pty) = &pty {
            self.kill_quietly(pty).await;
        }
        let next = store::restart(self.store.instances(), id).ok_or(SessionError::NotFound(id))?;
        self.store.apply(next)?;
        self.persist();
        let count = self.store.get(id).map(|t| t.restart_count).unwrap_or_default();
        info!(%id, restart_count = count, "terminal restarted");
        Ok(count)
    }

    /// Close every instance except `keep` and the leader. Returns the ids
    /// that were closed.
    pub async fn close_others(&mut self, keep: Uuid) -> Result<Vec<Uuid>> {
        self.ensure_ready()?;
        self.index(keep)?;
        let instances = self.store.instances();
        let agents = self.agents.agents();
        let targets: Vec<Uuid> = instances
            .iter()
            .enumerate()
            .filter(|(_, t)| t.id != keep)
            .filter(|(i, _)| {
                LeaderInvariantGuard::check(GuardedAction::CloseOthers, instances, agents, *i)
                    .is_ok()
            })
            .map(|(_, t)| t.id)
            .collect();

        let mut closed = Vec::with_capacity(targets.len());
        for id in targets {
            match self.close(id).await {
                Ok(()) => closed.push(id),
                Err(SessionError::Guard(violation)) => {
                    debug!(%violation, "close-others skipped protected terminal");
                }
                Err(e) => return Err(e),
            }
        }
        self.store.select(keep);
        Ok(closed)
    }

    /// Kill everything, drop every instance and every persisted record.
    pub async fn reset(&mut self) -> Result<()> {
        self.ensure_ready()?;
        let ptys: Vec<PtyId> = self
            .store
            .instances()
            .iter()
            .filter_map(|t| t.pty_id.clone())
            .collect();
        for pty in &ptys {
            self.kill_quietly(pty).await;
        }
        self.agents.clear();
        self.store.apply(Vec::new())?;
        self.store.mark_persisted();
        if let Some(writer) = &self.writer {
            writer.clear().await?;
        }
        info!(killed = ptys.len(), "session reset");
        Ok(())
    }

    // -- presentation -------------------------------------------------------

    pub fn select(&mut self, id: Uuid) -> Result<()> {
        self.ensure_ready()?;
        if self.store.select(id) {
            Ok(())
        } else {
            Err(SessionError::NotFound(id))
        }
    }

    pub fn rename(&mut self, id: Uuid, title: &str) -> Result<()> {
        self.ensure_ready()?;
        let next =
            store::rename(self.store.instances(), id, title).ok_or(SessionError::NotFound(id))?;
        self.store.apply(next)?;
        self.persist();
        Ok(())
    }

    pub fn reorder(&mut self, from: usize, to: usize) -> Result<()> {
        self.ensure_ready()?;
        let next = store::reorder(self.store.instances(), from, to);
        self.store.apply(next)?;
        self.persist();
        Ok(())
    }

    // -- internals ----------------------------------------------------------

    fn ensure_ready(&self) -> Result<()> {
        if self.store.is_ready() {
            Ok(())
        } else {
            Err(SessionError::NotRestored)
        }
    }

    fn index(&self, id: Uuid) -> Result<usize> {
        self.store.index_of(id).ok_or(SessionError::NotFound(id))
    }

    fn live_pty(&self, id: Uuid) -> Result<PtyId> {
        let instance = self.store.get(id).ok_or(SessionError::NotFound(id))?;
        match (&instance.pty_id, instance.is_live()) {
            (Some(pty), true) => Ok(pty.clone()),
            _ => Err(SessionError::NotLaunched(id)),
        }
    }

    /// Kill ignoring failures: the process may already have exited.
    async fn kill_quietly(&self, pty: &PtyId) {
        if let Err(e) = self.daemon.kill(pty).await {
            debug!(%pty, error = %e, "kill failed; treating pty as gone");
        }
    }

    /// Hand the current state to the writer if anything durable changed.
    fn persist(&mut self) {
        let Some(writer) = &self.writer else {
            return;
        };
        if let Some(batch) = self.store.take_persist_batch(Utc::now()) {
            writer.schedule(batch);
        }
    }
}
