//! The authoritative ordered collection of terminal instances.
//!
//! The free functions are pure: each takes the current collection and
//! returns a new one, leaving the input untouched. [`SessionStateStore`]
//! holds the current collection plus selection and lifecycle phase, and
//! decides when a change needs persisting.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use hd_core::types::{AgentConfig, PersistedSessionRecord, PtyId, TerminalInstance, ViewMode};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, SessionError};

// ---------------------------------------------------------------------------
// Pure operations
// ---------------------------------------------------------------------------

/// Rebuild instances from persisted records, dropping references to PTYs
/// that are no longer alive. Every result is pending, alive or not.
pub fn restore(
    records: Vec<PersistedSessionRecord>,
    alive: &HashSet<PtyId>,
) -> Vec<TerminalInstance> {
    records
        .into_iter()
        .map(|record| {
            let mut instance = record.into_instance();
            let still_alive = instance
                .pty_id
                .as_ref()
                .is_some_and(|pty| alive.contains(pty));
            if !still_alive {
                instance.pty_id = None;
                instance.session_id = None;
            }
            instance
        })
        .collect()
}

/// A collection holding only a fresh leader instance for `config`.
pub fn create_leader(config: AgentConfig) -> Vec<TerminalInstance> {
    vec![TerminalInstance::for_agent(config)]
}

pub fn append(instances: &[TerminalInstance], instance: TerminalInstance) -> Vec<TerminalInstance> {
    let mut next = instances.to_vec();
    next.push(instance);
    next
}

pub fn remove(instances: &[TerminalInstance], id: Uuid) -> Vec<TerminalInstance> {
    instances.iter().filter(|t| t.id != id).cloned().collect()
}

fn update(
    instances: &[TerminalInstance],
    id: Uuid,
    f: impl FnOnce(&mut TerminalInstance),
) -> Option<Vec<TerminalInstance>> {
    let index = instances.iter().position(|t| t.id == id)?;
    let mut next = instances.to_vec();
    f(&mut next[index]);
    Some(next)
}

/// Bind a confirmed PTY to the instance. `None` when the instance is gone or
/// has been restarted since `generation` was taken.
pub fn mark_ready(
    instances: &[TerminalInstance],
    id: Uuid,
    generation: u32,
    pty_id: PtyId,
    session_id: Option<String>,
) -> Option<Vec<TerminalInstance>> {
    let current = instances.iter().find(|t| t.id == id)?;
    if current.restart_count != generation {
        return None;
    }
    update(instances, id, |t| {
        t.pty_id = Some(pty_id);
        t.session_id = session_id;
        t.view_mode = ViewMode::Pending;
    })
}

/// Start a new generation: the PTY reference is dropped and the counter bumped.
pub fn restart(instances: &[TerminalInstance], id: Uuid) -> Option<Vec<TerminalInstance>> {
    update(instances, id, |t| {
        t.pty_id = None;
        t.session_id = None;
        t.view_mode = ViewMode::Pending;
        t.restart_count += 1;
    })
}

/// Forget the instance's PTY without starting a new generation.
pub fn detach_pty(instances: &[TerminalInstance], id: Uuid) -> Option<Vec<TerminalInstance>> {
    update(instances, id, |t| {
        t.pty_id = None;
        t.session_id = None;
        t.view_mode = ViewMode::Pending;
    })
}

pub fn set_view_mode(
    instances: &[TerminalInstance],
    id: Uuid,
    mode: ViewMode,
) -> Option<Vec<TerminalInstance>> {
    update(instances, id, |t| t.view_mode = mode)
}

pub fn rename(
    instances: &[TerminalInstance],
    id: Uuid,
    title: &str,
) -> Option<Vec<TerminalInstance>> {
    update(instances, id, |t| t.title = title.to_string())
}

/// Move the instance at `from` to position `to`. Out-of-range indices leave
/// the order unchanged; links are identity-based and move with the instance.
pub fn reorder(instances: &[TerminalInstance], from: usize, to: usize) -> Vec<TerminalInstance> {
    let mut next = instances.to_vec();
    if from < next.len() && to < next.len() && from != to {
        let moved = next.remove(from);
        next.insert(to, moved);
    }
    next
}

/// Selection to fall back to after the instance at `removed_index` is
/// removed from `instances`: the next instance, or the previous one when the
/// last was removed.
pub fn next_selection(instances: &[TerminalInstance], removed_index: usize) -> Option<Uuid> {
    let remaining: Vec<&TerminalInstance> = instances
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != removed_index)
        .map(|(_, t)| t)
        .collect();
    remaining
        .get(removed_index)
        .or_else(|| remaining.last())
        .map(|t| t.id)
}

/// `true` when both collections would persist identically. View mode and
/// write timestamps are not part of the persisted state.
pub fn same_durable_state(a: &[TerminalInstance], b: &[TerminalInstance]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| x.to_record(x.created_at) == y.to_record(y.created_at))
}

// ---------------------------------------------------------------------------
// SessionStateStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorePhase {
    /// Nothing restored yet; mutations and saves are refused.
    Uninitialized,
    Ready,
    TornDown,
}

#[derive(Debug)]
pub struct SessionStateStore {
    phase: StorePhase,
    instances: Vec<TerminalInstance>,
    selected: Option<Uuid>,
    /// Collection as of the last persist batch handed out.
    persisted: Vec<TerminalInstance>,
}

impl SessionStateStore {
    pub fn new() -> Self {
        Self {
            phase: StorePhase::Uninitialized,
            instances: Vec::new(),
            selected: None,
            persisted: Vec::new(),
        }
    }

    pub fn phase(&self) -> StorePhase {
        self.phase
    }

    pub fn is_ready(&self) -> bool {
        self.phase == StorePhase::Ready
    }

    pub fn instances(&self) -> &[TerminalInstance] {
        &self.instances
    }

    pub fn get(&self, id: Uuid) -> Option<&TerminalInstance> {
        self.instances.iter().find(|t| t.id == id)
    }

    pub fn index_of(&self, id: Uuid) -> Option<usize> {
        self.instances.iter().position(|t| t.id == id)
    }

    pub fn selected(&self) -> Option<Uuid> {
        self.selected
    }

    /// Select `id`. Returns `false` when no such instance exists.
    pub fn select(&mut self, id: Uuid) -> bool {
        if self.get(id).is_some() {
            self.selected = Some(id);
            true
        } else {
            false
        }
    }

    /// Reconcile persisted records and move to [`StorePhase::Ready`].
    pub fn restore(&mut self, records: Vec<PersistedSessionRecord>, alive: &HashSet<PtyId>) {
        self.persisted = records.iter().cloned().map(|r| r.into_instance()).collect();
        self.instances = restore(records, alive);
        self.selected = self.instances.first().map(|t| t.id);
        self.phase = StorePhase::Ready;
        debug!(count = self.instances.len(), "session state restored");
    }

    /// Replace the collection. The selection is dropped if its instance is
    /// no longer present.
    pub fn apply(&mut self, next: Vec<TerminalInstance>) -> Result<()> {
        if self.phase != StorePhase::Ready {
            return Err(SessionError::NotRestored);
        }
        if let Some(selected) = self.selected {
            if !next.iter().any(|t| t.id == selected) {
                self.selected = None;
            }
        }
        self.instances = next;
        Ok(())
    }

    /// Records to persist, or `None` when nothing durable changed since the
    /// previous batch or the store is not ready.
    pub fn take_persist_batch(&mut self, now: DateTime<Utc>) -> Option<Vec<PersistedSessionRecord>> {
        if self.phase != StorePhase::Ready || same_durable_state(&self.persisted, &self.instances) {
            return None;
        }
        self.persisted = self.instances.clone();
        Some(self.instances.iter().map(|t| t.to_record(now)).collect())
    }

    /// Treat the current collection as already persisted, e.g. after a clear.
    pub fn mark_persisted(&mut self) {
        self.persisted = self.instances.clone();
    }

    pub fn teardown(&mut self) {
        self.phase = StorePhase::TornDown;
        self.selected = None;
    }
}

impl Default for SessionStateStore {
    fn default() -> Self {
        Self::new()
    }
}
