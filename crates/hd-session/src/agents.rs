use std::time::Duration;

use chrono::{DateTime, Utc};
use hd_core::types::Agent;
use tracing::{debug, info};

/// Local view of the agent registry.
///
/// Fed by register/deregister/heartbeat events from the registry; the
/// session engine only reads id, role and liveness back out. Registration
/// order is kept because positional link fallback depends on it.
///
/// At most one agent is leader: registering a leader replaces the previous
/// one outright.
#[derive(Debug)]
pub struct AgentDirectory {
    agents: Vec<Agent>,
    staleness_threshold: Duration,
}

impl AgentDirectory {
    pub fn new(staleness_threshold: Duration) -> Self {
        Self {
            agents: Vec::new(),
            staleness_threshold,
        }
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn get(&self, id: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id() == id)
    }

    pub fn leader(&self) -> Option<&Agent> {
        self.agents.iter().find(|a| a.role().is_leader())
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Add or update an agent. A leader evicts any other leader.
    pub fn register(&mut self, agent: Agent) {
        if agent.role().is_leader() {
            let before = self.agents.len();
            self.agents
                .retain(|a| !a.role().is_leader() || a.id() == agent.id());
            if self.agents.len() != before {
                info!(new_leader = agent.id(), "previous leader replaced");
            }
        }
        match self.agents.iter_mut().find(|a| a.id() == agent.id()) {
            Some(existing) => *existing = agent,
            None => {
                debug!(agent = agent.id(), role = %agent.role(), "agent registered");
                self.agents.push(agent);
            }
        }
    }

    pub fn deregister(&mut self, id: &str) -> Option<Agent> {
        let pos = self.agents.iter().position(|a| a.id() == id)?;
        debug!(agent = id, "agent deregistered");
        Some(self.agents.remove(pos))
    }

    /// Record a heartbeat. Returns `false` for unknown agents.
    pub fn heartbeat(&mut self, id: &str, runtime_id: Option<String>, at: DateTime<Utc>) -> bool {
        let Some(agent) = self.agents.iter_mut().find(|a| a.id() == id) else {
            return false;
        };
        agent.alive = true;
        agent.last_seen = at;
        if runtime_id.is_some() {
            agent.runtime_id = runtime_id;
        }
        true
    }

    /// Mark agents silent for longer than the threshold as dead. Returns the
    /// ids that changed state.
    pub fn refresh_liveness(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let mut went_stale = Vec::new();
        for agent in &mut self.agents {
            let elapsed = now
                .signed_duration_since(agent.last_seen)
                .to_std()
                .unwrap_or(Duration::ZERO);
            if agent.alive && elapsed > self.staleness_threshold {
                agent.alive = false;
                went_stale.push(agent.id().to_string());
            }
        }
        went_stale
    }

    pub fn clear(&mut self) {
        self.agents.clear();
    }
}

impl Default for AgentDirectory {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}
