use std::fmt;

use hd_core::types::{Agent, AgentRole, TerminalInstance};
use thiserror::Error;
use uuid::Uuid;

use crate::link;

/// Mutations that would take a terminal away from its agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardedAction {
    Close,
    Kill,
    CloseOthers,
}

impl fmt::Display for GuardedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GuardedAction::Close => "close",
            GuardedAction::Kill => "kill",
            GuardedAction::CloseOthers => "close-others",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("refusing to {action} leader terminal {id}")]
pub struct GuardViolation {
    pub action: GuardedAction,
    pub id: Uuid,
}

/// Enforces that the leader terminal is never removed or killed from the UI.
///
/// Exactly one instance (if any) resolves to leader, picked in this order:
/// 1. the first instance that declares itself leader;
/// 2. the first instance whose link names the leader or resolves to the
///    leader agent;
/// 3. the first instance, unless it declares itself a worker.
///
/// Rule 3 makes the guard fail closed: an unlinked startup instance is
/// protected until something proves it is not the leader.
pub struct LeaderInvariantGuard;

impl LeaderInvariantGuard {
    pub fn leader_index(instances: &[TerminalInstance], agents: &[Agent]) -> Option<usize> {
        if let Some(i) = instances
            .iter()
            .position(|t| t.declared_role() == Some(AgentRole::Leader))
        {
            return Some(i);
        }
        if let Some(i) = instances.iter().enumerate().position(|(i, t)| {
            link::links_to_leader(t) || link::linked_role(t, i, agents) == Some(AgentRole::Leader)
        }) {
            return Some(i);
        }
        match instances.first() {
            Some(first) if first.declared_role() != Some(AgentRole::Worker) => Some(0),
            _ => None,
        }
    }

    pub fn resolved_role(
        instances: &[TerminalInstance],
        agents: &[Agent],
        index: usize,
    ) -> Option<AgentRole> {
        if index >= instances.len() {
            return None;
        }
        if Self::leader_index(instances, agents) == Some(index) {
            Some(AgentRole::Leader)
        } else {
            Some(AgentRole::Worker)
        }
    }

    /// Reject `action` on the instance at `index` when it resolves to leader.
    pub fn check(
        action: GuardedAction,
        instances: &[TerminalInstance],
        agents: &[Agent],
        index: usize,
    ) -> Result<(), GuardViolation> {
        let Some(target) = instances.get(index) else {
            return Ok(());
        };
        if Self::leader_index(instances, agents) == Some(index) {
            tracing::warn!(%action, id = %target.id, "leader guard rejected action");
            return Err(GuardViolation {
                action,
                id: target.id,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hd_core::types::AgentConfig;

    fn worker(id: &str) -> TerminalInstance {
        TerminalInstance::for_agent(AgentConfig::new(id, id, AgentRole::Worker))
    }

    #[test]
    fn unlinked_sole_instance_is_protected() {
        let only = vec![TerminalInstance::shell("startup")];
        assert_eq!(LeaderInvariantGuard::leader_index(&only, &[]), Some(0));
        assert!(LeaderInvariantGuard::check(GuardedAction::Close, &only, &[], 0).is_err());
    }

    #[test]
    fn declared_leader_wins_over_position() {
        let lead = TerminalInstance::for_agent(AgentConfig::new("l", "L", AgentRole::Leader));
        let list = vec![TerminalInstance::shell("scratch"), lead];
        assert_eq!(LeaderInvariantGuard::leader_index(&list, &[]), Some(1));
        assert!(LeaderInvariantGuard::check(GuardedAction::Close, &list, &[], 0).is_ok());
        assert!(LeaderInvariantGuard::check(GuardedAction::Kill, &list, &[], 1).is_err());
    }

    #[test]
    fn all_workers_means_no_leader() {
        let list = vec![worker("a"), worker("b")];
        assert_eq!(LeaderInvariantGuard::leader_index(&list, &[]), None);
        assert!(LeaderInvariantGuard::check(GuardedAction::Close, &list, &[], 0).is_ok());
    }

    #[test]
    fn leader_pattern_link_is_protected_without_agents() {
        let mut linked = TerminalInstance::shell("lead?");
        linked.linked_agent_id = Some("leader".into());
        let list = vec![worker("a"), linked];
        assert_eq!(LeaderInvariantGuard::leader_index(&list, &[]), Some(1));
    }

    #[test]
    fn resolved_role_out_of_range_is_none() {
        assert_eq!(LeaderInvariantGuard::resolved_role(&[], &[], 0), None);
    }
}
