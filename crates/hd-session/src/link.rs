//! Maps terminal instances onto logical agents.
//!
//! Agents register asynchronously, often after their terminal already
//! exists, so resolution falls back in layers instead of reporting an
//! instance as unlinked while it waits:
//!
//! 1. direct match of `linked_agent_id` against an agent's runtime identity
//!    (or its logical id);
//! 2. pattern links such as `leader` or `worker-2`;
//! 3. position in the instance list, as a last resort.

use hd_core::types::{Agent, AgentRole, TerminalInstance};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSource {
    Direct,
    Pattern,
    Positional,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedLink<'a> {
    pub agent: &'a Agent,
    pub source: LinkSource,
}

/// Symbolic link targets that stand in for a not-yet-known agent id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPattern {
    Leader,
    /// `worker-N` (1-based among non-leader agents), or bare `worker`.
    Worker(Option<usize>),
}

impl LinkPattern {
    pub fn parse(link: &str) -> Option<Self> {
        let link = link.trim().to_ascii_lowercase();
        if link == "leader" || link.starts_with("leader-") || link.starts_with("leader:") {
            return Some(LinkPattern::Leader);
        }
        if link == "worker" {
            return Some(LinkPattern::Worker(None));
        }
        let rest = link
            .strip_prefix("worker-")
            .or_else(|| link.strip_prefix("worker:"))?;
        match rest.parse::<usize>() {
            Ok(n) if n >= 1 => Some(LinkPattern::Worker(Some(n))),
            _ => Some(LinkPattern::Worker(None)),
        }
    }
}

fn non_leaders(agents: &[Agent]) -> impl Iterator<Item = &Agent> {
    agents.iter().filter(|a| !a.role().is_leader())
}

fn leader(agents: &[Agent]) -> Option<&Agent> {
    agents.iter().find(|a| a.role().is_leader())
}

/// Offset among non-leader agents for a worker at `index` in the instance
/// list, where index 0 is the leader's slot.
fn positional_worker(agents: &[Agent], index: usize) -> Option<&Agent> {
    non_leaders(agents).nth(index.checked_sub(1)?)
}

/// Resolve through direct and pattern links only.
pub fn resolve_linked<'a>(
    instance: &TerminalInstance,
    index: usize,
    agents: &'a [Agent],
) -> Option<ResolvedLink<'a>> {
    let link = instance.linked_agent_id.as_deref()?;

    let direct = agents
        .iter()
        .find(|a| a.runtime_id.as_deref() == Some(link))
        .or_else(|| agents.iter().find(|a| a.matches_link(link)));
    if let Some(agent) = direct {
        return Some(ResolvedLink {
            agent,
            source: LinkSource::Direct,
        });
    }

    let agent = match LinkPattern::parse(link)? {
        LinkPattern::Leader => leader(agents),
        LinkPattern::Worker(Some(n)) => non_leaders(agents).nth(n - 1),
        LinkPattern::Worker(None) => positional_worker(agents, index),
    }?;
    Some(ResolvedLink {
        agent,
        source: LinkSource::Pattern,
    })
}

/// Resolve `instance` (at `index` in the instance list) to an agent.
pub fn resolve<'a>(
    instance: &TerminalInstance,
    index: usize,
    agents: &'a [Agent],
) -> Option<ResolvedLink<'a>> {
    if let Some(found) = resolve_linked(instance, index, agents) {
        return Some(found);
    }

    let agent = if index == 0 {
        leader(agents)
    } else {
        positional_worker(agents, index)
    }?;

    // A guess must not contradict what the instance says about itself.
    if let Some(declared) = instance.declared_role() {
        if declared != agent.role() {
            return None;
        }
    }
    Some(ResolvedLink {
        agent,
        source: LinkSource::Positional,
    })
}

/// Convenience wrapper returning just the agent.
pub fn resolve_agent<'a>(
    instance: &TerminalInstance,
    index: usize,
    agents: &'a [Agent],
) -> Option<&'a Agent> {
    resolve(instance, index, agents).map(|r| r.agent)
}

/// `true` when the instance's link text itself names the leader.
pub fn links_to_leader(instance: &TerminalInstance) -> bool {
    instance
        .linked_agent_id
        .as_deref()
        .and_then(LinkPattern::parse)
        == Some(LinkPattern::Leader)
}

/// Role of the agent an instance links to through a direct or pattern link.
pub fn linked_role(instance: &TerminalInstance, index: usize, agents: &[Agent]) -> Option<AgentRole> {
    resolve_linked(instance, index, agents).map(|r| r.agent.role())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentDirectory;
    use chrono::Utc;
    use hd_core::types::AgentConfig;

    fn agent(id: &str, role: AgentRole) -> Agent {
        Agent::new(AgentConfig::new(id, id, role))
    }

    fn linked(link: &str) -> TerminalInstance {
        let mut shell = TerminalInstance::shell(link);
        shell.linked_agent_id = Some(link.to_string());
        shell
    }

    fn resolved_id<'a>(found: Option<ResolvedLink<'a>>) -> Option<(&'a str, LinkSource)> {
        found.map(|r| (r.agent.id(), r.source))
    }

    #[test]
    fn runtime_identity_wins_over_logical_id() {
        let mut running = agent("alpha", AgentRole::Worker);
        running.runtime_id = Some("rt-9".into());
        let agents = vec![agent("rt-9", AgentRole::Worker), running];

        assert_eq!(
            resolved_id(resolve(&linked("rt-9"), 1, &agents)),
            Some(("alpha", LinkSource::Direct))
        );
        assert_eq!(
            resolved_id(resolve(&linked("alpha"), 1, &agents)),
            Some(("alpha", LinkSource::Direct))
        );
    }

    #[test]
    fn direct_match_wins_over_pattern() {
        let agents = vec![
            agent("lead", AgentRole::Leader),
            agent("w-a", AgentRole::Worker),
            agent("w-b", AgentRole::Worker),
            agent("worker-2", AgentRole::Worker),
        ];
        assert_eq!(
            resolved_id(resolve(&linked("worker-2"), 1, &agents)),
            Some(("worker-2", LinkSource::Direct))
        );
    }

    #[test]
    fn numbered_worker_pattern_counts_non_leaders() {
        let agents = vec![
            agent("w-a", AgentRole::Worker),
            agent("lead", AgentRole::Leader),
            agent("w-b", AgentRole::Worker),
            agent("w-c", AgentRole::Worker),
        ];
        assert_eq!(
            resolved_id(resolve_linked(&linked("worker-1"), 5, &agents)),
            Some(("w-a", LinkSource::Pattern))
        );
        assert_eq!(
            resolved_id(resolve_linked(&linked("worker-2"), 5, &agents)),
            Some(("w-b", LinkSource::Pattern))
        );
        assert_eq!(
            resolved_id(resolve_linked(&linked("leader"), 5, &agents)),
            Some(("lead", LinkSource::Pattern))
        );
        assert!(resolve_linked(&linked("worker-9"), 5, &agents).is_none());
    }

    #[test]
    fn bare_worker_pattern_uses_instance_index() {
        let agents = vec![
            agent("lead", AgentRole::Leader),
            agent("w-a", AgentRole::Worker),
            agent("w-b", AgentRole::Worker),
        ];
        let bare = linked("worker");
        assert_eq!(
            resolved_id(resolve_linked(&bare, 1, &agents)),
            Some(("w-a", LinkSource::Pattern))
        );
        assert_eq!(
            resolved_id(resolve_linked(&bare, 2, &agents)),
            Some(("w-b", LinkSource::Pattern))
        );
        assert!(resolve_linked(&bare, 3, &agents).is_none());
    }

    #[test]
    fn positional_fallback_follows_registration_order() {
        let agents = vec![
            agent("w-a", AgentRole::Worker),
            agent("lead", AgentRole::Leader),
            agent("w-b", AgentRole::Worker),
        ];
        let shell = TerminalInstance::shell("scratch");
        assert_eq!(
            resolved_id(resolve(&shell, 0, &agents)),
            Some(("lead", LinkSource::Positional))
        );
        assert_eq!(
            resolved_id(resolve(&shell, 1, &agents)),
            Some(("w-a", LinkSource::Positional))
        );
        assert_eq!(
            resolved_id(resolve(&shell, 2, &agents)),
            Some(("w-b", LinkSource::Positional))
        );
        assert!(resolve(&shell, 3, &agents).is_none());
    }

    #[test]
    fn positional_guess_never_contradicts_declared_role() {
        let agents = vec![agent("lead", AgentRole::Leader), agent("w-a", AgentRole::Worker)];

        let worker = TerminalInstance::for_agent(AgentConfig::new("w-z", "w-z", AgentRole::Worker));
        assert!(resolve(&worker, 0, &agents).is_none());

        let mut leader = TerminalInstance::shell("lead-shell");
        leader.role_override = Some(AgentRole::Leader);
        assert!(resolve(&leader, 1, &agents).is_none());
    }

    #[test]
    fn late_registration_upgrades_the_link() {
        let mut directory = AgentDirectory::default();
        directory.register(agent("lead", AgentRole::Leader));
        let shell = linked("rt-77");

        assert!(resolve(&shell, 1, directory.agents()).is_none());

        directory.register(agent("w1", AgentRole::Worker));
        assert_eq!(
            resolved_id(resolve(&shell, 1, directory.agents())),
            Some(("w1", LinkSource::Positional))
        );

        assert!(directory.heartbeat("w1", Some("rt-77".into()), Utc::now()));
        assert_eq!(
            resolved_id(resolve(&shell, 1, directory.agents())),
            Some(("w1", LinkSource::Direct))
        );
    }

    #[test]
    fn parses_link_patterns() {
        assert_eq!(LinkPattern::parse("leader"), Some(LinkPattern::Leader));
        assert_eq!(LinkPattern::parse("Leader-main"), Some(LinkPattern::Leader));
        assert_eq!(LinkPattern::parse("worker"), Some(LinkPattern::Worker(None)));
        assert_eq!(LinkPattern::parse("worker-3"), Some(LinkPattern::Worker(Some(3))));
        assert_eq!(LinkPattern::parse("worker:x"), Some(LinkPattern::Worker(None)));
        assert_eq!(LinkPattern::parse("worker-0"), Some(LinkPattern::Worker(None)));
        assert_eq!(LinkPattern::parse("agent-7f"), None);
    }
}
