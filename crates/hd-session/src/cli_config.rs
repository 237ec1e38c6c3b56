use hd_core::types::{AgentRole, Provider, TerminalInstance};

/// Bootstrap file every standard leader starts from.
pub const LEADER_BOOTSTRAP: &str = ".hivedeck/bootstrap/leader.md";
/// Bootstrap file every standard worker starts from.
pub const WORKER_BOOTSTRAP: &str = ".hivedeck/bootstrap/worker.md";
/// Files an autonomous ("ralph") leader loads, in this order.
pub const RALPH_BOOTSTRAP: [&str; 3] = [
    ".hivedeck/ralph/PROMPT.md",
    ".hivedeck/ralph/fix_plan.md",
    ".hivedeck/ralph/AGENT.md",
];

pub const ENV_AGENT_ID: &str = "HD_AGENT_ID";
pub const ENV_AGENT_NAME: &str = "HD_AGENT_NAME";
pub const ENV_AGENT_ROLE: &str = "HD_AGENT_ROLE";
pub const ENV_TERMINAL_ID: &str = "HD_TERMINAL_ID";

/// The agent an instance resolved to at launch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchIdentity<'a> {
    pub agent_id: &'a str,
    pub role: AgentRole,
}

/// What the daemon should run for an instance.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LaunchSpec {
    /// `None` means the plain login shell.
    pub command: Option<String>,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<String>,
}

impl LaunchSpec {
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

// ---------------------------------------------------------------------------
// ProviderProfile trait
// ---------------------------------------------------------------------------

/// Per-CLI knowledge needed to turn an agent config into a command line.
pub trait ProviderProfile: Send + Sync {
    fn binary_name(&self) -> &'static str;

    /// Flags that disable interactive permission prompts.
    fn skip_permission_args(&self) -> Vec<String>;

    fn model_args(&self, model: &str) -> Vec<String> {
        vec!["--model".into(), model.into()]
    }

    /// Env var the CLI reads a custom API endpoint from.
    fn endpoint_env(&self) -> Option<&'static str>;
}

pub struct ClaudeProfile;

impl ProviderProfile for ClaudeProfile {
    fn binary_name(&self) -> &'static str {
        "claude"
    }

    fn skip_permission_args(&self) -> Vec<String> {
        vec!["--dangerously-skip-permissions".into()]
    }

    fn endpoint_env(&self) -> Option<&'static str> {
        Some("ANTHROPIC_BASE_URL")
    }
}

pub struct CodexProfile;

impl ProviderProfile for CodexProfile {
    fn binary_name(&self) -> &'static str {
        "codex"
    }

    fn skip_permission_args(&self) -> Vec<String> {
        vec!["--approval-mode".into(), "full-auto".into()]
    }

    fn endpoint_env(&self) -> Option<&'static str> {
        Some("OPENAI_BASE_URL")
    }
}

pub struct GeminiProfile;

impl ProviderProfile for GeminiProfile {
    fn binary_name(&self) -> &'static str {
        "gemini"
    }

    fn skip_permission_args(&self) -> Vec<String> {
        vec!["--yolo".into()]
    }

    fn endpoint_env(&self) -> Option<&'static str> {
        Some("GOOGLE_GEMINI_BASE_URL")
    }
}

pub struct OpenCodeProfile;

impl ProviderProfile for OpenCodeProfile {
    fn binary_name(&self) -> &'static str {
        "opencode"
    }

    fn skip_permission_args(&self) -> Vec<String> {
        vec![]
    }

    fn model_args(&self, model: &str) -> Vec<String> {
        vec!["-m".into(), model.into()]
    }

    fn endpoint_env(&self) -> Option<&'static str> {
        None
    }
}

/// Profile for a provider, `None` for a plain shell.
pub fn profile_for(provider: Provider) -> Option<Box<dyn ProviderProfile>> {
    match provider {
        Provider::Claude => Some(Box::new(ClaudeProfile)),
        Provider::Codex => Some(Box::new(CodexProfile)),
        Provider::Gemini => Some(Box::new(GeminiProfile)),
        Provider::OpenCode => Some(Box::new(OpenCodeProfile)),
        Provider::Shell => None,
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Normalise a user attachment to carry exactly one leading `@`.
pub fn normalize_attachment(raw: &str) -> Option<String> {
    let path = raw.trim().trim_start_matches('@').trim_start();
    if path.is_empty() {
        None
    } else {
        Some(format!("@{path}"))
    }
}

/// Files the agent boots from, before user attachments.
fn bootstrap_files(instance: &TerminalInstance) -> Vec<String> {
    let Some(config) = &instance.agent_config else {
        return Vec::new();
    };
    let role = instance.declared_role().unwrap_or(config.role);
    if config.kind.uses_persona() {
        return config.persona_files.clone();
    }
    match role {
        AgentRole::Leader if config.modes.autonomous => {
            RALPH_BOOTSTRAP.iter().map(|f| f.to_string()).collect()
        }
        AgentRole::Leader => vec![LEADER_BOOTSTRAP.to_string()],
        AgentRole::Worker => vec![WORKER_BOOTSTRAP.to_string()],
    }
}

/// Build the launch spec for `instance`.
///
/// Pure: reads only the instance's own config snapshot, never any lookup
/// table. `identity` is the agent the instance resolved to; its id and role
/// win over the snapshot's when present, so `HD_AGENT_ID` and
/// `HD_AGENT_ROLE` always describe the same agent.
///
/// Identity env vars are set even when no command resolves, since tooling
/// inside plain shells relies on them too. Returns `None` only when there is
/// no identity at all.
pub fn build(
    identity: Option<LaunchIdentity<'_>>,
    instance: &TerminalInstance,
) -> Option<LaunchSpec> {
    let config = instance.agent_config.as_ref();
    let id = identity
        .map(|i| i.agent_id.to_string())
        .or_else(|| config.map(|c| c.agent_id.clone()))?;
    let name = config
        .map(|c| c.name.clone())
        .unwrap_or_else(|| instance.title.clone());
    let role = identity
        .map(|i| i.role)
        .or_else(|| instance.declared_role())
        .unwrap_or(AgentRole::Worker);

    let mut env = vec![
        (ENV_AGENT_ID.to_string(), id),
        (ENV_AGENT_NAME.to_string(), name),
        (ENV_AGENT_ROLE.to_string(), role.as_str().to_string()),
        (ENV_TERMINAL_ID.to_string(), instance.id.to_string()),
    ];

    let mut spec = LaunchSpec {
        cwd: instance.launch_dir().map(str::to_string),
        ..LaunchSpec::default()
    };

    if let Some(config) = config {
        if !config.capabilities.is_empty() {
            env.push(("HD_AGENT_CAPABILITIES".into(), config.capabilities.join(",")));
        }
        if let Some(var) = &config.credentials_env {
            env.push(("HD_CREDENTIALS_ENV".into(), var.clone()));
        }
    }

    let profile = config
        .filter(|_| instance.claude_mode)
        .and_then(|c| profile_for(c.provider).map(|p| (c, p)));

    if let Some((config, profile)) = profile {
        spec.command = Some(profile.binary_name().to_string());
        if config.modes.skip_permissions {
            spec.args.extend(profile.skip_permission_args());
        }
        if let Some(model) = &config.model {
            spec.args.extend(profile.model_args(model));
        }
        if let (Some(endpoint), Some(var)) = (&config.endpoint, profile.endpoint_env()) {
            env.push((var.to_string(), endpoint.clone()));
        }
        spec.args.extend(
            bootstrap_files(instance)
                .iter()
                .chain(config.attachments.iter())
                .filter_map(|f| normalize_attachment(f)),
        );
    }

    spec.env = env;
    Some(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link;
    use hd_core::types::{Agent, AgentConfig, AgentKind};

    fn config(id: &str, role: AgentRole) -> AgentConfig {
        AgentConfig::new(id, format!("Agent {id}"), role)
    }

    fn launch(config: AgentConfig) -> LaunchSpec {
        build(None, &TerminalInstance::for_agent(config)).expect("snapshot gives an identity")
    }

    fn files(spec: &LaunchSpec) -> Vec<&str> {
        spec.args
            .iter()
            .filter(|a| a.starts_with('@'))
            .map(String::as_str)
            .collect()
    }

    #[test]
    fn autonomous_leader_loads_ralph_set_in_order() {
        let mut cfg = config("lead", AgentRole::Leader);
        cfg.modes.autonomous = true;
        let spec = launch(cfg);
        assert_eq!(
            files(&spec),
            vec![
                "@.hivedeck/ralph/PROMPT.md",
                "@.hivedeck/ralph/fix_plan.md",
                "@.hivedeck/ralph/AGENT.md",
            ]
        );
        assert!(!spec.args.iter().any(|a| a.contains(LEADER_BOOTSTRAP)));
    }

    #[test]
    fn standard_roles_load_their_bootstrap() {
        let leader = launch(config("lead", AgentRole::Leader));
        assert_eq!(leader.command.as_deref(), Some("claude"));
        assert_eq!(files(&leader), vec!["@.hivedeck/bootstrap/leader.md"]);

        let worker = launch(config("w1", AgentRole::Worker));
        assert_eq!(files(&worker), vec!["@.hivedeck/bootstrap/worker.md"]);
    }

    #[test]
    fn personas_replace_the_bootstrap() {
        for kind in [AgentKind::Thinker, AgentKind::Specialist] {
            let mut cfg = config("t1", AgentRole::Worker);
            cfg.kind = kind;
            cfg.persona_files = vec!["personas/critic.md".into(), "@prompts/tone.md".into()];
            let spec = launch(cfg);
            assert_eq!(files(&spec), vec!["@personas/critic.md", "@prompts/tone.md"]);
        }
    }

    #[test]
    fn attachments_follow_bootstrap_files() {
        let mut cfg = config("w1", AgentRole::Worker);
        cfg.attachments = vec!["@@notes/todo.md".into(), "src/lib.rs".into(), " ".into()];
        let spec = launch(cfg);
        assert_eq!(
            files(&spec),
            vec!["@.hivedeck/bootstrap/worker.md", "@notes/todo.md", "@src/lib.rs"]
        );
    }

    #[test]
    fn shell_provider_keeps_identity_without_a_command() {
        let mut cfg = config("w2", AgentRole::Worker);
        cfg.provider = Provider::Shell;
        let spec = launch(cfg);
        assert_eq!(spec.command, None);
        assert!(spec.args.is_empty());
        assert_eq!(spec.env_var(ENV_AGENT_ID), Some("w2"));
        assert_eq!(spec.env_var(ENV_AGENT_NAME), Some("Agent w2"));
        assert_eq!(spec.env_var(ENV_AGENT_ROLE), Some("worker"));
    }

    #[test]
    fn claude_mode_off_keeps_identity_without_a_command() {
        let mut instance = TerminalInstance::for_agent(config("lead", AgentRole::Leader));
        instance.claude_mode = false;
        let spec = build(None, &instance).expect("identity");
        assert_eq!(spec.command, None);
        assert_eq!(spec.env_var(ENV_AGENT_ID), Some("lead"));
        assert_eq!(spec.env_var(ENV_AGENT_ROLE), Some("leader"));
        assert_eq!(
            spec.env_var(ENV_TERMINAL_ID).map(str::to_string),
            Some(instance.id.to_string())
        );
    }

    #[test]
    fn no_snapshot_and_no_agent_builds_nothing() {
        assert_eq!(build(None, &TerminalInstance::shell("scratch")), None);
    }

    #[test]
    fn pattern_linked_shell_takes_the_resolved_role() {
        let agents = vec![Agent::new(config("lead", AgentRole::Leader))];
        let mut shell = TerminalInstance::shell("scratch");
        shell.linked_agent_id = Some("leader".into());

        let resolved = link::resolve_linked(&shell, 0, &agents).expect("pattern resolves");
        let identity = LaunchIdentity {
            agent_id: resolved.agent.id(),
            role: resolved.agent.role(),
        };
        let spec = build(Some(identity), &shell).expect("identity");
        assert_eq!(spec.command, None);
        assert_eq!(spec.env_var(ENV_AGENT_ID), Some("lead"));
        assert_eq!(spec.env_var(ENV_AGENT_ROLE), Some("leader"));
    }

    #[test]
    fn attachments_get_exactly_one_marker() {
        assert_eq!(normalize_attachment("docs/a.md").as_deref(), Some("@docs/a.md"));
        assert_eq!(normalize_attachment("@@docs/a.md").as_deref(), Some("@docs/a.md"));
        assert_eq!(normalize_attachment("  @ notes.txt ").as_deref(), Some("@notes.txt"));
        assert_eq!(normalize_attachment("@"), None);
        assert_eq!(normalize_attachment("   "), None);
    }

    #[test]
    fn profiles_cover_every_cli_provider() {
        assert_eq!(profile_for(Provider::Claude).map(|p| p.binary_name()), Some("claude"));
        assert_eq!(profile_for(Provider::Codex).map(|p| p.binary_name()), Some("codex"));
        assert_eq!(profile_for(Provider::Gemini).map(|p| p.binary_name()), Some("gemini"));
        assert_eq!(profile_for(Provider::OpenCode).map(|p| p.binary_name()), Some("opencode"));
        assert!(profile_for(Provider::Shell).is_none());
    }
}
