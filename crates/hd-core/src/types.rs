use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// AgentRole
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Leader,
    Worker,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Leader => "leader",
            AgentRole::Worker => "worker",
        }
    }

    pub fn is_leader(&self) -> bool {
        matches!(self, AgentRole::Leader)
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// AgentKind
// ---------------------------------------------------------------------------

/// Persona flavour of an agent. Thinkers and specialists boot from their own
/// prompt files rather than the role bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    #[default]
    Standard,
    Thinker,
    Specialist,
}

impl AgentKind {
    pub fn uses_persona(&self) -> bool {
        matches!(self, AgentKind::Thinker | AgentKind::Specialist)
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Backend CLI an agent runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    #[default]
    Claude,
    Codex,
    Gemini,
    OpenCode,
    /// No agent CLI; the terminal is a plain login shell.
    Shell,
}

impl Provider {
    /// Binary launched for this provider, `None` for a plain shell.
    pub fn binary_name(&self) -> Option<&'static str> {
        match self {
            Provider::Claude => Some("claude"),
            Provider::Codex => Some("codex"),
            Provider::Gemini => Some("gemini"),
            Provider::OpenCode => Some("opencode"),
            Provider::Shell => None,
        }
    }
}

// ---------------------------------------------------------------------------
// AgentConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AgentModes {
    /// Autonomous ("ralph") loop mode. Only meaningful for a leader.
    #[serde(default)]
    pub autonomous: bool,
    #[serde(default)]
    pub skip_permissions: bool,
}

/// Launch-relevant configuration of an agent.
///
/// A copy of this is denormalized onto every [`TerminalInstance`] created for
/// the agent, and that copy is what launch-time decisions read.
///
/// Credentials are referenced by environment-variable name only; the value
/// is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub agent_id: String,
    pub name: String,
    pub role: AgentRole,
    #[serde(default)]
    pub kind: AgentKind,
    #[serde(default)]
    pub provider: Provider,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub credentials_env: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub modes: AgentModes,
    #[serde(default)]
    pub persona_files: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<String>,
}

impl AgentConfig {
    pub fn new(agent_id: impl Into<String>, name: impl Into<String>, role: AgentRole) -> Self {
        Self {
            agent_id: agent_id.into(),
            name: name.into(),
            role,
            kind: AgentKind::default(),
            provider: Provider::default(),
            model: None,
            endpoint: None,
            credentials_env: None,
            capabilities: Vec::new(),
            modes: AgentModes::default(),
            persona_files: Vec::new(),
            attachments: Vec::new(),
            working_dir: None,
        }
    }

    pub fn is_leader(&self) -> bool {
        self.role.is_leader()
    }
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// A logical agent as seen by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    #[serde(flatten)]
    pub config: AgentConfig,
    /// Identity the running agent process registered under, once known.
    #[serde(default)]
    pub runtime_id: Option<String>,
    #[serde(default)]
    pub alive: bool,
    pub last_seen: DateTime<Utc>,
}

impl Agent {
    pub fn new(config: AgentConfig) -> Self {
        Self {
            config,
            runtime_id: None,
            alive: false,
            last_seen: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.config.agent_id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn role(&self) -> AgentRole {
        self.config.role
    }

    /// `true` when `link` names this agent, either by runtime identity or by
    /// logical id.
    pub fn matches_link(&self, link: &str) -> bool {
        self.runtime_id.as_deref() == Some(link) || self.config.agent_id == link
    }
}

// ---------------------------------------------------------------------------
// PtyId
// ---------------------------------------------------------------------------

/// Identifier assigned by the PTY daemon. Never minted by the UI side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PtyId(pub String);

impl PtyId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PtyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PtyId {
    fn from(s: &str) -> Self {
        PtyId(s.to_string())
    }
}

impl From<String> for PtyId {
    fn from(s: String) -> Self {
        PtyId(s)
    }
}

// ---------------------------------------------------------------------------
// TerminalInstance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    /// No output listener attached yet.
    #[default]
    Pending,
    /// Output listener attached and streaming.
    Live,
}

/// One logical terminal in the deck.
///
/// Instances are value records: every store operation produces new ones
/// rather than mutating shared state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalInstance {
    pub id: Uuid,
    pub title: String,
    pub pty_id: Option<PtyId>,
    pub session_id: Option<String>,
    pub linked_agent_id: Option<String>,
    pub role_override: Option<AgentRole>,
    pub view_mode: ViewMode,
    pub claude_mode: bool,
    /// Generation counter, bumped on every restart.
    pub restart_count: u32,
    pub agent_config: Option<AgentConfig>,
    /// Directory an ad-hoc terminal was opened in. Agent terminals use the
    /// snapshot's working directory instead.
    pub working_dir: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TerminalInstance {
    /// A fresh instance bound to an agent. No PTY yet.
    pub fn for_agent(config: AgentConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: config.name.clone(),
            pty_id: None,
            session_id: None,
            linked_agent_id: Some(config.agent_id.clone()),
            role_override: Some(config.role),
            view_mode: ViewMode::Pending,
            claude_mode: config.provider != Provider::Shell,
            restart_count: 0,
            agent_config: Some(config),
            working_dir: None,
            created_at: Utc::now(),
        }
    }

    /// An ad-hoc shell not tied to any agent.
    pub fn shell(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            pty_id: None,
            session_id: None,
            linked_agent_id: None,
            role_override: None,
            view_mode: ViewMode::Pending,
            claude_mode: false,
            restart_count: 0,
            agent_config: None,
            working_dir: None,
            created_at: Utc::now(),
        }
    }

    /// Directory the process should start in, if any.
    pub fn launch_dir(&self) -> Option<&str> {
        self.working_dir
            .as_deref()
            .or_else(|| self.agent_config.as_ref()?.working_dir.as_deref())
    }

    /// Role declared on the instance itself, without consulting any agent.
    pub fn declared_role(&self) -> Option<AgentRole> {
        self.role_override
            .or_else(|| self.agent_config.as_ref().map(|c| c.role))
    }

    pub fn is_live(&self) -> bool {
        self.view_mode == ViewMode::Live
    }

    pub fn to_record(&self, updated_at: DateTime<Utc>) -> PersistedSessionRecord {
        PersistedSessionRecord {
            id: self.id,
            title: self.title.clone(),
            pty_id: self.pty_id.clone(),
            session_id: self.session_id.clone(),
            linked_agent_id: self.linked_agent_id.clone(),
            role_override: self.role_override,
            claude_mode: self.claude_mode,
            restart_count: self.restart_count,
            agent_config: self.agent_config.clone(),
            working_dir: self.working_dir.clone(),
            created_at: self.created_at,
            updated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// PersistedSessionRecord
// ---------------------------------------------------------------------------

/// On-disk projection of a [`TerminalInstance`]. The view mode is not part of
/// it: every restored instance starts out pending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSessionRecord {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub pty_id: Option<PtyId>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub linked_agent_id: Option<String>,
    #[serde(default)]
    pub role_override: Option<AgentRole>,
    #[serde(default)]
    pub claude_mode: bool,
    #[serde(default)]
    pub restart_count: u32,
    #[serde(default)]
    pub agent_config: Option<AgentConfig>,
    #[serde(default)]
    pub working_dir: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PersistedSessionRecord {
    /// Rebuild an instance from the record. The result is always pending;
    /// whether the PTY reference survives is decided by reconciliation.
    pub fn into_instance(self) -> TerminalInstance {
        TerminalInstance {
            id: self.id,
            title: self.title,
            pty_id: self.pty_id,
            session_id: self.session_id,
            linked_agent_id: self.linked_agent_id,
            role_override: self.role_override,
            view_mode: ViewMode::Pending,
            claude_mode: self.claude_mode,
            restart_count: self.restart_count,
            agent_config: self.agent_config,
            working_dir: self.working_dir,
            created_at: self.created_at,
        }
    }
}
