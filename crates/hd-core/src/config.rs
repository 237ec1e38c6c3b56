use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration loaded from `~/.hivedeck/config.toml`.
///
/// Agent credentials never live here; agents reference them by env var name.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
}

impl Config {
    /// Load config from `~/.hivedeck/config.toml`, falling back to defaults
    /// when the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(path)
        } else {
            let cfg = Config::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let cfg: Config = toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        self.validate()?;
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Semantic validation for settings that are not fully expressible via type checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.session.validate()?;
        self.daemon.validate()?;
        self.layout.validate()?;
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        config_root().join("config.toml")
    }
}

/// `~/.hivedeck`, or `./.hivedeck` when no home directory is known.
pub fn config_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".hivedeck")
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
    #[error("validation: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Section structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones.
    #[serde(default)]
    pub log_json: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Directory holding `terminal_sessions.json`. Defaults to `~/.hivedeck`.
    #[serde(default)]
    pub state_dir: Option<String>,
    /// Coalescing window of the persistence writer.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_cols")]
    pub default_cols: u16,
    #[serde(default = "default_rows")]
    pub default_rows: u16,
    /// Shell used for plain terminals. `$SHELL` when unset.
    #[serde(default)]
    pub shell: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            state_dir: None,
            debounce_ms: default_debounce_ms(),
            default_cols: default_cols(),
            default_rows: default_rows(),
            shell: None,
        }
    }
}

impl SessionConfig {
    pub fn state_dir(&self) -> PathBuf {
        self.state_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(config_root)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_cols == 0 || self.default_rows == 0 {
            return Err(ConfigError::Validation(
                "session.default_cols and session.default_rows must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_debounce_ms() -> u64 {
    100
}
fn default_cols() -> u16 {
    80
}
fn default_rows() -> u16 {
    24
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_max_ptys")]
    pub max_ptys: usize,
    /// Bytes of scrollback kept per PTY for buffer reads.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// Whether raw (unsanitised) buffer reads may be granted at all this
    /// session. Off unless explicitly enabled.
    #[serde(default)]
    pub raw_buffer_access: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            max_ptys: default_max_ptys(),
            buffer_capacity: default_buffer_capacity(),
            raw_buffer_access: false,
        }
    }
}

impl DaemonConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_ptys == 0 {
            return Err(ConfigError::Validation(
                "daemon.max_ptys must be at least 1".to_string(),
            ));
        }
        if self.buffer_capacity < 1024 {
            return Err(ConfigError::Validation(format!(
                "daemon.buffer_capacity must be at least 1024 bytes (got {})",
                self.buffer_capacity
            )));
        }
        Ok(())
    }
}

fn default_max_ptys() -> usize {
    32
}
fn default_buffer_capacity() -> usize {
    256 * 1024
}

// ---------------------------------------------------------------------------
// Layout settings (UI-facing)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutMode {
    #[default]
    Grid,
    Splitter,
    Window,
}

impl LayoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutMode::Grid => "grid",
            LayoutMode::Splitter => "splitter",
            LayoutMode::Window => "window",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default)]
    pub mode: LayoutMode,
    /// Smallest width a splitter segment can be dragged to, in percent.
    #[serde(default = "default_min_split_percent")]
    pub min_split_percent: f64,
    #[serde(default = "default_min_window_width")]
    pub min_window_width: f64,
    #[serde(default = "default_min_window_height")]
    pub min_window_height: f64,
    /// Fraction of each container dimension treated as an edge drop zone.
    #[serde(default = "default_edge_threshold")]
    pub edge_threshold: f64,
    /// Side of the centre drop square as a fraction of the smaller dimension.
    #[serde(default = "default_center_fraction")]
    pub center_fraction: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            mode: LayoutMode::default(),
            min_split_percent: default_min_split_percent(),
            min_window_width: default_min_window_width(),
            min_window_height: default_min_window_height(),
            edge_threshold: default_edge_threshold(),
            center_fraction: default_center_fraction(),
        }
    }
}

impl LayoutConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..50.0).contains(&self.min_split_percent) {
            return Err(ConfigError::Validation(format!(
                "layout.min_split_percent must be in [0, 50) (got {})",
                self.min_split_percent
            )));
        }
        if self.min_window_width <= 0.0 || self.min_window_height <= 0.0 {
            return Err(ConfigError::Validation(
                "layout.min_window_width and layout.min_window_height must be positive"
                    .to_string(),
            ));
        }
        if !(0.0..0.5).contains(&self.edge_threshold) {
            return Err(ConfigError::Validation(format!(
                "layout.edge_threshold must be in [0, 0.5) (got {})",
                self.edge_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.center_fraction) {
            return Err(ConfigError::Validation(format!(
                "layout.center_fraction must be in [0, 1] (got {})",
                self.center_fraction
            )));
        }
        Ok(())
    }
}

fn default_min_split_percent() -> f64 {
    10.0
}
fn default_min_window_width() -> f64 {
    240.0
}
fn default_min_window_height() -> f64 {
    160.0
}
fn default_edge_threshold() -> f64 {
    0.12
}
fn default_center_fraction() -> f64 {
    0.2
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
