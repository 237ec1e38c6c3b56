use std::path::PathBuf;

use crate::config::{config_root, Config, ConfigError, LayoutConfig, LayoutMode};

/// Manages loading and saving settings to a TOML file on disk.
///
/// This is also the typed access point the UI uses for layout preferences.
pub struct SettingsManager {
    path: PathBuf,
}

impl SettingsManager {
    /// Create a new `SettingsManager` that reads/writes the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a `SettingsManager` using the default config location
    /// (`~/.hivedeck/config.toml`).
    pub fn default_path() -> Self {
        Self {
            path: config_root().join("config.toml"),
        }
    }

    /// Load config from the TOML file on disk.
    pub fn load(&self) -> Result<Config, ConfigError> {
        Config::load_from(&self.path)
    }

    /// Save config to the TOML file on disk, creating parent directories if
    /// they don't exist.
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }
        let text = config.to_toml()?;
        std::fs::write(&self.path, text).map_err(|e| ConfigError::Io(e.to_string()))?;
        Ok(())
    }

    /// Load config from disk, falling back to `Config::default()` when the
    /// file is missing or unparseable.
    pub fn load_or_default(&self) -> Config {
        self.load().unwrap_or_default()
    }

    /// Load config for a read-modify-write. A missing file means defaults; a
    /// file that exists but does not parse is an error, so it is never
    /// overwritten.
    pub fn load_existing(&self) -> Result<Config, ConfigError> {
        if self.path.exists() {
            self.load()
        } else {
            Ok(Config::default())
        }
    }

    /// Current layout preferences.
    pub fn layout(&self) -> LayoutConfig {
        self.load_or_default().layout
    }

    /// Replace the layout preferences, keeping every other section.
    pub fn set_layout(&self, layout: LayoutConfig) -> Result<(), ConfigError> {
        layout.validate()?;
        let mut cfg = self.load_existing()?;
        cfg.layout = layout;
        self.save(&cfg)
    }

    /// Persist only the active layout mode.
    pub fn set_layout_mode(&self, mode: LayoutMode) -> Result<(), ConfigError> {
        let mut layout = self.load_existing()?.layout;
        layout.mode = mode;
        self.set_layout(layout)
    }

    /// Return the file path this manager reads/writes.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_settings() -> (SettingsManager, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let mgr = SettingsManager::new(dir.path().join("nested").join("config.toml"));
        (mgr, dir)
    }

    #[test]
    fn save_and_load_roundtrip() {
        let (mgr, _dir) = tmp_settings();

        let mut cfg = Config::default();
        cfg.general.log_level = "debug".into();
        cfg.session.debounce_ms = 250;
        cfg.layout.mode = LayoutMode::Splitter;

        mgr.save(&cfg).unwrap();
        let loaded = mgr.load().unwrap();

        assert_eq!(loaded.general.log_level, "debug");
        assert_eq!(loaded.session.debounce_ms, 250);
        assert_eq!(loaded.layout.mode, LayoutMode::Splitter);
    }

    #[test]
    fn load_or_default_returns_default_on_missing_file() {
        let (mgr, _dir) = tmp_settings();
        let cfg = mgr.load_or_default();
        assert_eq!(cfg.session.debounce_ms, 100);
        assert!(!cfg.daemon.raw_buffer_access);
    }

    #[test]
    fn set_layout_mode_keeps_other_sections() {
        let (mgr, _dir) = tmp_settings();
        let mut cfg = Config::default();
        cfg.daemon.max_ptys = 4;
        mgr.save(&cfg).unwrap();

        mgr.set_layout_mode(LayoutMode::Window).unwrap();

        let loaded = mgr.load().unwrap();
        assert_eq!(loaded.layout.mode, LayoutMode::Window);
        assert_eq!(loaded.daemon.max_ptys, 4);
    }

    #[test]
    fn unparseable_file_is_not_overwritten() {
        let (mgr, _dir) = tmp_settings();
        std::fs::create_dir_all(mgr.path().parent().expect("parent")).expect("mkdir");
        std::fs::write(mgr.path(), "[layout\nmode = ").expect("write");

        assert!(mgr.set_layout_mode(LayoutMode::Window).is_err());
        let text = std::fs::read_to_string(mgr.path()).expect("read");
        assert_eq!(text, "[layout\nmode = ");
    }

    #[test]
    fn invalid_layout_is_not_written() {
        let (mgr, _dir) = tmp_settings();
        let mut layout = LayoutConfig::default();
        layout.min_split_percent = 75.0;
        assert!(mgr.set_layout(layout).is_err());
        assert!(!mgr.path().exists());
    }
}
