pub mod drop_zone;
pub mod grid;
pub mod layout;
pub mod reset;
pub mod status;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use hd_core::config::Config;
use hd_core::settings::SettingsManager;
use hd_session::persistence::FileGateway;
use hd_session::pty_daemon::LocalPtyDaemon;
use hd_session::SessionController;

/// Load the config. Without `--config`, a missing default file means
/// defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Config::load().context("failed to load config"),
    }
}

/// Settings manager over the `--config` file, or the default location.
pub fn settings_manager(path: Option<&Path>) -> SettingsManager {
    match path {
        Some(path) => SettingsManager::new(path),
        None => SettingsManager::default_path(),
    }
}

/// Controller over the on-disk session file and an in-process daemon,
/// already restored.
pub async fn open_controller(config: &Config) -> anyhow::Result<SessionController> {
    let daemon = Arc::new(LocalPtyDaemon::new(&config.daemon, &config.session));
    let gateway = Arc::new(FileGateway::new(&config.session.state_dir()));
    let mut controller = SessionController::new(daemon, gateway, config.session.clone());
    controller
        .init(None)
        .await
        .context("failed to restore terminal sessions")?;
    Ok(controller)
}
