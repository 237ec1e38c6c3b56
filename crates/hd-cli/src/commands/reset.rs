use hd_core::config::Config;

use super::open_controller;

/// Run the `reset` subcommand: drop every terminal and its persisted record.
pub async fn run(config: &Config) -> anyhow::Result<()> {
    let mut controller = open_controller(config).await?;
    let count = controller.instances().len();
    controller.reset().await?;
    controller.shutdown().await;
    println!("reset: removed {count} terminal(s)");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hd_session::persistence::{FileGateway, PersistenceGateway};

    #[tokio::test]
    async fn reset_removes_session_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = Config::default();
        config.session.state_dir = Some(dir.path().display().to_string());

        let mut controller = open_controller(&config).await.expect("controller");
        controller.open_terminal("one", None).expect("open");
        controller.shutdown().await;

        let gateway = FileGateway::new(dir.path());
        assert!(gateway.load_terminal_state().await.expect("load").is_some());

        run(&config).await.expect("reset");
        assert!(gateway.load_terminal_state().await.expect("load").is_none());
    }
}
