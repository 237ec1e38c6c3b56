use hd_core::config::Config;
use hd_core::types::{AgentRole, TerminalInstance};
use hd_session::SessionController;
use serde_json::json;

use super::open_controller;

/// Run the `status` subcommand: restore, reconcile and list the terminals.
pub async fn run(config: &Config, as_json: bool) -> anyhow::Result<()> {
    let mut controller = open_controller(config).await?;
    let output = if as_json {
        serde_json::to_string_pretty(&status_json(&controller))?
    } else {
        render(&controller)
    };
    controller.shutdown().await;
    println!("{output}");
    Ok(())
}

fn role_label(role: Option<AgentRole>) -> &'static str {
    role.map(|r| r.as_str()).unwrap_or("-")
}

fn pty_label(t: &TerminalInstance) -> String {
    t.pty_id
        .as_ref()
        .map(|p| p.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn render(controller: &SessionController) -> String {
    let instances = controller.instances();
    let mut out = String::new();
    out.push_str(&format!("hivedeck terminals  ({})\n", instances.len()));
    out.push_str(&"-".repeat(60));
    out.push('\n');
    if instances.is_empty() {
        out.push_str("no terminals\n");
        return out;
    }
    for (i, t) in instances.iter().enumerate() {
        let agent = controller
            .resolve_agent(i)
            .map(|a| a.id().to_string())
            .or_else(|| t.linked_agent_id.clone())
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:<2} {:<20} {:<7} {:<10} {:<14} gen {}\n",
            i,
            t.title,
            role_label(controller.resolved_role(i)),
            pty_label(t),
            agent,
            t.restart_count,
        ));
    }
    out
}

fn status_json(controller: &SessionController) -> serde_json::Value {
    let terminals: Vec<_> = controller
        .instances()
        .iter()
        .enumerate()
        .map(|(i, t)| {
            json!({
                "id": t.id,
                "title": t.title,
                "role": controller.resolved_role(i),
                "pty_id": t.pty_id,
                "linked_agent_id": t.linked_agent_id,
                "restart_count": t.restart_count,
            })
        })
        .collect();
    json!({ "terminals": terminals })
}
