use anyhow::Context;
use hd_core::config::{LayoutConfig, LayoutMode};
use hd_core::settings::SettingsManager;
use tracing::info;

/// Run the `layout` subcommand: show the layout preferences, switching the
/// active mode first when one is given.
pub fn run(
    settings: &SettingsManager,
    mode: Option<LayoutMode>,
    as_json: bool,
) -> anyhow::Result<()> {
    if let Some(mode) = mode {
        settings.set_layout_mode(mode).with_context(|| {
            format!("failed to save layout mode to {}", settings.path().display())
        })?;
        info!(mode = mode.as_str(), "layout mode saved");
    }
    let layout = settings
        .load_existing()
        .with_context(|| format!("failed to load {}", settings.path().display()))?
        .layout;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&layout)?);
    } else {
        print!("{}", render(&layout));
    }
    Ok(())
}

fn render(layout: &LayoutConfig) -> String {
    format!(
        "mode              {}\n\
         min split         {}%\n\
         min window        {}x{}\n\
         edge threshold    {}\n\
         center fraction   {}\n",
        layout.mode.as_str(),
        layout.min_split_percent,
        layout.min_window_width,
        layout.min_window_height,
        layout.edge_threshold,
        layout.center_fraction,
    )
}
