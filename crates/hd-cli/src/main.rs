mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use hd_core::config::LayoutMode;
use hd_telemetry::logging::{self, LogFormat};
use hd_telemetry::spans::create_operation_span;
use tracing::{info, Instrument};

/// hivedeck CLI -- inspect and reset the terminal deck.
#[derive(Parser)]
#[command(name = "hd", version, about)]
struct Cli {
    /// Config file (defaults to ~/.hivedeck/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile persisted terminals against the daemon and list them
    /// (default when no subcommand is given).
    Status,

    /// Show the grid shape and cells for a number of terminals.
    Grid {
        count: usize,
        #[arg(long, default_value_t = 1200.0)]
        width: f64,
        #[arg(long, default_value_t = 800.0)]
        height: f64,
    },

    /// Resolve the drop zone under a pointer inside a container at the origin.
    DropZone {
        x: f64,
        y: f64,
        #[arg(value_name = "W")]
        width: f64,
        #[arg(value_name = "H")]
        height: f64,
    },

    /// Show the layout preferences, optionally switching the active mode.
    Layout {
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },

    /// Kill every terminal and delete the persisted session state.
    Reset {
        /// Required; reset cannot be undone.
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Grid,
    Splitter,
    Window,
}

impl From<ModeArg> for LayoutMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Grid => LayoutMode::Grid,
            ModeArg::Splitter => LayoutMode::Splitter,
            ModeArg::Window => LayoutMode::Window,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;

    logging::init(
        "hd",
        &config.general.log_level,
        LogFormat::from_json_flag(config.general.log_json),
    );

    match cli.command {
        None | Some(Commands::Status) => {
            let op = create_operation_span("status");
            commands::status::run(&config, cli.json)
                .instrument(op.span)
                .await?;
        }
        Some(Commands::Grid {
            count,
            width,
            height,
        }) => {
            commands::grid::run(count, width, height, cli.json)?;
        }
        Some(Commands::DropZone {
            x,
            y,
            width,
            height,
        }) => {
            commands::drop_zone::run(&config, x, y, width, height, cli.json)?;
        }
        Some(Commands::Layout { mode }) => {
            let settings = commands::settings_manager(cli.config.as_deref());
            commands::layout::run(&settings, mode.map(LayoutMode::from), cli.json)?;
        }
        Some(Commands::Reset { yes }) => {
            if !yes {
                anyhow::bail!("reset deletes every persisted terminal; re-run with --yes");
            }
            let op = create_operation_span("reset");
            info!(trace_id = %op.trace_id, "resetting terminal deck");
            commands::reset::run(&config).instrument(op.span).await?;
        }
    }

    Ok(())
}
