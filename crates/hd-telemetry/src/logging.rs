use tracing_subscriber::{fmt, EnvFilter};

/// Target under which security-relevant events (raw buffer grants and reads)
/// are logged. Filter on it with e.g. `RUST_LOG=hd::audit=info`.
pub const AUDIT_TARGET: &str = "hd::audit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    /// One JSON object per line (suitable for Vector / Loki / ELK).
    Json,
}

impl LogFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            LogFormat::Json
        } else {
            LogFormat::Human
        }
    }
}

/// `RUST_LOG` if set, else `default_level`, else `info` when
/// `default_level` does not parse.
fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Logs go to stderr so command output on
/// stdout stays machine-readable.
///
/// Safe to call multiple times (e.g. in tests); returns `false` when a
/// subscriber was already installed and this call did nothing.
pub fn init(service_name: &str, default_level: &str, format: LogFormat) -> bool {
    let filter = build_filter(default_level);
    let installed = match format {
        LogFormat::Human => fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true)
            .try_init()
            .is_ok(),
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .try_init()
            .is_ok(),
    };

    if installed {
        tracing::debug!(service = service_name, ?format, "logging initialised");
    }
    installed
}

pub fn init_logging(service_name: &str, default_level: &str) -> bool {
    init(service_name, default_level, LogFormat::Human)
}

pub fn init_logging_json(service_name: &str, default_level: &str) -> bool {
    init(service_name, default_level, LogFormat::Json)
}
