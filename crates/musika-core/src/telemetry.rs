//! Centralised tracing initialisation for the Musika binaries.
//!
//! Called once at program start. `musikad` maps `--json` to one JSON object
//! per line and `--verbose` to a `debug` default level (phase transitions,
//! every runtime command); `musikactl` only maps `--verbose`, its `--json`
//! shapes reply output instead. `RUST_LOG` overrides the default level.
//! Later calls are ignored because the global subscriber can only be set
//! once per process.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialise the global tracing subscriber.
///
/// * `json`: emit newline-delimited JSON log lines.
/// * `level`: default verbosity when `RUST_LOG` is not set.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false))
            .try_init()
            .ok();
    }
}
