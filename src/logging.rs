//! Log records written through the `log` macros are forwarded to a
//! `tracing-subscriber` formatter. `RUST_LOG` takes precedence over the configured level.

use tracing_subscriber::EnvFilter;

use config::Log;

pub const DEFAULT_LEVEL: &str = "info";

pub fn filter_directive(log_config: Option<&Log>) -> String {
    log_config
        .map(|log| log.level.trim().to_lowercase())
        .filter(|level| !level.is_empty())
        .unwrap_or_else(|| DEFAULT_LEVEL.to_string())
}

pub fn init(log_config: Option<&Log>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_directive(log_config)));

    if let Err(e) = tracing_subscriber::fmt().with_env_filter(filter).try_init() {
        eprintln!("Logger is already initialized: {}", e);
    }
}
