use sentry;
use sentry::integrations::panic::register_panic_handler;
use sentry::internals::ClientInitGuard;

use config::SentryConfig;

/// Reporting is off unless a DSN is configured. Keep the guard alive for the process lifetime.
pub fn init(sentry_config: Option<&SentryConfig>) -> Option<ClientInitGuard> {
    sentry_config.map(|config| {
        info!("Sentry reporting enabled");
        let guard = sentry::init(config.dsn.as_str());
        register_panic_handler();
        guard
    })
}
