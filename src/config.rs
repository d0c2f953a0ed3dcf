//! Config module contains the top-level config for the app.

use std::env;
use std::time::Duration;

use config_crate::{Config as RawConfig, ConfigError, Environment, File};

/// Basic settings - HTTP binding address and database DSN
#[derive(Debug, Deserialize, Clone)]
pub struct Server {
    pub host: String,
    pub port: String,
    pub database: String,
    pub thread_count: usize,
    pub redis: Option<String>,
}

/// Claim arbitration settings
#[derive(Debug, Deserialize, Clone)]
pub struct Claims {
    pub cooldown_secs: u64,
    pub session_cookie: String,
    pub session_max_age_secs: u64,
    pub trust_forwarded_for: bool,
}

/// Coarse per-address limit in front of the cooldown check
#[derive(Debug, Deserialize, Clone)]
pub struct RateLimit {
    pub max_claims: u32,
    pub window_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Jwt {
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Log {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SentryConfig {
    pub dsn: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: Server,
    pub claims: Claims,
    pub rate_limit: RateLimit,
    pub jwt: Jwt,
    pub log: Option<Log>,
    pub sentry: Option<SentryConfig>,
}

impl Config {
    /// Creates config from base.toml, which is overwritten by <env>.toml, where env is one of
    /// development, test, production. After that it could be overwritten by env variables
    /// like COUPONS_SERVER__PORT.
    pub fn new() -> Result<Self, ConfigError> {
        let env = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        Config::with_env(env)
    }

    pub fn with_env(env: impl Into<String>) -> Result<Self, ConfigError> {
        let mut s = RawConfig::new();

        s.merge(File::with_name("config/base"))?;
        s.merge(File::with_name(&format!("config/{}", env.into())).required(false))?;
        s.merge(Environment::with_prefix("COUPONS").separator("__"))?;

        s.try_into()
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.claims.cooldown_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit.window_secs)
    }
}
