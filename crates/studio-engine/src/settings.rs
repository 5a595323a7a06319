use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use studio_contracts::chat::CHAT_SLOT_NAME;

use crate::server::{ServerConfig, DEFAULT_HOST, DEFAULT_PORT};

pub const ENDPOINT_ENV: &str = "STUDIO_ENDPOINT";
pub const HISTORY_PATH_ENV: &str = "STUDIO_HISTORY_PATH";
pub const HOST_ENV: &str = "STUDIO_HOST";
pub const PORT_ENV: &str = "STUDIO_PORT";
pub const FAILURE_RATE_ENV: &str = "STUDIO_FAILURE_RATE";
pub const LOG_ENV: &str = "STUDIO_LOG";

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:3000/api/generate";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DATA_DIR_NAME: &str = "ai-studio";

pub fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Environment fallbacks, captured once. Flags passed to the resolvers win
/// over these, and these win over the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    endpoint: Option<String>,
    history_path: Option<String>,
    host: Option<String>,
    port: Option<String>,
    failure_rate: Option<String>,
    log: Option<String>,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(non_empty_env)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            endpoint: lookup(ENDPOINT_ENV),
            history_path: lookup(HISTORY_PATH_ENV),
            host: lookup(HOST_ENV),
            port: lookup(PORT_ENV),
            failure_rate: lookup(FAILURE_RATE_ENV),
            log: lookup(LOG_ENV),
        }
    }

    pub fn endpoint(&self, flag: Option<String>) -> String {
        flag.or_else(|| self.endpoint.clone())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
    }

    pub fn history_path(&self, flag: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(path) = flag.or_else(|| self.history_path.as_ref().map(PathBuf::from)) {
            return Ok(path);
        }
        let data_dir = dirs::data_local_dir().ok_or_else(|| {
            anyhow!("could not determine a local data directory; pass --history or set {HISTORY_PATH_ENV}")
        })?;
        Ok(data_dir
            .join(DATA_DIR_NAME)
            .join(format!("{CHAT_SLOT_NAME}.json")))
    }

    pub fn server(&self, host: Option<String>, port: Option<u16>) -> Result<ServerConfig> {
        let host = host
            .or_else(|| self.host.clone())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match (port, self.port.as_deref()) {
            (Some(port), _) => port,
            (None, Some(raw)) => raw
                .parse::<u16>()
                .with_context(|| format!("invalid {PORT_ENV} value '{raw}'"))?,
            (None, None) => DEFAULT_PORT,
        };
        Ok(ServerConfig { host, port })
    }

    pub fn failure_rate(&self, flag: Option<f64>, default: f64) -> Result<f64> {
        let rate = match (flag, self.failure_rate.as_deref()) {
            (Some(rate), _) => rate,
            (None, Some(raw)) => raw
                .parse::<f64>()
                .with_context(|| format!("invalid {FAILURE_RATE_ENV} value '{raw}'"))?,
            (None, None) => default,
        };
        if !(0.0..=1.0).contains(&rate) {
            return Err(anyhow!("failure rate must be between 0 and 1 (got {rate})"));
        }
        Ok(rate)
    }

    /// `EnvFilter` directives: our crates at the requested level, everything
    /// else at `warn`.
    pub fn log_filter(&self, verbose: bool) -> String {
        let level = if verbose {
            "debug"
        } else {
            self.log.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
        };
        format!("studio={level},warn")
    }
}
