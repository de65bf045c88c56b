//! Engine configuration, loaded once at process start (§6, §9 — "credential
//! hot-reload is out of scope").
//!
//! Credential *loading* (turning a service-account JSON blob into a live,
//! authenticated connection) stays an external collaborator per §1; what
//! this module owns is the shape of the recognized environment variables and
//! sane, documented defaults for everything else.

use std::env;
use std::time::Duration;

/// One side's reachable endpoint: where to send requests and how to
/// authenticate them. The fine-grained service-account fields (privateKey,
/// clientEmail, ...) are collapsed here into whatever bearer token the
/// deployment's credential loader produced; this crate never parses a
/// service-account JSON blob itself.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub base_url: String,
    pub bearer_token: Option<String>,
}

/// Top-level engine configuration, assembled from environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub primary: EndpointConfig,
    pub standby: EndpointConfig,

    /// HTTP listener port for the thin control-surface adapter (`PORT`).
    pub port: u16,
    /// Cadence hint for the external scheduler (`RUN_INTERVAL_MINUTES`).
    pub run_interval: Duration,
    /// Health probe cadence (`HEALTH_PROBE_INTERVAL_SECONDS`).
    pub health_probe_interval: Duration,
    /// Read-chunking size (`BATCH_SIZE`); the 450-op write cap is fixed and
    /// not configurable (§4.1).
    pub batch_size: usize,
    /// Transient-error retry ceiling (`MAX_RETRY_ATTEMPTS`).
    pub max_retry_attempts: u32,
    /// Where the watermark/counter file lives (`STATS_FILE_PATH`).
    pub stats_file_path: String,
}

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_RUN_INTERVAL_MINUTES: u64 = 10;
const DEFAULT_HEALTH_PROBE_INTERVAL_SECONDS: u64 = 10;
const DEFAULT_BATCH_SIZE: usize = 100;
const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_STATS_FILE_PATH: &str = "./stats.json";

impl EngineConfig {
    /// Loads configuration from process environment variables, falling back
    /// to the documented defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self {
            primary: EndpointConfig {
                base_url: env::var("PRIMARY_BASE_URL").unwrap_or_default(),
                bearer_token: env::var("PRIMARY_BEARER_TOKEN").ok(),
            },
            standby: EndpointConfig {
                base_url: env::var("STANDBY_BASE_URL").unwrap_or_default(),
                bearer_token: env::var("STANDBY_BEARER_TOKEN").ok(),
            },
            port: env_parsed("PORT", DEFAULT_PORT),
            run_interval: Duration::from_secs(60 * env_parsed("RUN_INTERVAL_MINUTES", DEFAULT_RUN_INTERVAL_MINUTES)),
            health_probe_interval: Duration::from_secs(env_parsed(
                "HEALTH_PROBE_INTERVAL_SECONDS",
                DEFAULT_HEALTH_PROBE_INTERVAL_SECONDS,
            )),
            batch_size: env_parsed("BATCH_SIZE", DEFAULT_BATCH_SIZE),
            max_retry_attempts: env_parsed("MAX_RETRY_ATTEMPTS", DEFAULT_MAX_RETRY_ATTEMPTS),
            stats_file_path: env::var("STATS_FILE_PATH").unwrap_or_else(|_| DEFAULT_STATS_FILE_PATH.to_string()),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            primary: EndpointConfig { base_url: String::new(), bearer_token: None },
            standby: EndpointConfig { base_url: String::new(), bearer_token: None },
            port: DEFAULT_PORT,
            run_interval: Duration::from_secs(60 * DEFAULT_RUN_INTERVAL_MINUTES),
            health_probe_interval: Duration::from_secs(DEFAULT_HEALTH_PROBE_INTERVAL_SECONDS),
            batch_size: DEFAULT_BATCH_SIZE,
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            stats_file_path: DEFAULT_STATS_FILE_PATH.to_string(),
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
