use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    /// PostgreSQL connection URL for the ledger store
    pub postgres_url: String,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default = "default_currencies")]
    pub currencies: Vec<CurrencyConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound for a whole request, unit of work included
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl GatewayConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Idempotency cache configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
    /// TTL of the pending marker written when a keyed request arrives.
    /// Must exceed `gateway.request_timeout_ms`; defaults to the timeout plus
    /// [`PENDING_TTL_MARGIN_MS`].
    #[serde(default)]
    pub pending_ttl_ms: Option<u64>,
    /// TTL of a completed (replayable) response
    pub completed_ttl_secs: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            pending_ttl_ms: None,
            completed_ttl_secs: 3600,
        }
    }
}

impl RedisConfig {
    pub fn completed_ttl(&self) -> Duration {
        Duration::from_secs(self.completed_ttl_secs)
    }
}

/// Headroom between the request timeout and the pending marker's expiry.
/// The marker is written before the timeout clock starts.
pub const PENDING_TTL_MARGIN_MS: u64 = 5_000;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CurrencyConfig {
    pub code: String,
    /// Number of minor-unit digits (SGD = 2, JPY = 0)
    pub precision: u32,
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

fn default_currencies() -> Vec<CurrencyConfig> {
    vec![
        CurrencyConfig {
            code: "SGD".to_string(),
            precision: 2,
        },
        CurrencyConfig {
            code: "JPY".to_string(),
            precision: 0,
        },
    ]
}

impl AppConfig {
    /// Load `config/{env}.yaml`, then apply `DATABASE_URL` / `REDIS_URL` overrides.
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        let mut config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config yaml: {}", config_path))?;

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.postgres_url = url;
        }
        if let Ok(url) = std::env::var("REDIS_URL") {
            config.redis.url = url;
        }
        config
            .validate()
            .with_context(|| format!("Invalid config: {}", config_path))?;
        Ok(config)
    }

    /// A pending marker that expires while its request is still running would
    /// let a retry with the same key execute a second time.
    pub fn validate(&self) -> anyhow::Result<()> {
        let timeout = self.gateway.request_timeout();
        let pending = self.pending_ttl();
        if pending <= timeout {
            anyhow::bail!(
                "redis.pending_ttl_ms ({}) must exceed gateway.request_timeout_ms ({})",
                pending.as_millis(),
                timeout.as_millis()
            );
        }
        Ok(())
    }

    pub fn pending_ttl(&self) -> Duration {
        match self.redis.pending_ttl_ms {
            Some(ms) => Duration::from_millis(ms),
            None => Duration::from_millis(
                self.gateway
                    .request_timeout_ms
                    .saturating_add(PENDING_TTL_MARGIN_MS),
            ),
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }
}
