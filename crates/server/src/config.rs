//! Server configuration

use anyhow::Result;
use serde::Deserialize;

/// Server configuration, loaded from `RECIPE_`-prefixed environment
/// variables with sensible defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_address")]
    pub address: String,

    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Sustained request rate (requests per second).
    #[serde(default = "default_rate_limit")]
    pub rate_limit: f64,

    /// Burst capacity of the rate limiter.
    #[serde(default = "default_rate_limit_burst")]
    pub rate_limit_burst: f64,

    /// Cache-Control max-age for successful recipe responses, seconds.
    #[serde(default = "default_cache_max_age")]
    pub cache_max_age_secs: u32,
}

fn default_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_rate_limit() -> f64 {
    100.0
}

fn default_rate_limit_burst() -> f64 {
    200.0
}

fn default_cache_max_age() -> u32 {
    300
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            rate_limit: default_rate_limit(),
            rate_limit_burst: default_rate_limit_burst(),
            cache_max_age_secs: default_cache_max_age(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("RECIPE"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_default())
    }
}
