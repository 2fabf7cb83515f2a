//! Ledger configuration.

use std::env;
use std::time::Duration;

use crate::error::{LedgerError, LedgerResult};

pub const CACHE_TTL_ENV: &str = "POOLPAL_CACHE_TTL_SECS";
pub const CACHE_ENABLED_ENV: &str = "POOLPAL_CACHE_ENABLED";
pub const REFERENCE_CODE_ATTEMPTS_ENV: &str = "POOLPAL_REFERENCE_CODE_ATTEMPTS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// How long a cached document read stays fresh.
    pub cache_ttl: Duration,
    pub cache_enabled: bool,
    /// Fresh reference codes to try before giving up on collisions.
    pub reference_code_attempts: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            cache_ttl: Duration::from_secs(300),
            cache_enabled: true,
            reference_code_attempts: 8,
        }
    }
}

impl LedgerConfig {
    /// Load from the environment (and a `.env` file if present), falling back
    /// to defaults for unset variables.
    pub fn from_env() -> LedgerResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> LedgerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let cache_ttl = match lookup(CACHE_TTL_ENV) {
            Some(raw) => Duration::from_secs(raw.trim().parse::<u64>().map_err(|e| {
                LedgerError::Config(format!("Invalid {}: {}", CACHE_TTL_ENV, e))
            })?),
            None => defaults.cache_ttl,
        };
        let cache_enabled = match lookup(CACHE_ENABLED_ENV) {
            Some(raw) => raw.trim().parse::<bool>().map_err(|e| {
                LedgerError::Config(format!("Invalid {}: {}", CACHE_ENABLED_ENV, e))
            })?,
            None => defaults.cache_enabled,
        };
        let reference_code_attempts = match lookup(REFERENCE_CODE_ATTEMPTS_ENV) {
            Some(raw) => raw.trim().parse::<u32>().map_err(|e| {
                LedgerError::Config(format!("Invalid {}: {}", REFERENCE_CODE_ATTEMPTS_ENV, e))
            })?,
            None => defaults.reference_code_attempts,
        };
        if reference_code_attempts == 0 {
            return Err(LedgerError::Config(format!(
                "{} must be at least 1",
                REFERENCE_CODE_ATTEMPTS_ENV
            )));
        }

        let config = LedgerConfig {
            cache_ttl,
            cache_enabled,
            reference_code_attempts,
        };
        tracing::debug!(?config, "ledger configuration loaded");
        Ok(config)
    }

    /// TTL the ledger's cache should use; zero when caching is disabled.
    pub fn effective_cache_ttl(&self) -> Duration {
        if self.cache_enabled {
            self.cache_ttl
        } else {
            Duration::ZERO
        }
    }
}
