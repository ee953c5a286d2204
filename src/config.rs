//! Configuration Module
//!
//! Handles loading cache and server configuration from environment variables.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::error::{CacheError, Result};
use crate::kids::DEFAULT_NAMESPACE_TTLS;

/// Lifetime of entries whose namespace has no TTL of its own.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Interval between maintenance sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default bound on live entries.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

// == Cache Settings ==
/// Parameters a cache store is constructed with.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Fallback lifetime for `Ttl::Default` writes
    pub default_ttl: Duration,
    /// Per-namespace lifetimes that override `default_ttl`
    pub namespace_ttls: HashMap<String, Duration>,
    /// Maximum live entries, None = unbounded
    pub max_entries: Option<usize>,
    /// Maximum estimated bytes, None = unbounded
    pub max_bytes: Option<usize>,
}

impl CacheSettings {
    /// Settings without namespace TTLs or capacity bounds.
    pub fn unbounded(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            namespace_ttls: HashMap::new(),
            max_entries: None,
            max_bytes: None,
        }
    }

    pub fn with_namespace_ttl(mut self, namespace: impl Into<String>, ttl: Duration) -> Self {
        self.namespace_ttls.insert(namespace.into(), ttl);
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    /// Default lifetime for keys in `namespace`.
    pub fn ttl_for(&self, namespace: &str) -> Duration {
        self.namespace_ttls
            .get(namespace)
            .copied()
            .unwrap_or(self.default_ttl)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            namespace_ttls: DEFAULT_NAMESPACE_TTLS
                .iter()
                .map(|(namespace, ttl)| (namespace.to_string(), *ttl))
                .collect(),
            max_entries: Some(DEFAULT_MAX_ENTRIES),
            max_bytes: None,
        }
    }
}

// == Config ==
/// Process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub cache: CacheSettings,
    /// Interval between maintenance sweeps
    pub sweep_interval: Duration,
    /// Admin HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `DEFAULT_TTL_MS` - Default TTL in milliseconds (default: 300000)
    /// - `NAMESPACE_TTLS` - `ns=millis` pairs separated by commas
    /// - `MAX_ENTRIES` - Maximum cache entries, 0 = unbounded (default: 10000)
    /// - `MAX_BYTES` - Maximum estimated bytes (default: unbounded)
    /// - `SWEEP_INTERVAL_SECS` - Maintenance sweep frequency (default: 300)
    /// - `SERVER_PORT` - Admin HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let mut cache = defaults.cache;

        if let Some(ms) = env_parse::<u64>("DEFAULT_TTL_MS").filter(|ms| *ms > 0) {
            cache.default_ttl = Duration::from_millis(ms);
        }

        if let Ok(raw) = env::var("NAMESPACE_TTLS") {
            match parse_namespace_ttls(&raw) {
                Ok(overrides) => cache.namespace_ttls.extend(overrides),
                Err(err) => warn!(error = %err, "Ignoring NAMESPACE_TTLS"),
            }
        }

        if let Some(max) = env_parse::<usize>("MAX_ENTRIES") {
            cache.max_entries = (max > 0).then_some(max);
        }

        if let Some(max) = env_parse::<usize>("MAX_BYTES") {
            cache.max_bytes = (max > 0).then_some(max);
        }

        Self {
            cache,
            sweep_interval: env_parse::<u64>("SWEEP_INTERVAL_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            server_port: env_parse("SERVER_PORT").unwrap_or(defaults.server_port),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheSettings::default(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            server_port: 3000,
        }
    }
}

/// Reads and parses an environment variable, warning on garbage.
fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = name, value = %raw, "Ignoring unparseable setting");
            None
        }
    }
}

/// Parses `ns=millis,ns=millis` into per-namespace lifetimes.
pub fn parse_namespace_ttls(raw: &str) -> Result<HashMap<String, Duration>> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (namespace, ms) = pair
                .split_once('=')
                .ok_or_else(|| CacheError::Config(format!("expected ns=millis, got '{pair}'")))?;
            let namespace = namespace.trim();
            if namespace.is_empty() {
                return Err(CacheError::Config(format!("empty namespace in '{pair}'")));
            }
            let ms: u64 = ms
                .trim()
                .parse()
                .map_err(|_| CacheError::Config(format!("invalid milliseconds in '{pair}'")))?;
            Ok((namespace.to_string(), Duration::from_millis(ms)))
        })
        .collect()
}
