//! Configuration for FerroCache

use serde::Deserialize;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub metrics: MetricsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on
    pub listen_addr: String,

    /// Maximum number of concurrent connections
    pub max_connections: usize,

    /// Read buffer size per connection (bytes)
    pub read_buffer_size: usize,

    /// Write buffer size per connection (bytes)
    pub write_buffer_size: usize,

    /// Longest command line accepted before the buffer is discarded (bytes)
    pub max_line_length: usize,

    /// Number of Tokio worker threads (0 = number of CPUs)
    pub worker_threads: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: format!("{}:{}", crate::DEFAULT_HOST, crate::DEFAULT_PORT),
            max_connections: 10000,
            read_buffer_size: 8192,
            write_buffer_size: 8192,
            max_line_length: 64 * 1024,
            worker_threads: 0,
        }
    }
}

/// Cache engine and snapshot configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Snapshot file written by SAVE and read at startup
    pub snapshot_path: PathBuf,

    /// Seconds between background saves (0 = disabled)
    pub save_interval_secs: u64,

    /// Write a snapshot during graceful shutdown
    pub save_on_shutdown: bool,

    /// Longest the expiry sweeper sleeps between drains (milliseconds)
    pub sweep_fallback_ms: u64,

    /// Most keys held at once, evicting the least recently used (0 = unbounded)
    pub max_keys: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from(crate::DEFAULT_SNAPSHOT_FILE),
            save_interval_secs: 60,
            save_on_shutdown: true,
            sweep_fallback_ms: 1000,
            max_keys: 0,
        }
    }
}

impl StorageConfig {
    pub fn save_interval(&self) -> Option<Duration> {
        (self.save_interval_secs > 0).then(|| Duration::from_secs(self.save_interval_secs))
    }

    pub fn sweep_fallback(&self) -> Duration {
        Duration::from_millis(self.sweep_fallback_ms.max(1))
    }

    pub fn max_keys(&self) -> Option<NonZeroUsize> {
        NonZeroUsize::new(self.max_keys)
    }
}

/// Metrics and health check configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable metrics collection
    pub enabled: bool,

    /// Address for metrics/health HTTP server
    pub listen_addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: "127.0.0.1:9090".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| crate::CacheError::Config(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> crate::Result<Self> {
        toml::from_str(contents)
            .map_err(|e| crate::CacheError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from environment variables or use defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("FERROCACHE_LISTEN_ADDR") {
            config.server.listen_addr = addr;
        }

        if let Some(max_conn) = lookup("FERROCACHE_MAX_CONNECTIONS")
            && let Ok(n) = max_conn.parse()
        {
            config.server.max_connections = n;
        }

        if let Some(path) = lookup("FERROCACHE_SNAPSHOT_PATH") {
            config.storage.snapshot_path = PathBuf::from(path);
        }

        if let Some(interval) = lookup("FERROCACHE_SAVE_INTERVAL")
            && let Ok(secs) = interval.parse()
        {
            config.storage.save_interval_secs = secs;
        }

        if let Some(max_keys) = lookup("FERROCACHE_MAX_KEYS")
            && let Ok(n) = max_keys.parse()
        {
            config.storage.max_keys = n;
        }

        if let Some(addr) = lookup("FERROCACHE_METRICS_ADDR") {
            config.metrics.listen_addr = addr;
        }

        if let Some(enabled) = lookup("FERROCACHE_METRICS_ENABLED") {
            config.metrics.enabled = enabled.to_lowercase() == "true" || enabled == "1";
        }

        config
    }
}
