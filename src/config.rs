//! Configuration Module
//!
//! Cache configuration and server configuration, loaded from environment
//! variables with sensible defaults.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Construction-time parameters of a `CacheService`.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Hard cap on the number of entries held in memory (0 behaves as 1)
    pub max_memory_entries: usize,
    /// TTL applied when `set` is called without an explicit TTL
    pub default_ttl: Duration,
    /// TTL applied to priority entries
    pub priority_ttl: Duration,
    /// Format version; entries written under another version read as misses
    pub version: String,
    /// Namespace of this cache's keys in the durable backend
    pub storage_prefix: String,
    /// Period of the background cleanup task
    pub cleanup_interval: Duration,
    /// Keys checked when connectivity comes back
    pub critical_keys: Vec<String>,
}

impl CacheConfig {
    /// Loads the cache configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_MEMORY_ENTRIES` - Memory store capacity, at least 1 (default: 100)
    /// - `DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `PRIORITY_TTL` - Priority TTL in seconds (default: 86400)
    /// - `CACHE_VERSION` - Entry format version (default: "1.0")
    /// - `STORAGE_PREFIX` - Durable key prefix (default: "edu_cache")
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 60)
    /// - `CRITICAL_KEYS` - Comma separated critical keys (default: "translations")
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_memory_entries: env_or("MAX_MEMORY_ENTRIES", defaults.max_memory_entries).max(1),
            default_ttl: Duration::from_secs(env_or("DEFAULT_TTL", defaults.default_ttl.as_secs())),
            priority_ttl: Duration::from_secs(env_or(
                "PRIORITY_TTL",
                defaults.priority_ttl.as_secs(),
            )),
            version: env::var("CACHE_VERSION").unwrap_or(defaults.version),
            storage_prefix: env::var("STORAGE_PREFIX").unwrap_or(defaults.storage_prefix),
            cleanup_interval: Duration::from_secs(env_or(
                "CLEANUP_INTERVAL",
                defaults.cleanup_interval.as_secs(),
            )),
            critical_keys: env::var("CRITICAL_KEYS")
                .map(|v| parse_key_list(&v))
                .unwrap_or(defaults.critical_keys),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_memory_entries: 100,
            default_ttl: Duration::from_secs(5 * 60),
            priority_ttl: Duration::from_secs(24 * 60 * 60),
            version: "1.0".to_string(),
            storage_prefix: "edu_cache".to_string(),
            cleanup_interval: Duration::from_secs(60),
            critical_keys: vec!["translations".to_string()],
        }
    }
}

/// Server configuration parameters.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cache service parameters
    pub cache: CacheConfig,
    /// HTTP server port
    pub server_port: u16,
    /// Directory of the file-backed durable store
    pub storage_dir: PathBuf,
    /// Byte quota of the durable store
    pub storage_quota_bytes: usize,
    /// Address probed to detect connectivity; no probing when unset
    pub probe_addr: Option<String>,
    /// Connectivity probe period
    pub probe_interval: Duration,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// Everything read by [`CacheConfig::from_env`], plus:
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `STORAGE_DIR` - Durable store directory (default: ".cache-data")
    /// - `STORAGE_QUOTA_BYTES` - Durable store quota (default: 5 MiB)
    /// - `PROBE_ADDR` - host:port used for connectivity probing (default: unset)
    /// - `PROBE_INTERVAL` - Probe frequency in seconds (default: 10)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache: CacheConfig::from_env(),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            storage_dir: env::var("STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_dir),
            storage_quota_bytes: env_or("STORAGE_QUOTA_BYTES", defaults.storage_quota_bytes),
            probe_addr: env::var("PROBE_ADDR").ok().filter(|v| !v.is_empty()),
            probe_interval: Duration::from_secs(env_or(
                "PROBE_INTERVAL",
                defaults.probe_interval.as_secs(),
            )),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            server_port: 3000,
            storage_dir: PathBuf::from(".cache-data"),
            storage_quota_bytes: 5 * 1024 * 1024,
            probe_addr: None,
            probe_interval: Duration::from_secs(10),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_key_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_config_default() {
        let config = CacheConfig::default();
        assert_eq!(config.max_memory_entries, 100);
        assert_eq!(config.default_ttl, Duration::from_secs(300));
        assert_eq!(config.priority_ttl, Duration::from_secs(86_400));
        assert_eq!(config.version, "1.0");
        assert_eq!(config.storage_prefix, "edu_cache");
        assert_eq!(config.cleanup_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.storage_quota_bytes, 5 * 1024 * 1024);
        assert!(config.probe_addr.is_none());
    }

    #[test]
    fn test_parse_key_list() {
        assert_eq!(
            parse_key_list(" translations, regions ,,"),
            vec!["translations".to_string(), "regions".to_string()]
        );
        assert!(parse_key_list("").is_empty());
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        env::set_var("RESILIENT_CACHE_TEST_GARBAGE", "not-a-number");
        assert_eq!(env_or("RESILIENT_CACHE_TEST_GARBAGE", 7usize), 7);
        env::remove_var("RESILIENT_CACHE_TEST_GARBAGE");
    }
}
