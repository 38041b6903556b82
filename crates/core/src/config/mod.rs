//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (STORE_FINDER_*)
//! 2. TOML config file (if STORE_FINDER_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (STORE_FINDER_*)
/// 2. TOML config file (if STORE_FINDER_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Origin the agent is scoped to; only requests to this origin are intercepted.
    ///
    /// Set via STORE_FINDER_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Common prefix of both bucket names.
    ///
    /// Set via STORE_FINDER_CACHE_PREFIX environment variable.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Version tag baked into the precache bucket name.
    ///
    /// Set via STORE_FINDER_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Origin-relative paths stored in the precache bucket at install.
    #[serde(default = "default_precache_urls")]
    pub precache_urls: Vec<String>,

    /// Path prefix that marks API requests for background revalidation.
    ///
    /// Set via STORE_FINDER_API_PREFIX environment variable.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Path to SQLite cache database.
    ///
    /// Set via STORE_FINDER_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via STORE_FINDER_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via STORE_FINDER_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via STORE_FINDER_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_origin() -> String {
    "http://localhost:5000".into()
}

fn default_cache_prefix() -> String {
    "store-finder".into()
}

fn default_cache_version() -> String {
    "v1".into()
}

fn default_precache_urls() -> Vec<String> {
    ["/", "/manifest.json", "/icon-192.png", "/icon-512.png"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_api_prefix() -> String {
    "/api/".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./store-finder-cache.sqlite")
}

fn default_user_agent() -> String {
    "store-finder/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            cache_prefix: default_cache_prefix(),
            cache_version: default_cache_version(),
            precache_urls: default_precache_urls(),
            api_prefix: default_api_prefix(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Name of the current precache bucket, e.g. `store-finder-v1`.
    pub fn precache_name(&self) -> String {
        format!("{}-{}", self.cache_prefix, self.cache_version)
    }

    /// Name of the unversioned runtime bucket, e.g. `store-finder-runtime`.
    pub fn runtime_name(&self) -> String {
        format!("{}-runtime", self.cache_prefix)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `STORE_FINDER_`
    /// 2. TOML file from `STORE_FINDER_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("STORE_FINDER_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        Self::extract(figment.merge(Self::env()))
    }

    /// Load configuration from a TOML string layered over the defaults.
    ///
    /// Environment variables are not consulted.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Self::extract(Figment::from(Serialized::defaults(Self::default())).merge(Toml::string(toml)))
    }

    fn env() -> Env {
        Env::prefixed("STORE_FINDER_")
            .ignore(&["CONFIG_FILE"])
            .map(|key| key.as_str().to_lowercase().into())
            .split("__")
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.origin, "http://localhost:5000");
        assert_eq!(config.db_path, PathBuf::from("./store-finder-cache.sqlite"));
        assert_eq!(config.user_agent, "store-finder/0.1");
        assert_eq!(config.max_bytes, 5_242_880);
        assert_eq!(config.timeout_ms, 20_000);
        assert_eq!(config.api_prefix, "/api/");
        assert_eq!(config.precache_urls, vec!["/", "/manifest.json", "/icon-192.png", "/icon-512.png"]);
    }

    #[test]
    fn test_bucket_names() {
        let config = AppConfig::default();
        assert_eq!(config.precache_name(), "store-finder-v1");
        assert_eq!(config.runtime_name(), "store-finder-runtime");

        let config = AppConfig { cache_version: "v2".into(), ..Default::default() };
        assert_eq!(config.precache_name(), "store-finder-v2");
        assert_eq!(config.runtime_name(), "store-finder-runtime");
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_from_toml_str_overrides_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            origin = "https://shop.example"
            cache_version = "v7"
            precache_urls = ["/", "/offline.html"]
            "#,
        )
        .unwrap();

        assert_eq!(config.origin, "https://shop.example");
        assert_eq!(config.precache_name(), "store-finder-v7");
        assert_eq!(config.precache_urls, vec!["/", "/offline.html"]);
        assert_eq!(config.timeout_ms, 20_000);
    }

    #[test]
    fn test_from_toml_str_validates() {
        let result = AppConfig::from_toml_str("timeout_ms = 5");
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "timeout_ms"));
    }
}
