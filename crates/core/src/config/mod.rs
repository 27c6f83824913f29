//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SWCACHE_*)
//! 2. TOML config file (if SWCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::BucketNames;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SWCACHE_*)
/// 2. TOML config file (if SWCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Release version tag appended to bucket names.
    ///
    /// Set via SWCACHE_VERSION environment variable.
    #[serde(default = "default_version")]
    pub version: String,

    /// Purpose label of the application-shell bucket.
    #[serde(default = "default_static_label")]
    pub static_label: String,

    /// Purpose label of the runtime bucket.
    #[serde(default = "default_runtime_label")]
    pub runtime_label: String,

    /// Origin the application is served from; manifest paths resolve against it.
    ///
    /// Set via SWCACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Root-relative paths pre-cached at install time.
    #[serde(default = "default_app_shell")]
    pub app_shell: Vec<String>,

    /// Root-relative path served to navigations when the network is down.
    #[serde(default = "default_navigation_fallback")]
    pub navigation_fallback: String,

    /// Regular expressions (matched against the full URL) marking API requests.
    #[serde(default = "default_api_patterns")]
    pub api_patterns: Vec<String>,

    /// Path prefix marking same-shape API requests on any host.
    #[serde(default = "default_api_path_prefix")]
    pub api_path_prefix: String,

    /// Whether a freshly installed version asks to skip the waiting phase.
    #[serde(default = "default_true")]
    pub skip_waiting_on_install: bool,

    /// Whether an activated version takes control of already open clients.
    #[serde(default = "default_true")]
    pub claim_on_activate: bool,

    /// Upper bound on runtime bucket entries; oldest are trimmed first.
    #[serde(default = "default_runtime_max_entries")]
    pub runtime_max_entries: Option<usize>,

    /// Path to the SQLite bucket store.
    ///
    /// Set via SWCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Keep buckets in memory only; `db_path` is ignored.
    #[serde(default)]
    pub ephemeral: bool,

    /// User-Agent string for network requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum response body size in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Network request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_version() -> String {
    "v1".into()
}

fn default_static_label() -> String {
    "static".into()
}

fn default_runtime_label() -> String {
    "runtime".into()
}

fn default_origin() -> String {
    "http://localhost:3000".into()
}

fn default_app_shell() -> Vec<String> {
    ["/", "/index.html", "/manifest.json", "/static/js/bundle.js", "/static/css/main.css"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_navigation_fallback() -> String {
    "/index.html".into()
}

fn default_api_patterns() -> Vec<String> {
    vec![r"^https?://api\.".into(), r"^https?://cdn\.".into()]
}

fn default_api_path_prefix() -> String {
    "/api/".into()
}

fn default_runtime_max_entries() -> Option<usize> {
    Some(200)
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./swcache.sqlite")
}

fn default_user_agent() -> String {
    "swcache/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            static_label: default_static_label(),
            runtime_label: default_runtime_label(),
            origin: default_origin(),
            app_shell: default_app_shell(),
            navigation_fallback: default_navigation_fallback(),
            api_patterns: default_api_patterns(),
            api_path_prefix: default_api_path_prefix(),
            skip_waiting_on_install: true,
            claim_on_activate: true,
            runtime_max_entries: default_runtime_max_entries(),
            db_path: default_db_path(),
            ephemeral: false,
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

    /// Bucket names owned by the configured version.
    pub fn bucket_names(&self) -> BucketNames {
        BucketNames::new(&self.static_label, &self.runtime_label, &self.version)
    }

    /// The configured origin as a URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })
    }

    /// Resolve a root-relative path against the origin.
    pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
        self.origin_url()?
            .join(path)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: format!("{path}: {e}") })
    }

    /// A copy of this configuration for another release version.
    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self { version: version.into(), ..self.clone() }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SWCACHE_`
    /// 2. TOML file from `SWCACHE_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("SWCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SWCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
