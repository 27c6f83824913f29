//! Request classification.
//!
//! Maps every intercepted request to exactly one route. Rules are checked
//! in a fixed order and the first match wins, so a `.js` file served from
//! an API host is still a static asset.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use swcache_core::{AppConfig, ConfigError, InterceptedRequest};

use crate::fetch::is_extension_scheme;

static STATIC_ASSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(js|css|png|jpg|jpeg|gif|svg|woff|woff2|ttf|eot|ico)$").expect("static asset pattern is valid")
});

/// Which strategy answers a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RequestClass {
    /// Cache-first from the static bucket.
    StaticAsset,
    /// Network-first with runtime bucket fallback.
    ApiCall,
    /// Network, then the cached app shell.
    Navigation,
    /// Stale-while-revalidate on the runtime bucket.
    Other,
}

/// Why a request is left to the network untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BypassReason {
    NonGet,
    ExtensionScheme,
    /// No active worker controls the requesting client.
    NoController,
}

/// Classification result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Bypass(BypassReason),
    Handle(RequestClass),
}

/// Request classifier built from configuration.
#[derive(Debug, Clone)]
pub struct Classifier {
    api_patterns: Vec<Regex>,
    api_path_prefix: String,
}

impl Classifier {
    pub fn new(api_patterns: &[String], api_path_prefix: impl Into<String>) -> Result<Self, ConfigError> {
        let api_patterns = api_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| ConfigError::Invalid { field: "api_patterns".into(), reason: format!("{p:?}: {e}") })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { api_patterns, api_path_prefix: api_path_prefix.into() })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Self::new(&config.api_patterns, config.api_path_prefix.clone())
    }

    /// Classify a request. Total: every request gets exactly one route.
    pub fn classify(&self, request: &InterceptedRequest) -> Route {
        if !request.is_get() {
            return Route::Bypass(BypassReason::NonGet);
        }
        if is_extension_scheme(request.url.scheme()) {
            return Route::Bypass(BypassReason::ExtensionScheme);
        }
        if STATIC_ASSET.is_match(request.url.path()) {
            return Route::Handle(RequestClass::StaticAsset);
        }
        if self.is_api(request) {
            return Route::Handle(RequestClass::ApiCall);
        }
        let accepts_html = request.accept.as_deref().is_some_and(|a| a.contains("text/html"));
        if request.is_navigation() || accepts_html {
            return Route::Handle(RequestClass::Navigation);
        }
        Route::Handle(RequestClass::Other)
    }

    fn is_api(&self, request: &InterceptedRequest) -> bool {
        let url = request.url.as_str();
        self.api_patterns.iter().any(|p| p.is_match(url))
            || (!self.api_path_prefix.is_empty() && request.url.path().starts_with(&self.api_path_prefix))
    }
}
