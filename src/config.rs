//! Configuration file parser for ~/.config/formdesk/config.toml.
//!
//! The config file is optional. A missing or blank file yields
//! `Config::default()`; unknown keys are accepted but logged so typos show up
//! with `RUST_LOG=warn`.
use crate::api::ApiSettings;
use crate::catalog::CatalogEndpoints;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Overrides `api_url`.
pub const API_URL_ENV: &str = "FORMDESK_API_URL";
/// Overrides both the token file and `api_token`.
pub const API_TOKEN_ENV: &str = "FORMDESK_API_TOKEN";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration. Any subset of keys may be given.
///
/// `Debug` masks `api_token`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the admin API. Plain HTTP is only accepted for localhost.
    pub api_url: String,

    /// Bearer token used when no token file exists.
    pub api_token: Option<String>,

    /// Path on the API host where expired sessions are sent to log in again.
    pub login_path: String,

    /// Per-request timeout. Must be at least 1.
    pub request_timeout_secs: u64,

    pub endpoints: Endpoints,
}

/// API paths. `packages` takes an `{id}` placeholder for the product id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub products: String,
    pub packages: String,
    pub plans: String,
    pub enquiries: String,
    pub clients: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080".to_string(),
            api_token: None,
            login_path: "/login".to_string(),
            request_timeout_secs: 20,
            endpoints: Endpoints::default(),
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        let catalog = CatalogEndpoints::default();
        Self {
            products: catalog.products,
            packages: catalog.packages,
            plans: catalog.plans,
            enquiries: "/enquiry".to_string(),
            clients: "/client".to_string(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_url", &self.api_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("login_path", &self.login_path)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 5] = [
        "api_url",
        "api_token",
        "login_path",
        "request_timeout_secs",
        "endpoints",
    ];

    const KNOWN_ENDPOINT_KEYS: [&'static str; 5] =
        ["products", "packages", "plans", "enquiries", "clients"];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML or wrong types → `Err(ConfigError::Parse)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            warn_unknown_keys(&raw);
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), api_url = %config.api_url, "Loaded configuration");
        Ok(config)
    }

    /// Apply `FORMDESK_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`. Blank values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = non_blank(API_URL_ENV) {
            tracing::debug!(api_url = %url, "Using API URL from environment");
            self.api_url = url;
        }
        if let Some(token) = non_blank(API_TOKEN_ENV) {
            tracing::debug!("Using API token from environment");
            self.api_token = Some(token);
        }
        self
    }

    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            base_url: self.api_url.clone(),
            login_path: self.login_path.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
        }
    }

    pub fn catalog_endpoints(&self) -> CatalogEndpoints {
        CatalogEndpoints {
            products: self.endpoints.products.clone(),
            packages: self.endpoints.packages.clone(),
            plans: self.endpoints.plans.clone(),
        }
    }

    pub fn api_token(&self) -> Option<SecretString> {
        self.api_token.clone().map(SecretString::from)
    }
}

fn warn_unknown_keys(raw: &toml::Table) {
    for (key, value) in raw {
        if !Config::KNOWN_KEYS.contains(&key.as_str()) {
            tracing::warn!(key = %key, "Unknown key in config file, ignoring");
            continue;
        }
        if key == "endpoints" {
            if let Some(table) = value.as_table() {
                for endpoint in table.keys() {
                    if !Config::KNOWN_ENDPOINT_KEYS.contains(&endpoint.as_str()) {
                        tracing::warn!(key = %endpoint, "Unknown endpoint in config file, ignoring");
                    }
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
