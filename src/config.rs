//! Configuration management

use std::{env, path::Path, path::PathBuf, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before resolving `env:` references.
    /// Paths support ~ expansion. Loaded in order, later files override earlier.
    #[serde(default)]
    pub env_files: Vec<String>,
    /// HTTP server configuration
    pub server: ServerConfig,
    /// API authentication
    pub api: ApiConfig,
    /// Token lifecycle limits
    pub backend: BackendConfig,
    /// Artifactory client settings
    pub upstream: UpstreamConfig,
    /// Record storage
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist, cannot be parsed,
    /// or holds inconsistent limits.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        // Load from file if provided
        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // Merge environment variables (ARTIFACTORY_SECRETS_ prefix)
        figment = figment.merge(Env::prefixed("ARTIFACTORY_SECRETS_").split("__"));

        Self::extract(&figment)
    }

    fn extract(figment: &Figment) -> Result<Self> {
        let config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        // Load env files into process environment (before env: resolution)
        config.load_env_files();
        config.validate()?;

        Ok(config)
    }

    /// Load environment files into the process environment.
    /// Supports ~ expansion. Files that don't exist are silently skipped.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let expanded = expand_home(path_str);
            let path = Path::new(&expanded);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => {
                        tracing::info!("Loaded env file: {expanded}");
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load env file {expanded}: {e}");
                    }
                }
            } else {
                tracing::debug!("Env file not found (skipped): {expanded}");
            }
        }
    }

    fn validate(&self) -> Result<()> {
        let BackendConfig {
            default_ttl,
            max_ttl,
            ..
        } = &self.backend;
        if !max_ttl.is_zero() && default_ttl > max_ttl {
            return Err(Error::Config(format!(
                "backend.default_ttl ({}s) exceeds backend.max_ttl ({}s)",
                default_ttl.as_secs(),
                max_ttl.as_secs()
            )));
        }
        if self.backend.fallback_username.trim().is_empty() {
            return Err(Error::Config(
                "backend.fallback_username must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn expand_home(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.display().to_string(), 1);
        }
    }
    path.to_string()
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Graceful shutdown timeout
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
    /// Maximum request body size (bytes)
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8250,
            request_timeout: Duration::from_secs(60),
            shutdown_timeout: Duration::from_secs(30),
            max_body_size: 64 * 1024,
        }
    }
}

/// Authentication for the `/v1` API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Bearer token callers must present.
    /// Supports: literal value, `env:VAR_NAME`, or `auto` (generates random token)
    pub bearer_token: Option<String>,
}

impl ApiConfig {
    /// Resolve the bearer token (expand env vars, generate if `auto`)
    #[must_use]
    pub fn resolve_bearer_token(&self) -> Option<String> {
        self.bearer_token.as_ref().map(|token| {
            if token == "auto" {
                let random_bytes: [u8; 32] = rand::random();
                format!(
                    "afs_{}",
                    base64::Engine::encode(
                        &base64::engine::general_purpose::URL_SAFE_NO_PAD,
                        random_bytes
                    )
                )
            } else if let Some(var_name) = token.strip_prefix("env:") {
                env::var(var_name).unwrap_or_else(|_| token.clone())
            } else {
                token.clone()
            }
        })
    }
}

/// Token lifecycle limits applied on top of role and user-token settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Lease TTL when neither request nor template sets one
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,
    /// Hard ceiling on any lease (0 = unbounded)
    #[serde(with = "humantime_serde")]
    pub max_ttl: Duration,
    /// Username for a rotated admin token whose claims carry none
    pub fallback_username: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(60 * 60),
            max_ttl: Duration::from_secs(24 * 60 * 60),
            fallback_username: "admin-vault-secrets-artifactory".to_string(),
        }
    }
}

/// Artifactory client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// `User-Agent` header sent upstream
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: concat!("artifactory-secrets/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Where backend records live
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// In-process map, lost on restart
    Memory,
    /// One JSON file per record
    #[default]
    File,
}

/// Record storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage backend
    pub kind: StorageKind,
    /// Directory for `file` storage (default: `~/.artifactory-secrets`)
    pub path: Option<String>,
}

impl StorageConfig {
    /// Directory for file storage with ~ expanded, if configured.
    #[must_use]
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path.as_deref().map(|p| PathBuf::from(expand_home(p)))
    }
}

/// Custom humantime serde module for Duration
pub mod humantime_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    /// Serialize Duration to human-readable string (e.g., "30s")
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the serializer fails.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Secs(u64),
        Text(String),
    }

    /// Deserialize a duration from whole seconds or a string like "30s", "5m", "1h", "100ms"
    ///
    /// # Errors
    ///
    /// Returns a deserialization error if the value cannot be parsed as a duration.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Secs(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(s) => parse(&s).map_err(serde::de::Error::custom),
        }
    }

    /// Parse "30s", "5m", "1h", "7d", "100ms", or bare seconds.
    ///
    /// # Errors
    ///
    /// Returns a message naming the value when it cannot be parsed.
    pub fn parse(s: &str) -> Result<Duration, String> {
        let s = s.trim();

        if let Some(ms) = s.strip_suffix("ms") {
            return whole(s, ms).map(Duration::from_millis);
        }
        let (digits, unit_secs) = if let Some(secs) = s.strip_suffix('s') {
            (secs, 1)
        } else if let Some(mins) = s.strip_suffix('m') {
            (mins, 60)
        } else if let Some(hours) = s.strip_suffix('h') {
            (hours, 60 * 60)
        } else if let Some(days) = s.strip_suffix('d') {
            (days, 24 * 60 * 60)
        } else {
            // Assume seconds
            (s, 1)
        };

        whole(s, digits)?
            .checked_mul(unit_secs)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("invalid duration '{s}': out of range"))
    }

    fn whole(s: &str, digits: &str) -> Result<u64, String> {
        digits
            .trim()
            .parse::<u64>()
            .map_err(|e| format!("invalid duration '{s}': {e}"))
    }
}
