//! Persisted records and their storage keys.
//!
//! Every record is stored as a single JSON value under one key, so a reader
//! never observes a partially written record.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Storage key of the admin credential.
pub const ADMIN_KEY: &str = "config/admin";
/// Storage key of the user-token defaults.
pub const USER_TOKEN_KEY: &str = "config/user_token";
/// Storage prefix of role templates.
pub const ROLE_PREFIX: &str = "roles/";

/// Default grant type sent to Artifactory when a role does not set one.
pub const DEFAULT_GRANT_TYPE: &str = "client_credentials";

/// The single privileged credential used to call the Artifactory Access API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCredential {
    /// Opaque bearer value.
    pub access_token: String,
    /// Base URL of the Artifactory instance (`https://host[:port]`).
    pub url: String,
    /// Skip TLS certificate verification for this instance.
    #[serde(default)]
    pub bypass_artifactory_tls_verification: bool,
    /// Do not report feature usage to Artifactory.
    #[serde(default)]
    pub disable_usage_telemetry: bool,
}

impl AdminCredential {
    /// SHA-256 fingerprint of the bearer value, safe to log and return.
    #[must_use]
    pub fn access_token_sha256(&self) -> String {
        fingerprint(&self.access_token)
    }

    /// Base URL without trailing slashes.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

/// Hex SHA-256 of a bearer value.
#[must_use]
pub fn fingerprint(bearer: &str) -> String {
    let hash = Sha256::digest(bearer.as_bytes());
    format!("{hash:x}")
}

/// Named template used to parametrize token issuance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleTemplate {
    /// Artifactory username the token is issued for.
    #[serde(default)]
    pub username: String,
    /// Artifactory scope string (for example `applied-permissions/groups:readers`).
    pub scope: String,
    /// Token audience.
    #[serde(default)]
    pub audience: String,
    /// Grant type forwarded to Artifactory.
    #[serde(default = "default_grant_type")]
    pub grant_type: String,
    /// Default TTL in seconds (0 = use backend default).
    #[serde(default, deserialize_with = "crate::ttl::deserialize")]
    pub default_ttl: u64,
    /// Maximum TTL in seconds (0 = use backend maximum).
    #[serde(default, deserialize_with = "crate::ttl::deserialize")]
    pub max_ttl: u64,
    /// Token description set in Artifactory.
    #[serde(default)]
    pub description: String,
}

fn default_grant_type() -> String {
    DEFAULT_GRANT_TYPE.to_string()
}

/// Storage key for a named role.
#[must_use]
pub fn role_key(name: &str) -> String {
    format!("{ROLE_PREFIX}{name}")
}

/// Defaults applied to `user_token/<username>` requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTokenDefaults {
    /// Token audience.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub audience: String,
    /// Default TTL in seconds (0 = use backend default).
    #[serde(default)]
    pub default_ttl: u64,
    /// Maximum TTL in seconds (0 = use backend maximum).
    #[serde(default)]
    pub max_ttl: u64,
    /// Token description set in Artifactory.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default_description: String,
}
