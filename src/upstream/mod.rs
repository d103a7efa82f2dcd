//! Artifactory Access API client.
//!
//! The [`TokenService`] trait is the seam between the lifecycle engine and
//! the network. [`ArtifactoryClient`] is the production implementation; tests
//! substitute an in-memory fake.
//!
//! All calls are single-attempt. Retry policy belongs to the caller.

pub mod claims;
pub mod client;
#[cfg(test)]
pub mod fake;
pub mod version;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};
use crate::records::AdminCredential;

pub use claims::{TokenInfo, introspect};
pub use client::ArtifactoryClient;
pub use version::{MIN_SCOPED_TOKEN_VERSION, ServiceVersion, Version};

/// Parameters of a token-create request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TokenSpec {
    /// Grant type (`client_credentials`).
    pub grant_type: String,
    /// Username the token is issued for.
    pub username: String,
    /// Scope string.
    pub scope: String,
    /// Audience; omitted when empty.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub audience: String,
    /// Lifetime in seconds; omitted to use the upstream default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    /// Description shown in the Artifactory UI; omitted when empty.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Issued tokens are never refreshable; renewal goes through the lease.
    pub refreshable: bool,
}

/// Body of a successful token-create response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedToken {
    /// Upstream token id.
    pub token_id: String,
    /// Bearer value.
    pub access_token: String,
    /// Lifetime granted upstream, in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Scope granted upstream.
    #[serde(default)]
    pub scope: Option<String>,
}

/// The minimum an issued token needs for later revocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokeTarget {
    /// Bearer value.
    pub access_token: String,
    /// Upstream token id; recovered by introspection when empty.
    #[serde(default)]
    pub token_id: String,
}

impl RevokeTarget {
    /// Resolve the token id, introspecting the bearer value if needed.
    ///
    /// The id ends up as a URL path segment, so anything other than a plain
    /// identifier is refused.
    pub fn resolved_token_id(&self) -> Result<String> {
        let token_id = if self.token_id.is_empty() {
            introspect(&self.access_token)?.token_id
        } else {
            self.token_id.clone()
        };
        validate_token_id(&token_id)?;
        Ok(token_id)
    }
}

/// Token ids are ASCII alphanumerics plus `-`, `_`, `.` and `:`, and never
/// a bare dot segment.
pub fn validate_token_id(token_id: &str) -> Result<()> {
    let plain = token_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'));
    if token_id.is_empty() || !plain || token_id == "." || token_id == ".." {
        return Err(Error::InvalidRequest(format!(
            "invalid token id {token_id:?}"
        )));
    }
    Ok(())
}

/// Operations the lifecycle engine needs from Artifactory.
///
/// Implementations must be `Send + Sync` because one instance is shared by
/// all concurrent requests.
#[async_trait::async_trait]
pub trait TokenService: Send + Sync + 'static {
    /// Check the upstream version supports scoped tokens.
    ///
    /// Must precede every mutating call: older releases use an incompatible
    /// grant model.
    async fn check_version(&self, credential: &AdminCredential) -> Result<ServiceVersion>;

    /// Create a token. Upstream records a new active token; nothing local
    /// changes.
    async fn create_token(&self, credential: &AdminCredential, spec: &TokenSpec)
    -> Result<CreatedToken>;

    /// Revoke a token. A token that is already gone yields
    /// [`Error::NotFound`](crate::Error::NotFound).
    async fn revoke_token(&self, credential: &AdminCredential, target: &RevokeTarget)
    -> Result<()>;

    /// Report use of a feature. Callers ignore the result.
    async fn send_usage(&self, credential: &AdminCredential, feature: &str) -> Result<()>;
}
