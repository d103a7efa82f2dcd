//! Token issuance: role tokens and ad-hoc user tokens.
//!
//! Both paths resolve an effective TTL locally, then create one token
//! upstream under the shared config guard. The upstream token lives until
//! the resolved max TTL; the lease handed back carries the shorter default
//! TTL and can be renewed up to that max.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::Backend;
use super::lease::{LeaseInfo, LeaseInternal};
use crate::audit::{self, AuditEvent};
use crate::config::BackendConfig;
use crate::records::{AdminCredential, DEFAULT_GRANT_TYPE};
use crate::upstream::TokenSpec;
use crate::{Error, Result};

/// Scope of user tokens when the caller does not pick one.
pub const DEFAULT_USER_SCOPE: &str = "applied-permissions/user";

/// TTLs after applying template and backend limits, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveTtl {
    /// Lease TTL handed to the caller.
    pub ttl: u64,
    /// Ceiling for the lease, including renewals. 0 when unbounded.
    pub max_ttl: u64,
}

impl EffectiveTtl {
    /// Lifetime requested upstream.
    fn upstream_expires_in(self) -> Option<u64> {
        match (self.max_ttl, self.ttl) {
            (0, 0) => None,
            (0, ttl) => Some(ttl),
            (max, _) => Some(max),
        }
    }
}

/// Resolve the TTL of a new token.
///
/// The ceiling is the smaller of the template's and the backend's nonzero
/// maxima. The TTL is the request, else the template default, else the
/// backend default, clamped to the ceiling.
#[must_use]
pub fn resolve_ttl(
    requested: Option<u64>,
    template_default: u64,
    template_max: u64,
    settings: &BackendConfig,
) -> EffectiveTtl {
    let max_ttl = min_nonzero(template_max, settings.max_ttl.as_secs());
    let default_ttl = if template_default > 0 {
        template_default
    } else {
        settings.default_ttl.as_secs()
    };
    let mut ttl = requested.filter(|t| *t > 0).unwrap_or(default_ttl);
    if max_ttl > 0 {
        ttl = ttl.min(max_ttl);
    }
    EffectiveTtl { ttl, max_ttl }
}

pub(super) fn min_nonzero(a: u64, b: u64) -> u64 {
    match (a, b) {
        (0, b) => b,
        (a, 0) => a,
        (a, b) => a.min(b),
    }
}

/// Parameters of a `user_token/<username>` request. Unset fields fall back
/// to the user-token defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserTokenRequest {
    pub scope: Option<String>,
    pub audience: Option<String>,
    #[serde(default, deserialize_with = "crate::ttl::deserialize_opt")]
    pub ttl: Option<u64>,
    /// Can only lower the configured ceiling.
    #[serde(default, deserialize_with = "crate::ttl::deserialize_opt")]
    pub max_ttl: Option<u64>,
    pub description: Option<String>,
}

/// A freshly issued token and its lease.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_id: String,
    pub username: String,
    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub lease: LeaseInfo,
    /// Kept by the caller and handed back for renew and revoke.
    pub internal: LeaseInternal,
}

impl Backend {
    /// Issue a token from the named role.
    pub async fn issue_role_token(
        &self,
        role_name: &str,
        requested_ttl: Option<u64>,
    ) -> Result<IssuedToken> {
        let config = self.config.read().await;
        let credential = config.require_admin().await?;
        let role = self.get_role(role_name).await?;

        let ttl = resolve_ttl(requested_ttl, role.default_ttl, role.max_ttl, &self.settings);
        let username = if role.username.is_empty() {
            generated_username(role_name)
        } else {
            role.username
        };
        let spec = TokenSpec {
            grant_type: if role.grant_type.is_empty() {
                DEFAULT_GRANT_TYPE.to_string()
            } else {
                role.grant_type
            },
            username,
            scope: role.scope,
            audience: role.audience,
            expires_in: ttl.upstream_expires_in(),
            description: role.description,
            refreshable: false,
        };

        let issued = self.create(&credential, spec, ttl, Some(role_name)).await?;
        self.usage.report(&credential, "tokenCreate");
        Ok(issued)
    }

    /// Issue a token for `username` directly, outside any role.
    pub async fn issue_user_token(
        &self,
        username: &str,
        request: UserTokenRequest,
    ) -> Result<IssuedToken> {
        if username.trim().is_empty() {
            return Err(Error::InvalidRequest("username is required".to_string()));
        }

        let config = self.config.read().await;
        let credential = config.require_admin().await?;
        let defaults = config.user_token_defaults().await?;

        let template_max = min_nonzero(request.max_ttl.unwrap_or(0), defaults.max_ttl);
        let ttl = resolve_ttl(request.ttl, defaults.default_ttl, template_max, &self.settings);
        let spec = TokenSpec {
            grant_type: DEFAULT_GRANT_TYPE.to_string(),
            username: username.to_string(),
            scope: request
                .scope
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_USER_SCOPE.to_string()),
            audience: request.audience.unwrap_or(defaults.audience),
            expires_in: ttl.upstream_expires_in(),
            description: request.description.unwrap_or(defaults.default_description),
            refreshable: false,
        };

        let issued = self.create(&credential, spec, ttl, None).await?;
        self.usage.report(&credential, "userTokenCreate");
        Ok(issued)
    }

    async fn create(
        &self,
        credential: &AdminCredential,
        spec: TokenSpec,
        ttl: EffectiveTtl,
        role: Option<&str>,
    ) -> Result<IssuedToken> {
        self.service.check_version(credential).await?;
        let created = self.service.create_token(credential, &spec).await?;

        let scope = created.scope.unwrap_or(spec.scope);
        let issued_at = chrono::Utc::now().timestamp();
        let internal = LeaseInternal {
            access_token: created.access_token.clone(),
            token_id: created.token_id.clone(),
            role: role.map(str::to_string),
            username: spec.username.clone(),
            ttl: ttl.ttl,
            max_ttl: ttl.max_ttl,
            issued_at,
        };

        info!(
            token_id = %created.token_id,
            role = role.unwrap_or("-"),
            username = %spec.username,
            ttl = ttl.ttl,
            max_ttl = ttl.max_ttl,
            "Token issued"
        );
        audit::emit(&AuditEvent::issued(
            &created.token_id,
            role,
            &spec.username,
            &scope,
            ttl.ttl,
        ));

        Ok(IssuedToken {
            access_token: created.access_token,
            token_id: created.token_id,
            username: spec.username,
            scope,
            role: role.map(str::to_string),
            lease: LeaseInfo::new(ttl.ttl, ttl.max_ttl),
            internal,
        })
    }
}

/// Username for roles that do not name one: `v-<role>-<8 hex>`.
fn generated_username(role_name: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("v-{role_name}-{}", &id[..8])
}
