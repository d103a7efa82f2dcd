//! Lease reconciliation: revoke and renew issued tokens.
//!
//! Nothing about issued tokens is stored here. The caller keeps the
//! [`LeaseInternal`] handed out at issuance and passes it back.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::Backend;
use super::issue::{min_nonzero, resolve_ttl};
use crate::audit::{self, AuditEvent};
use crate::upstream::RevokeTarget;
use crate::{Error, Result};

/// Lease metadata returned with an issued token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseInfo {
    pub lease_id: String,
    /// Seconds until the lease expires.
    pub lease_duration: u64,
    /// Ceiling in seconds from issue time. 0 when unbounded.
    pub max_ttl: u64,
    pub renewable: bool,
}

impl LeaseInfo {
    pub(super) fn new(ttl: u64, max_ttl: u64) -> Self {
        Self {
            lease_id: uuid::Uuid::new_v4().to_string(),
            lease_duration: ttl,
            max_ttl,
            renewable: max_ttl == 0 || ttl < max_ttl,
        }
    }
}

/// What the caller keeps to revoke or renew a token later.
///
/// Only `access_token` or `token_id` is needed for revocation; the rest
/// feeds renewal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseInternal {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub token_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub username: String,
    /// Lease TTL granted at issue, in seconds.
    #[serde(default)]
    pub ttl: u64,
    /// Ceiling granted at issue, in seconds.
    #[serde(default)]
    pub max_ttl: u64,
    /// Unix seconds.
    #[serde(default)]
    pub issued_at: i64,
}

/// Result of a revocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationOutcome {
    Revoked,
    /// The token was already gone upstream.
    AlreadyGone,
}

/// Result of a renewal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LeaseRenewal {
    /// New lease TTL in seconds, counted from now.
    pub lease_duration: u64,
    /// Seconds left before the ceiling. 0 when unbounded.
    pub remaining_ttl: u64,
    pub renewable: bool,
}

impl Backend {
    /// Revoke an issued token. A token already gone upstream counts as
    /// revoked.
    pub async fn revoke_lease(&self, lease: &LeaseInternal) -> Result<RevocationOutcome> {
        if lease.access_token.is_empty() && lease.token_id.is_empty() {
            return Err(Error::InvalidRequest(
                "lease carries neither access_token nor token_id".to_string(),
            ));
        }

        let config = self.config.read().await;
        let credential = config.require_admin().await?;

        let mut target = RevokeTarget {
            access_token: lease.access_token.clone(),
            token_id: lease.token_id.clone(),
        };
        target.token_id = target.resolved_token_id()?;

        self.service.check_version(&credential).await?;
        match self.service.revoke_token(&credential, &target).await {
            Ok(()) => {
                info!(token_id = %target.token_id, "Token revoked");
                audit::emit(&AuditEvent::revoked(&target.token_id));
                Ok(RevocationOutcome::Revoked)
            }
            Err(Error::NotFound(_)) => {
                warn!(token_id = %target.token_id, "Token already gone upstream, nothing to revoke");
                audit::emit(&AuditEvent::revoke_skipped(&target.token_id));
                Ok(RevocationOutcome::AlreadyGone)
            }
            Err(e) => Err(e),
        }
    }

    /// Compute a renewed lease TTL.
    ///
    /// The ceiling is the one granted at issue, tightened by the role's (or
    /// user-token defaults') current max TTL, and counts from the original
    /// issue time. Renewal past it is refused. No upstream call is made: the
    /// upstream token already lives until the ceiling.
    pub async fn renew_lease(
        &self,
        lease: &LeaseInternal,
        increment: Option<u64>,
    ) -> Result<LeaseRenewal> {
        let config = self.config.read().await;
        config.require_admin().await?;

        let current_max = match &lease.role {
            Some(role_name) => {
                let role = self.get_role(role_name).await?;
                resolve_ttl(None, role.default_ttl, role.max_ttl, &self.settings).max_ttl
            }
            None => {
                let defaults = config.user_token_defaults().await?;
                resolve_ttl(None, defaults.default_ttl, defaults.max_ttl, &self.settings).max_ttl
            }
        };
        // Without a ceiling at issue, the upstream token expires with the first lease.
        let granted = if lease.max_ttl > 0 { lease.max_ttl } else { lease.ttl };
        let ceiling = min_nonzero(granted, current_max);

        let requested = increment
            .filter(|t| *t > 0)
            .or(Some(lease.ttl).filter(|t| *t > 0))
            .unwrap_or_else(|| self.settings.default_ttl.as_secs());
        if ceiling == 0 {
            return Ok(LeaseRenewal {
                lease_duration: requested,
                remaining_ttl: 0,
                renewable: true,
            });
        }

        let elapsed = u64::try_from(chrono::Utc::now().timestamp() - lease.issued_at).unwrap_or(0);
        if elapsed >= ceiling {
            return Err(Error::InvalidRequest(format!(
                "lease for token {} has reached its max TTL of {ceiling}s",
                lease.token_id
            )));
        }
        let remaining_ttl = ceiling - elapsed;
        let lease_duration = requested.min(remaining_ttl);

        info!(
            token_id = %lease.token_id,
            lease_duration,
            remaining_ttl,
            "Lease renewed"
        );
        Ok(LeaseRenewal {
            lease_duration,
            remaining_ttl,
            renewable: lease_duration < remaining_ttl,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::test_support;
    use crate::records::RoleTemplate;
    use crate::upstream::fake::Fault;

    async fn issued() -> (
        Backend,
        std::sync::Arc<crate::upstream::fake::FakeTokenService>,
        crate::backend::IssuedToken,
    ) {
        let (backend, fake, _) = test_support::configured().await;
        backend
            .put_role(
                "deployer",
                RoleTemplate {
                    username: "ci".to_string(),
                    scope: "applied-permissions/groups:deployers".to_string(),
                    default_ttl: 600,
                    max_ttl: 3600,
                    ..RoleTemplate::default()
                },
            )
            .await
            .unwrap();
        let token = backend.issue_role_token("deployer", None).await.unwrap();
        (backend, fake, token)
    }

    #[tokio::test]
    async fn revoke_removes_token_upstream() {
        // GIVEN: an issued token
        let (backend, fake, token) = issued().await;

        // WHEN: revoking its lease
        let outcome = backend.revoke_lease(&token.internal).await.unwrap();

        // THEN: upstream no longer has it
        assert_eq!(outcome, RevocationOutcome::Revoked);
        assert!(!fake.is_active(&token.token_id));
        assert_eq!(fake.revoked(), vec![token.token_id]);
    }

    #[tokio::test]
    async fn revoke_of_vanished_token_succeeds() {
        // GIVEN: token deleted out-of-band
        let (backend, fake, token) = issued().await;
        fake.drop_out_of_band(&token.token_id);

        // WHEN/THEN: revocation reports already gone, not an error
        let outcome = backend.revoke_lease(&token.internal).await.unwrap();
        assert_eq!(outcome, RevocationOutcome::AlreadyGone);
    }

    #[tokio::test]
    async fn revoke_recovers_token_id_from_bearer() {
        let (backend, fake, token) = issued().await;
        let lease = LeaseInternal {
            access_token: token.access_token.clone(),
            ..LeaseInternal::default()
        };

        backend.revoke_lease(&lease).await.unwrap();
        assert!(!fake.is_active(&token.token_id));
    }

    #[tokio::test]
    async fn revoke_transport_failure_surfaces() {
        let (backend, fake, token) = issued().await;
        fake.fail_next_revoke(Fault::Unreachable);

        let err = backend.revoke_lease(&token.internal).await.unwrap_err();
        assert!(matches!(err, Error::UpstreamUnreachable(_)));
        assert!(fake.is_active(&token.token_id));
    }

    #[tokio::test]
    async fn revoke_of_empty_lease_is_invalid() {
        let (backend, _, _) = issued().await;
        assert!(matches!(
            backend.revoke_lease(&LeaseInternal::default()).await,
            Err(Error::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn revoke_refuses_path_like_token_ids() {
        // GIVEN: lease data edited to point outside the token endpoint
        let (backend, fake, token) = issued().await;
        let lease = LeaseInternal {
            token_id: "../../artifactory/api/repositories/libs-release".to_string(),
            ..token.internal.clone()
        };

        // WHEN/THEN: refused as invalid, nothing revoked
        let err = backend.revoke_lease(&lease).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert!(fake.revoked().is_empty());
        assert!(fake.is_active(&token.token_id));
    }

    #[tokio::test]
    async fn renew_within_ceiling() {
        let (backend, _, token) = issued().await;
        assert!(token.lease.renewable);

        let renewal = backend.renew_lease(&token.internal, Some(1200)).await.unwrap();
        assert_eq!(renewal.lease_duration, 1200);
        assert!(renewal.renewable);
    }

    #[tokio::test]
    async fn renew_is_clamped_to_remaining_time() {
        // GIVEN: a lease issued 50 minutes ago under a 60 minute ceiling
        let (backend, _, token) = issued().await;
        let lease = LeaseInternal {
            issued_at: token.internal.issued_at - 3000,
            ..token.internal.clone()
        };

        // WHEN: asking for another 30 minutes
        let renewal = backend.renew_lease(&lease, Some(1800)).await.unwrap();

        // THEN: only the remaining ~10 minutes are granted
        assert!(renewal.lease_duration <= 600);
        assert!(renewal.lease_duration >= 590);
        assert!(!renewal.renewable);
    }

    #[tokio::test]
    async fn renew_past_ceiling_is_refused() {
        let (backend, _, token) = issued().await;
        let lease = LeaseInternal {
            issued_at: token.internal.issued_at - 3601,
            ..token.internal.clone()
        };

        let err = backend.renew_lease(&lease, None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn renew_honors_lowered_role_ceiling() {
        // GIVEN: role max lowered after issue
        let (backend, _, token) = issued().await;
        backend
            .put_role(
                "deployer",
                RoleTemplate {
                    username: "ci".to_string(),
                    scope: "applied-permissions/groups:deployers".to_string(),
                    max_ttl: 300,
                    ..RoleTemplate::default()
                },
            )
            .await
            .unwrap();

        // WHEN/THEN: renewal is capped by the new ceiling
        let renewal = backend.renew_lease(&token.internal, Some(1200)).await.unwrap();
        assert!(renewal.lease_duration <= 300);
    }

    #[tokio::test]
    async fn renew_after_role_deleted_fails() {
        let (backend, _, token) = issued().await;
        backend.delete_role("deployer").await.unwrap();

        assert!(matches!(
            backend.renew_lease(&token.internal, None).await,
            Err(Error::RoleNotFound(_))
        ));
    }
}
