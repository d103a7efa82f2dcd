//! Admin credential rotation.
//!
//! The whole sequence runs under the exclusive config guard:
//!
//! ```text
//! Stable ──create──▶ Rotating ──persist──▶ Stable' ──revoke old──▶ Stable
//! ```
//!
//! `Rotating` is never persisted. Until the persist step succeeds the stored
//! credential is the previous one and still valid upstream; from then on the
//! replacement is authoritative and the previous one is cleanup only.

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::Backend;
use crate::audit::{self, AuditEvent};
use crate::records::{AdminCredential, DEFAULT_GRANT_TYPE};
use crate::upstream::{RevokeTarget, TokenSpec, introspect};
use crate::{Error, Result};

/// Description set on the replacement token when the caller gives none.
pub const DEFAULT_ROTATION_DESCRIPTION: &str =
    "Rotated Admin token for artifactory-secrets plugin in Vault";

/// Optional overrides for a rotation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RotateRequest {
    /// Username for the replacement token.
    pub username: Option<String>,
    /// Description for the replacement token.
    pub description: Option<String>,
}

/// What happened to the previous credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CleanupStatus {
    Revoked,
    /// Already gone upstream.
    AlreadyGone,
    /// Still active upstream; needs manual revocation.
    Failed { reason: String },
}

/// Result of a successful rotation.
#[derive(Debug, Clone, Serialize)]
pub struct RotationOutcome {
    pub token_id: String,
    pub previous_token_id: String,
    pub username: String,
    pub scope: String,
    pub cleanup: CleanupStatus,
}

impl RotationOutcome {
    /// Messages for the caller when cleanup left something behind.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        match &self.cleanup {
            CleanupStatus::Failed { reason } => vec![format!(
                "new admin token {} is already in effect, but revoking previous token {} failed: {reason}",
                self.token_id, self.previous_token_id
            )],
            CleanupStatus::Revoked | CleanupStatus::AlreadyGone => Vec::new(),
        }
    }
}

impl Backend {
    /// Replace the admin credential with a freshly minted one and revoke the
    /// previous token.
    ///
    /// Scope is copied from the current token. A failure before the persist
    /// step leaves the stored credential untouched. A persist failure leaves
    /// the new upstream token orphaned and is reported as
    /// [`Error::PersistenceFailed`]. A cleanup failure is not an error.
    pub async fn rotate(&self, request: RotateRequest) -> Result<RotationOutcome> {
        let mut config = self.config.write().await;
        let current = config.require_admin().await?;
        self.usage.report(&current, "configRotateWrite");

        let info = introspect(&current.access_token)?;
        // An override replaces the introspected name even when empty.
        let username = request
            .username
            .unwrap_or_else(|| info.username.clone());
        let username = if username.is_empty() {
            self.settings.fallback_username.clone()
        } else {
            username
        };
        let spec = TokenSpec {
            grant_type: DEFAULT_GRANT_TYPE.to_string(),
            username,
            scope: info.scope.clone(),
            description: request
                .description
                .unwrap_or_else(|| DEFAULT_ROTATION_DESCRIPTION.to_string()),
            refreshable: false,
            ..TokenSpec::default()
        };

        self.service.check_version(&current).await?;
        let created = self.service.create_token(&current, &spec).await?;

        let replacement = AdminCredential {
            access_token: created.access_token,
            ..current.clone()
        };
        if let Err(e) = config.store_admin(&replacement).await {
            error!(
                orphaned_token_id = %created.token_id,
                error = %e,
                "Replacement admin token created but not persisted; previous credential stays in effect"
            );
            audit::emit(&AuditEvent::orphaned(&created.token_id, e.to_string()));
            return Err(e);
        }

        info!(
            token_id = %created.token_id,
            previous_token_id = %info.token_id,
            username = %spec.username,
            "Admin credential rotated"
        );
        audit::emit(&AuditEvent::rotated(
            &created.token_id,
            &info.token_id,
            &spec.username,
            &spec.scope,
        ));

        let previous = RevokeTarget {
            access_token: current.access_token,
            token_id: info.token_id.clone(),
        };
        let cleanup = match self.service.revoke_token(&replacement, &previous).await {
            Ok(()) => CleanupStatus::Revoked,
            Err(Error::NotFound(_)) => {
                warn!(token_id = %info.token_id, "Previous admin token already gone upstream");
                CleanupStatus::AlreadyGone
            }
            Err(e) => {
                warn!(
                    token_id = %info.token_id,
                    error = %e,
                    "Previous admin token could not be revoked"
                );
                audit::emit(&AuditEvent::cleanup_failed(&info.token_id, e.to_string()));
                CleanupStatus::Failed {
                    reason: e.to_string(),
                }
            }
        };

        Ok(RotationOutcome {
            token_id: created.token_id,
            previous_token_id: info.token_id,
            username: spec.username,
            scope: spec.scope,
            cleanup,
        })
    }
}
