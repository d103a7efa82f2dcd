//! Audit logging for token and credential lifecycle events.
//!
//! Every event is emitted via `tracing::info!` (or `warn!` for degraded
//! outcomes) with the serialized event in the `audit` field, making the trail
//! queryable by any log aggregator.
//!
//! Bearer values never appear in events; only upstream token ids and, for the
//! admin credential, SHA-256 fingerprints.
//!
//! # Events
//!
//! | Event | When |
//! |-------|------|
//! | `token.issued` | A scoped token was created upstream for a caller |
//! | `token.revoked` | An issued token was revoked upstream |
//! | `token.revoke_skipped` | Revocation found the token already gone |
//! | `credential.configured` | The admin credential was written |
//! | `credential.removed` | The admin credential was deleted |
//! | `credential.rotated` | A replacement admin credential is persisted and authoritative |
//! | `credential.cleanup_failed` | The previous admin credential could not be revoked |
//! | `credential.orphaned` | A replacement was created upstream but could not be persisted |

use serde::Serialize;

/// Structured audit event.
#[derive(Debug, Serialize)]
pub struct AuditEvent {
    /// Event type string (e.g., `"token.issued"`).
    pub event: &'static str,
    /// Upstream token id of the affected token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    /// Role the token was issued under.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Artifactory username on the token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Scope on the token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Lease TTL in seconds (for `token.issued`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
    /// Token id of the credential being replaced (rotation events).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_token_id: Option<String>,
    /// Fingerprint of the admin credential.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_sha256: Option<String>,
    /// Human-readable reason for degraded outcomes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuditEvent {
    fn new(event: &'static str) -> Self {
        Self {
            event,
            token_id: None,
            role: None,
            username: None,
            scope: None,
            ttl_secs: None,
            previous_token_id: None,
            credential_sha256: None,
            reason: None,
        }
    }

    /// Construct a `token.issued` event.
    #[must_use]
    pub fn issued(
        token_id: &str,
        role: Option<&str>,
        username: &str,
        scope: &str,
        ttl_secs: u64,
    ) -> Self {
        Self {
            token_id: Some(token_id.to_string()),
            role: role.map(str::to_string),
            username: Some(username.to_string()),
            scope: Some(scope.to_string()),
            ttl_secs: Some(ttl_secs),
            ..Self::new("token.issued")
        }
    }

    /// Construct a `token.revoked` event.
    #[must_use]
    pub fn revoked(token_id: &str) -> Self {
        Self {
            token_id: Some(token_id.to_string()),
            ..Self::new("token.revoked")
        }
    }

    /// Construct a `token.revoke_skipped` event (target already gone).
    #[must_use]
    pub fn revoke_skipped(token_id: &str) -> Self {
        Self {
            token_id: Some(token_id.to_string()),
            reason: Some("token not found upstream".to_string()),
            ..Self::new("token.revoke_skipped")
        }
    }

    /// Construct a `credential.configured` event.
    #[must_use]
    pub fn configured(credential_sha256: String) -> Self {
        Self {
            credential_sha256: Some(credential_sha256),
            ..Self::new("credential.configured")
        }
    }

    /// Construct a `credential.removed` event.
    #[must_use]
    pub fn removed() -> Self {
        Self::new("credential.removed")
    }

    /// Construct a `credential.rotated` event.
    #[must_use]
    pub fn rotated(token_id: &str, previous_token_id: &str, username: &str, scope: &str) -> Self {
        Self {
            token_id: Some(token_id.to_string()),
            previous_token_id: Some(previous_token_id.to_string()),
            username: Some(username.to_string()),
            scope: Some(scope.to_string()),
            ..Self::new("credential.rotated")
        }
    }

    /// Construct a `credential.cleanup_failed` event.
    #[must_use]
    pub fn cleanup_failed(previous_token_id: &str, reason: impl Into<String>) -> Self {
        Self {
            previous_token_id: Some(previous_token_id.to_string()),
            reason: Some(reason.into()),
            ..Self::new("credential.cleanup_failed")
        }
    }

    /// Construct a `credential.orphaned` event.
    #[must_use]
    pub fn orphaned(token_id: &str, reason: impl Into<String>) -> Self {
        Self {
            token_id: Some(token_id.to_string()),
            reason: Some(reason.into()),
            ..Self::new("credential.orphaned")
        }
    }

    /// `true` for events that need operator follow-up.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(self.event, "credential.cleanup_failed" | "credential.orphaned")
    }
}

/// Emit an audit event via `tracing` with the JSON blob in the `audit` field.
///
/// ```text
/// INFO audit: audit={"event":"credential.rotated","token_id":...}
/// ```
pub fn emit(event: &AuditEvent) {
    match serde_json::to_string(event) {
        Ok(ref json) if event.is_degraded() => tracing::warn!(target: "audit", audit = %json, "lifecycle audit"),
        Ok(ref json) => tracing::info!(target: "audit", audit = %json, "lifecycle audit"),
        Err(ref e) => tracing::warn!(error = %e, "Failed to serialize audit event"),
    }
}
