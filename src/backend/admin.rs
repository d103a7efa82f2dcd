//! Admin credential configuration: write, read, delete.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::Backend;
use crate::audit::{self, AuditEvent};
use crate::upstream::introspect;
use crate::{Error, Result};

/// Fields accepted by an admin config write. Absent fields keep their
/// stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminConfigUpdate {
    pub access_token: Option<String>,
    pub url: Option<String>,
    pub bypass_artifactory_tls_verification: Option<bool>,
    pub disable_usage_telemetry: Option<bool>,
}

/// Admin config as returned to callers. Never contains the bearer value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminConfigView {
    pub url: String,
    pub bypass_artifactory_tls_verification: bool,
    pub disable_usage_telemetry: bool,
    pub access_token_sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl Backend {
    /// Merge `update` into the stored credential, verify it upstream, and
    /// persist it.
    ///
    /// The credential must reach a supported Artifactory before it is
    /// stored, so a typo in the URL or token never replaces a working one.
    pub async fn write_admin(&self, update: AdminConfigUpdate) -> Result<()> {
        let mut config = self.config.write().await;
        let mut credential = config.admin().await?.unwrap_or_default();

        if let Some(access_token) = update.access_token {
            credential.access_token = access_token;
        }
        if let Some(url) = update.url {
            credential.url = url;
        }
        if let Some(bypass) = update.bypass_artifactory_tls_verification {
            credential.bypass_artifactory_tls_verification = bypass;
        }
        if let Some(disable) = update.disable_usage_telemetry {
            credential.disable_usage_telemetry = disable;
        }

        if credential.access_token.is_empty() {
            return Err(Error::InvalidRequest("access_token is required".to_string()));
        }
        validate_url(&credential.url)?;

        let version = self.service.check_version(&credential).await?;
        config.store_admin(&credential).await?;

        info!(
            url = %credential.base_url(),
            version = %version.version,
            "Admin credential configured"
        );
        audit::emit(&AuditEvent::configured(credential.access_token_sha256()));
        self.usage.report(&credential, "configAdminWrite");
        Ok(())
    }

    /// Read the admin config, with token claims when the bearer parses.
    pub async fn read_admin(&self) -> Result<AdminConfigView> {
        let config = self.config.read().await;
        let credential = config.require_admin().await?;

        let mut view = AdminConfigView {
            url: credential.url.clone(),
            bypass_artifactory_tls_verification: credential.bypass_artifactory_tls_verification,
            disable_usage_telemetry: credential.disable_usage_telemetry,
            access_token_sha256: credential.access_token_sha256(),
            token_id: None,
            username: None,
            scope: None,
        };
        match introspect(&credential.access_token) {
            Ok(info) => {
                view.token_id = Some(info.token_id);
                view.username = Some(info.username);
                view.scope = Some(info.scope);
            }
            Err(e) => warn!(error = %e, "Admin access token is not introspectable"),
        }
        Ok(view)
    }

    /// Remove the admin credential. Issued tokens are untouched.
    pub async fn delete_admin(&self) -> Result<()> {
        let mut config = self.config.write().await;
        config.remove_admin().await?;
        info!("Admin credential removed");
        audit::emit(&AuditEvent::removed());
        Ok(())
    }
}

fn validate_url(raw: &str) -> Result<()> {
    if raw.is_empty() {
        return Err(Error::InvalidRequest("url is required".to_string()));
    }
    let parsed = url::Url::parse(raw)
        .map_err(|e| Error::InvalidRequest(format!("invalid url '{raw}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host().is_some() => Ok(()),
        _ => Err(Error::InvalidRequest(format!(
            "url must be http(s) with a host, got '{raw}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::test_support::{self, ADMIN_SCOPE};
    use crate::records::AdminCredential;
    use crate::storage::{MemoryStorage, Storage};
    use crate::upstream::fake::{Fault, FakeTokenService};

    fn fresh() -> (Backend, Arc<FakeTokenService>, Arc<dyn Storage>) {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let fake = Arc::new(FakeTokenService::new());
        let backend = Backend::new(Arc::clone(&storage), fake.clone(), test_support::settings());
        (backend, fake, storage)
    }

    #[tokio::test]
    async fn write_then_read_hides_bearer() {
        // GIVEN: an unconfigured backend and a live admin token
        let (backend, fake, _) = fresh();
        let bearer = fake.seed("admin", ADMIN_SCOPE);

        // WHEN: configuring it
        backend
            .write_admin(AdminConfigUpdate {
                access_token: Some(bearer.clone()),
                url: Some("https://art.example.com".to_string()),
                ..AdminConfigUpdate::default()
            })
            .await
            .unwrap();

        // THEN: the read view carries the fingerprint and claims, not the bearer
        let view = backend.read_admin().await.unwrap();
        assert_eq!(view.url, "https://art.example.com");
        assert_eq!(view.access_token_sha256, crate::records::fingerprint(&bearer));
        assert_eq!(view.username.as_deref(), Some("admin"));
        assert_eq!(view.scope.as_deref(), Some(ADMIN_SCOPE));
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains(&bearer));
    }

    #[tokio::test]
    async fn partial_update_keeps_other_fields() {
        let (backend, _, storage) = test_support::configured().await;
        let before = test_support::stored_admin(&storage).await.unwrap();

        backend
            .write_admin(AdminConfigUpdate {
                bypass_artifactory_tls_verification: Some(true),
                ..AdminConfigUpdate::default()
            })
            .await
            .unwrap();

        let after = test_support::stored_admin(&storage).await.unwrap();
        assert!(after.bypass_artifactory_tls_verification);
        assert_eq!(after.access_token, before.access_token);
        assert_eq!(after.url, before.url);
    }

    #[tokio::test]
    async fn failed_version_check_persists_nothing() {
        // GIVEN: upstream that rejects the version check
        let (backend, fake, storage) = fresh();
        let bearer = fake.seed("admin", ADMIN_SCOPE);
        fake.fail_next_version_check(Fault::Unreachable);

        // WHEN: configuring
        let err = backend
            .write_admin(AdminConfigUpdate {
                access_token: Some(bearer),
                url: Some("https://art.example.com".to_string()),
                ..AdminConfigUpdate::default()
            })
            .await
            .unwrap_err();

        // THEN: error surfaces and nothing was stored
        assert!(matches!(err, Error::UpstreamUnreachable(_)));
        assert!(test_support::stored_admin(&storage).await.is_none());
    }

    #[tokio::test]
    async fn old_upstream_is_unsupported() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let fake = Arc::new(FakeTokenService::with_version("7.19.10"));
        let backend = Backend::new(storage, fake.clone(), test_support::settings());
        let bearer = fake.seed("admin", ADMIN_SCOPE);

        let err = backend
            .write_admin(AdminConfigUpdate {
                access_token: Some(bearer),
                url: Some("https://art.example.com".to_string()),
                ..AdminConfigUpdate::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Unsupported { .. }));
    }

    #[tokio::test]
    async fn missing_fields_are_invalid() {
        let (backend, _, _) = fresh();
        let err = backend
            .write_admin(AdminConfigUpdate {
                url: Some("https://art.example.com".to_string()),
                ..AdminConfigUpdate::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));

        let err = backend
            .write_admin(AdminConfigUpdate {
                access_token: Some("x.y.z".to_string()),
                url: Some("ftp://art.example.com".to_string()),
                ..AdminConfigUpdate::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn read_unconfigured_is_not_configured() {
        let (backend, _, _) = fresh();
        assert!(matches!(
            backend.read_admin().await,
            Err(Error::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn read_with_opaque_token_omits_claims() {
        // GIVEN: a stored credential whose bearer is not JWT-shaped
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        crate::storage::put_json(
            storage.as_ref(),
            crate::records::ADMIN_KEY,
            &AdminCredential {
                access_token: "opaque-reference-token".to_string(),
                url: "https://art.example.com".to_string(),
                ..AdminCredential::default()
            },
        )
        .await
        .unwrap();
        let backend = Backend::new(
            storage,
            Arc::new(FakeTokenService::new()),
            test_support::settings(),
        );

        // WHEN/THEN: read still succeeds without claim fields
        let view = backend.read_admin().await.unwrap();
        assert!(view.token_id.is_none());
        assert!(view.scope.is_none());
    }

    #[tokio::test]
    async fn delete_removes_credential() {
        let (backend, _, storage) = test_support::configured().await;
        backend.delete_admin().await.unwrap();
        assert!(test_support::stored_admin(&storage).await.is_none());
        assert!(matches!(
            backend.read_admin().await,
            Err(Error::NotConfigured)
        ));
    }
}
