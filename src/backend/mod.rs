//! Credential lifecycle engine.
//!
//! [`Backend`] owns everything a request needs: the storage handle, the
//! upstream [`TokenService`], TTL limits, and the usage reporter. No state
//! lives outside it.
//!
//! # Locking
//!
//! The admin credential and user-token defaults are reachable only through a
//! [`ConfigHandle`] held inside one `tokio::sync::RwLock`:
//!
//! - read methods take `&self`, so a shared guard is enough (issuance,
//!   revocation, config reads run concurrently);
//! - write methods take `&mut self`, so only the exclusive guard can call
//!   them (config writes and rotation are serialized).
//!
//! Guards are released on drop, including when a request future is cancelled
//! mid-operation.
//!
//! Role templates live outside the lock: each role is one storage record and
//! is written whole.

pub mod admin;
pub mod issue;
pub mod lease;
pub mod roles;
pub mod rotate;
pub mod usage;
pub mod user_token;

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::BackendConfig;
use crate::records::{ADMIN_KEY, AdminCredential, USER_TOKEN_KEY, UserTokenDefaults};
use crate::storage::{self, Storage};
use crate::upstream::TokenService;
use crate::{Error, Result};

pub use admin::{AdminConfigUpdate, AdminConfigView};
pub use issue::{EffectiveTtl, IssuedToken, UserTokenRequest, resolve_ttl};
pub use lease::{LeaseInfo, LeaseInternal, LeaseRenewal, RevocationOutcome};
pub use rotate::{CleanupStatus, RotateRequest, RotationOutcome};
pub use usage::UsageReporter;
pub use user_token::{UserTokenConfigView, UserTokenDefaultsUpdate};

/// Access to the lock-protected configuration records.
pub struct ConfigHandle {
    storage: Arc<dyn Storage>,
}

impl ConfigHandle {
    /// The admin credential, if configured.
    pub async fn admin(&self) -> Result<Option<AdminCredential>> {
        storage::get_json(self.storage.as_ref(), ADMIN_KEY).await
    }

    /// The admin credential, or [`Error::NotConfigured`].
    pub async fn require_admin(&self) -> Result<AdminCredential> {
        self.admin().await?.ok_or(Error::NotConfigured)
    }

    /// User-token defaults; all-default when never written.
    pub async fn user_token_defaults(&self) -> Result<UserTokenDefaults> {
        Ok(storage::get_json(self.storage.as_ref(), USER_TOKEN_KEY)
            .await?
            .unwrap_or_default())
    }

    async fn store_admin(&mut self, credential: &AdminCredential) -> Result<()> {
        storage::put_json(self.storage.as_ref(), ADMIN_KEY, credential)
            .await
            .map_err(into_persistence)
    }

    async fn remove_admin(&mut self) -> Result<()> {
        self.storage
            .delete(ADMIN_KEY)
            .await
            .map_err(into_persistence)
    }

    async fn store_user_token_defaults(&mut self, defaults: &UserTokenDefaults) -> Result<()> {
        storage::put_json(self.storage.as_ref(), USER_TOKEN_KEY, defaults)
            .await
            .map_err(into_persistence)
    }
}

/// Storage write failures always surface as [`Error::PersistenceFailed`].
fn into_persistence(e: Error) -> Error {
    match e {
        Error::PersistenceFailed(_) => e,
        other => Error::PersistenceFailed(other.to_string()),
    }
}

/// The Artifactory secrets backend.
pub struct Backend {
    config: RwLock<ConfigHandle>,
    storage: Arc<dyn Storage>,
    service: Arc<dyn TokenService>,
    settings: BackendConfig,
    usage: UsageReporter,
}

impl Backend {
    /// Create a backend over `storage`, calling Artifactory through `service`.
    #[must_use]
    pub fn new(
        storage: Arc<dyn Storage>,
        service: Arc<dyn TokenService>,
        settings: BackendConfig,
    ) -> Self {
        Self {
            config: RwLock::new(ConfigHandle {
                storage: Arc::clone(&storage),
            }),
            storage,
            usage: UsageReporter::new(Arc::clone(&service)),
            service,
            settings,
        }
    }

    /// Backend-wide TTL limits and defaults.
    #[must_use]
    pub fn settings(&self) -> &BackendConfig {
        &self.settings
    }
}
