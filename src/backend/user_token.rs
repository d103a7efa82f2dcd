//! Defaults for `user_token/<username>` issuance.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::Backend;
use crate::upstream::introspect;
use crate::{Error, Result};

/// Fields accepted by a user-token defaults write. Absent fields keep their
/// stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserTokenDefaultsUpdate {
    pub audience: Option<String>,
    #[serde(default, deserialize_with = "crate::ttl::deserialize_opt")]
    pub default_ttl: Option<u64>,
    #[serde(default, deserialize_with = "crate::ttl::deserialize_opt")]
    pub max_ttl: Option<u64>,
    pub default_description: Option<String>,
}

/// User-token defaults plus the admin token's claims when they parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserTokenConfigView {
    pub audience: String,
    pub default_ttl: u64,
    pub max_ttl: u64,
    pub default_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// `exp` as RFC 3339.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
}

impl Backend {
    /// Merge `update` into the stored defaults.
    ///
    /// Does not require an admin credential.
    pub async fn write_user_token_config(&self, update: UserTokenDefaultsUpdate) -> Result<()> {
        let mut config = self.config.write().await;
        if let Some(credential) = config.admin().await? {
            self.usage.report(&credential, "configUserTokenUpdate");
        }

        let mut defaults = config.user_token_defaults().await?;
        if let Some(audience) = update.audience {
            defaults.audience = audience;
        }
        if let Some(default_ttl) = update.default_ttl {
            defaults.default_ttl = default_ttl;
        }
        if let Some(max_ttl) = update.max_ttl {
            defaults.max_ttl = max_ttl;
        }
        if let Some(description) = update.default_description {
            defaults.default_description = description;
        }

        let backend_max = self.settings.max_ttl.as_secs();
        if defaults.max_ttl > 0 && backend_max > 0 && defaults.max_ttl > backend_max {
            return Err(Error::InvalidRequest(format!(
                "max_ttl {}s exceeds backend max_ttl {backend_max}s",
                defaults.max_ttl
            )));
        }
        if defaults.max_ttl > 0 && defaults.default_ttl > defaults.max_ttl {
            return Err(Error::InvalidRequest(format!(
                "default_ttl {}s exceeds max_ttl {}s",
                defaults.default_ttl, defaults.max_ttl
            )));
        }

        config.store_user_token_defaults(&defaults).await?;
        info!(
            default_ttl = defaults.default_ttl,
            max_ttl = defaults.max_ttl,
            "User token defaults updated"
        );
        Ok(())
    }

    /// Read the defaults. Requires an admin credential, whose claims are
    /// echoed when the bearer parses.
    pub async fn read_user_token_config(&self) -> Result<UserTokenConfigView> {
        let config = self.config.read().await;
        let credential = config.require_admin().await?;
        self.usage.report(&credential, "configUserTokenRead");
        let defaults = config.user_token_defaults().await?;

        let mut view = UserTokenConfigView {
            audience: defaults.audience,
            default_ttl: defaults.default_ttl,
            max_ttl: defaults.max_ttl,
            default_description: defaults.default_description,
            token_id: None,
            username: None,
            scope: None,
            exp: None,
            expires: None,
        };

        match introspect(&credential.access_token) {
            Ok(info) => {
                view.token_id = Some(info.token_id);
                view.username = Some(info.username);
                view.scope = Some(info.scope);
                if info.expires > 0 {
                    view.exp = Some(info.expires);
                    view.expires =
                        DateTime::from_timestamp(info.expires, 0).map(|t| t.to_rfc3339());
                }
            }
            Err(e) => warn!(error = %e, "Error parsing admin access token"),
        }
        Ok(view)
    }
}
