//! Artifactory HTTP client
//!
//! Talks to two Artifactory surfaces:
//!
//! | Call | Endpoint |
//! |------|----------|
//! | version check | `GET {url}/artifactory/api/system/version` |
//! | usage report | `POST {url}/artifactory/api/system/usage` |
//! | create token | `POST {url}/access/api/v1/tokens` |
//! | revoke token | `DELETE {url}/access/api/v1/tokens/{token_id}` |

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use super::{CreatedToken, RevokeTarget, ServiceVersion, TokenService, TokenSpec};
use crate::records::AdminCredential;
use crate::{Error, Result};

/// Product id reported with usage telemetry.
const PRODUCT_ID: &str = concat!("artifactory-secrets/", env!("CARGO_PKG_VERSION"));

/// Artifactory client with one connection pool per TLS policy.
pub struct ArtifactoryClient {
    /// Verifies upstream certificates
    verified: Client,
    /// Used when the credential sets `bypass_artifactory_tls_verification`
    unverified: Client,
}

impl ArtifactoryClient {
    /// Build a client with the given request timeout and user agent.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let build = |insecure: bool| {
            Client::builder()
                .timeout(timeout)
                .user_agent(user_agent.to_string())
                .danger_accept_invalid_certs(insecure)
                .build()
                .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))
        };

        Ok(Self {
            verified: build(false)?,
            unverified: build(true)?,
        })
    }

    fn http(&self, credential: &AdminCredential) -> &Client {
        if credential.bypass_artifactory_tls_verification {
            &self.unverified
        } else {
            &self.verified
        }
    }

    fn get(&self, credential: &AdminCredential, path: &str) -> RequestBuilder {
        self.http(credential)
            .get(format!("{}{path}", credential.base_url()))
            .bearer_auth(&credential.access_token)
    }

    fn post(&self, credential: &AdminCredential, path: &str) -> RequestBuilder {
        self.http(credential)
            .post(format!("{}{path}", credential.base_url()))
            .bearer_auth(&credential.access_token)
    }

    fn delete(&self, credential: &AdminCredential, url: Url) -> RequestBuilder {
        self.http(credential)
            .delete(url)
            .bearer_auth(&credential.access_token)
    }
}

/// `{url}/access/api/v1/tokens/{token_id}` with the id as one encoded segment.
fn token_url(credential: &AdminCredential, token_id: &str) -> Result<Url> {
    let mut url = Url::parse(credential.base_url())
        .map_err(|e| Error::Config(format!("Invalid Artifactory URL: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| Error::Config("Artifactory URL cannot be a base".to_string()))?
        .pop_if_empty()
        .extend(["access", "api", "v1", "tokens"])
        .push(token_id);
    Ok(url)
}

/// Turn a non-success response into [`Error::UpstreamRejected`].
async fn rejected(response: Response) -> Error {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Error::rejected(status, body.trim().to_string())
}

#[async_trait::async_trait]
impl TokenService for ArtifactoryClient {
    async fn check_version(&self, credential: &AdminCredential) -> Result<ServiceVersion> {
        let response = self
            .get(credential, "/artifactory/api/system/version")
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(Error::Unauthorized(format!("{status}: {}", body.trim())));
            }
            _ => return Err(rejected(response).await),
        }

        let version: ServiceVersion = response.json().await?;
        version.require_scoped_tokens()?;
        debug!(version = %version.version, "Artifactory version check passed");
        Ok(version)
    }

    async fn create_token(
        &self,
        credential: &AdminCredential,
        spec: &TokenSpec,
    ) -> Result<CreatedToken> {
        let response = self
            .post(credential, "/access/api/v1/tokens")
            .json(spec)
            .send()
            .await?;

        if !response.status().is_success() {
            let err = rejected(response).await;
            warn!(username = %spec.username, error = %err, "Artifactory refused token creation");
            return Err(err);
        }

        let created: CreatedToken = response.json().await?;
        debug!(token_id = %created.token_id, username = %spec.username, "Artifactory token created");
        Ok(created)
    }

    async fn revoke_token(
        &self,
        credential: &AdminCredential,
        target: &RevokeTarget,
    ) -> Result<()> {
        let token_id = target.resolved_token_id()?;
        let response = self
            .delete(credential, token_url(credential, &token_id)?)
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => {
                debug!(token_id = %token_id, "Artifactory token revoked");
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(Error::NotFound(token_id)),
            _ => Err(rejected(response).await),
        }
    }

    async fn send_usage(&self, credential: &AdminCredential, feature: &str) -> Result<()> {
        let body = json!({
            "productId": PRODUCT_ID,
            "features": [{ "featureId": feature }],
        });
        let response = self
            .post(credential, "/artifactory/api/system/usage")
            .json(&body)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(rejected(response).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(url: &str) -> AdminCredential {
        AdminCredential {
            access_token: "admin".to_string(),
            url: url.to_string(),
            ..AdminCredential::default()
        }
    }

    #[test]
    fn token_url_keeps_id_in_one_segment() {
        let url = token_url(&credential("https://art.example/"), "a/../../b%2F").unwrap();
        assert_eq!(
            url.as_str(),
            "https://art.example/access/api/v1/tokens/a%2F..%2F..%2Fb%252F"
        );
    }

    #[test]
    fn token_url_respects_base_path() {
        let url = token_url(&credential("https://art.example/jfrog/"), "tok-1").unwrap();
        assert_eq!(url.path(), "/jfrog/access/api/v1/tokens/tok-1");
    }
}
