//! Shared fixtures for integration tests

#![allow(dead_code)]

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use artifactory_secrets::records::AdminCredential;

/// An unsigned Artifactory-shaped JWT carrying the given claims.
pub fn mint(token_id: &str, username: &str, scope: &str) -> String {
    let claims = json!({
        "sub": format!("jfac@test/users/{username}"),
        "scp": scope,
        "aud": "*@*",
        "iss": "jfac@test",
        "exp": 4_102_444_800_i64,
        "iat": 1_700_000_000_i64,
        "jti": token_id,
    });
    format!(
        "eyJhbGciOiJSUzI1NiJ9.{}.c2lnbmF0dXJl",
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

/// Admin credential pointing at `server`.
pub fn admin_for(server: &MockServer, access_token: &str) -> AdminCredential {
    AdminCredential {
        access_token: access_token.to_string(),
        url: server.uri(),
        bypass_artifactory_tls_verification: false,
        disable_usage_telemetry: true,
    }
}

/// Answer the version check with `version`.
pub async fn mount_version(server: &MockServer, version: &str) {
    Mock::given(method("GET"))
        .and(path("/artifactory/api/system/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "version": version,
            "revision": "79100900",
        })))
        .mount(server)
        .await;
}

/// Bodies of all requests `server` saw at `path`, parsed as JSON.
pub async fn bodies_at(server: &MockServer, at: &str) -> Vec<serde_json::Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == at)
        .map(|r| serde_json::from_slice(&r.body).unwrap_or(serde_json::Value::Null))
        .collect()
}
