//! Offline introspection of Artifactory access tokens.
//!
//! Artifactory access tokens are JWTs. The claims segment carries everything
//! needed to recover identity and scope, so no network call is made and the
//! signature is not checked: the value being decoded is one this backend
//! already holds. Decoding fails closed on anything malformed.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Identity and scope recovered from a bearer value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenInfo {
    /// Artifactory token id (`jti`).
    pub token_id: String,
    /// Username extracted from `sub`.
    pub username: String,
    /// Scope string (`scp`).
    pub scope: String,
    /// Audience (`aud`), when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    /// Issuer (`iss`), when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    /// Expiry as Unix seconds; `0` for non-expiring tokens.
    pub expires: i64,
}

#[derive(Debug, Deserialize)]
struct RawClaims {
    #[serde(default)]
    jti: Option<String>,
    #[serde(default)]
    sub: String,
    #[serde(default)]
    scp: String,
    #[serde(default)]
    aud: Option<serde_json::Value>,
    #[serde(default)]
    iss: Option<String>,
    #[serde(default)]
    exp: Option<i64>,
}

/// Decode a bearer value's claims.
pub fn introspect(bearer: &str) -> Result<TokenInfo> {
    let segments: Vec<&str> = bearer.trim().split('.').collect();
    let [_, payload, _] = segments.as_slice() else {
        return Err(Error::IntrospectionFailed(format!(
            "expected 3 token segments, found {}",
            segments.len()
        )));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| Error::IntrospectionFailed(format!("claims are not base64url: {e}")))?;

    let raw: RawClaims = serde_json::from_slice(&bytes)
        .map_err(|e| Error::IntrospectionFailed(format!("claims are not JSON: {e}")))?;

    let token_id = raw
        .jti
        .filter(|jti| !jti.is_empty())
        .ok_or_else(|| Error::IntrospectionFailed("claims have no jti".to_string()))?;

    Ok(TokenInfo {
        token_id,
        username: username_from_subject(&raw.sub),
        scope: raw.scp,
        audience: raw.aud.and_then(audience_string),
        issuer: raw.iss,
        expires: raw.exp.unwrap_or(0),
    })
}

/// `jfac@01g5hek6kb/users/admin` -> `admin`
fn username_from_subject(sub: &str) -> String {
    if let Some((_, user)) = sub.split_once("/users/") {
        return user.to_string();
    }
    sub.rsplit('/').next().unwrap_or_default().to_string()
}

fn audience_string(aud: serde_json::Value) -> Option<String> {
    match aud {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Array(items) => Some(
            items
                .iter()
                .filter_map(serde_json::Value::as_str)
                .collect::<Vec<_>>()
                .join(" "),
        ),
        _ => None,
    }
}
