//! In-memory [`TokenService`] for unit tests.
//!
//! Mints JWT-shaped tokens whose claims decode with
//! [`introspect`](super::introspect), tracks which token ids are active, and
//! can be told to fail individual calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use parking_lot::Mutex;

use super::{CreatedToken, RevokeTarget, ServiceVersion, TokenService, TokenSpec};
use crate::records::AdminCredential;
use crate::{Error, Result};

/// Failure to inject into the next matching call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Upstream answers with 4xx/5xx
    Reject,
    /// Transport failure
    Unreachable,
    /// Revoke target already gone
    NotFound,
}

impl Fault {
    fn into_error(self, what: &str) -> Error {
        match self {
            Self::Reject => Error::rejected(400, format!("{what} refused")),
            Self::Unreachable => Error::UpstreamUnreachable(format!("{what}: connection reset")),
            Self::NotFound => Error::NotFound(what.to_string()),
        }
    }
}

/// Token the fake considers active.
#[derive(Debug, Clone)]
pub struct ActiveToken {
    pub username: String,
    pub scope: String,
    pub audience: String,
    pub expires_in: Option<u64>,
    pub description: String,
}

#[derive(Default)]
struct State {
    active: HashMap<String, ActiveToken>,
    revoked: Vec<String>,
    create_fault: Option<Fault>,
    revoke_fault: Option<Fault>,
    version_fault: Option<Fault>,
    last_spec: Option<TokenSpec>,
}

/// In-memory Artifactory.
pub struct FakeTokenService {
    state: Mutex<State>,
    version: String,
    counter: AtomicUsize,
    usage_calls: AtomicUsize,
}

impl FakeTokenService {
    pub fn new() -> Self {
        Self::with_version("7.77.3")
    }

    pub fn with_version(version: &str) -> Self {
        Self {
            state: Mutex::new(State::default()),
            version: version.to_string(),
            counter: AtomicUsize::new(0),
            usage_calls: AtomicUsize::new(0),
        }
    }

    /// Register an externally minted token as active and return its bearer.
    pub fn seed(&self, username: &str, scope: &str) -> String {
        let token_id = self.next_id();
        let bearer = mint(&token_id, username, scope);
        self.state.lock().active.insert(
            token_id,
            ActiveToken {
                username: username.to_string(),
                scope: scope.to_string(),
                audience: String::new(),
                expires_in: None,
                description: String::new(),
            },
        );
        bearer
    }

    pub fn fail_next_create(&self, fault: Fault) {
        self.state.lock().create_fault = Some(fault);
    }

    pub fn fail_next_revoke(&self, fault: Fault) {
        self.state.lock().revoke_fault = Some(fault);
    }

    pub fn fail_next_version_check(&self, fault: Fault) {
        self.state.lock().version_fault = Some(fault);
    }

    /// Forget a token without recording a revocation (out-of-band delete).
    pub fn drop_out_of_band(&self, token_id: &str) {
        self.state.lock().active.remove(token_id);
    }

    pub fn is_active(&self, token_id: &str) -> bool {
        self.state.lock().active.contains_key(token_id)
    }

    pub fn active(&self, token_id: &str) -> Option<ActiveToken> {
        self.state.lock().active.get(token_id).cloned()
    }

    pub fn active_count(&self) -> usize {
        self.state.lock().active.len()
    }

    pub fn revoked(&self) -> Vec<String> {
        self.state.lock().revoked.clone()
    }

    pub fn last_spec(&self) -> Option<TokenSpec> {
        self.state.lock().last_spec.clone()
    }

    pub fn created_count(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }

    pub fn usage_calls(&self) -> usize {
        self.usage_calls.load(Ordering::SeqCst)
    }

    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("tok-{n:04}")
    }

    fn require_admin(&self, credential: &AdminCredential) -> Result<()> {
        let id = super::introspect(&credential.access_token)
            .map_err(|_| Error::Unauthorized("bad credential".to_string()))?
            .token_id;
        if self.is_active(&id) {
            Ok(())
        } else {
            Err(Error::Unauthorized(format!("token {id} is not active")))
        }
    }
}

/// Encode a JWT-shaped bearer value with Artifactory-style claims.
pub fn mint(token_id: &str, username: &str, scope: &str) -> String {
    let claims = serde_json::json!({
        "sub": format!("jfac@fake/users/{username}"),
        "scp": scope,
        "aud": "*@*",
        "iss": "jfac@fake",
        "exp": 4_102_444_800_i64,
        "iat": 1_700_000_000_i64,
        "jti": token_id,
    });
    format!(
        "eyJhbGciOiJSUzI1NiJ9.{}.c2lnbmF0dXJl",
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

#[async_trait::async_trait]
impl TokenService for FakeTokenService {
    async fn check_version(&self, credential: &AdminCredential) -> Result<ServiceVersion> {
        if let Some(fault) = self.state.lock().version_fault.take() {
            return Err(fault.into_error("version check"));
        }
        self.require_admin(credential)?;
        let version = ServiceVersion {
            version: self.version.clone(),
            revision: None,
        };
        version.require_scoped_tokens()?;
        Ok(version)
    }

    async fn create_token(
        &self,
        credential: &AdminCredential,
        spec: &TokenSpec,
    ) -> Result<CreatedToken> {
        if let Some(fault) = self.state.lock().create_fault.take() {
            return Err(fault.into_error("create"));
        }
        self.require_admin(credential)?;

        let token_id = self.next_id();
        let access_token = mint(&token_id, &spec.username, &spec.scope);
        let mut state = self.state.lock();
        state.last_spec = Some(spec.clone());
        state.active.insert(
            token_id.clone(),
            ActiveToken {
                username: spec.username.clone(),
                scope: spec.scope.clone(),
                audience: spec.audience.clone(),
                expires_in: spec.expires_in,
                description: spec.description.clone(),
            },
        );

        Ok(CreatedToken {
            token_id,
            access_token,
            expires_in: spec.expires_in,
            scope: Some(spec.scope.clone()),
        })
    }

    async fn revoke_token(
        &self,
        credential: &AdminCredential,
        target: &RevokeTarget,
    ) -> Result<()> {
        if let Some(fault) = self.state.lock().revoke_fault.take() {
            return Err(fault.into_error(&target.token_id));
        }
        self.require_admin(credential)?;

        let token_id = target.resolved_token_id()?;
        let mut state = self.state.lock();
        if state.active.remove(&token_id).is_some() {
            state.revoked.push(token_id);
            Ok(())
        } else {
            Err(Error::NotFound(token_id))
        }
    }

    async fn send_usage(&self, _credential: &AdminCredential, _feature: &str) -> Result<()> {
        self.usage_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
