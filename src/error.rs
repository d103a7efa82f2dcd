//! Error types for the Artifactory secrets backend

use std::io;

use thiserror::Error;

/// Result type alias for the Artifactory secrets backend
pub type Result<T> = std::result::Result<T, Error>;

/// Artifactory secrets backend errors
#[derive(Error, Debug)]
pub enum Error {
    /// No admin credential has been written to `config/admin`
    #[error("backend not configured")]
    NotConfigured,

    /// A named role was referenced but does not exist
    #[error("role not found: {0}")]
    RoleNotFound(String),

    /// A bearer value could not be decoded into token claims
    #[error("error parsing access token: {0}")]
    IntrospectionFailed(String),

    /// Upstream refused the admin credential during the version check
    #[error("upstream rejected credential: {0}")]
    Unauthorized(String),

    /// Upstream version predates the scoped-token API
    #[error("unsupported Artifactory version {found} (need {required} or newer)")]
    Unsupported {
        /// Version reported by upstream
        found: String,
        /// Minimum version with the scoped-token API
        required: String,
    },

    /// Upstream answered but refused the request
    #[error("upstream rejected request ({status}): {detail}")]
    UpstreamRejected {
        /// HTTP status returned by upstream
        status: u16,
        /// Response body or message from upstream
        detail: String,
    },

    /// Upstream could not be reached (DNS, TLS, timeout, connection reset)
    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    /// Revocation target does not exist upstream
    #[error("token not found upstream: {0}")]
    NotFound(String),

    /// Storage write or read failed
    #[error("persistence failed: {0}")]
    PersistenceFailed(String),

    /// Request field validation failed
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build an [`Error::UpstreamRejected`] from a status and body.
    pub fn rejected(status: u16, detail: impl Into<String>) -> Self {
        Self::UpstreamRejected {
            status,
            detail: detail.into(),
        }
    }

    /// Stable machine-readable code used in JSON error bodies.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotConfigured => "not_configured",
            Self::RoleNotFound(_) => "role_not_found",
            Self::IntrospectionFailed(_) => "introspection_failed",
            Self::Unauthorized(_) => "unauthorized",
            Self::Unsupported { .. } => "unsupported_version",
            Self::UpstreamRejected { .. } => "upstream_rejected",
            Self::UpstreamUnreachable(_) => "upstream_unreachable",
            Self::NotFound(_) => "not_found",
            Self::PersistenceFailed(_) => "persistence_failed",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Config(_) | Self::Io(_) | Self::Json(_) => "internal_error",
        }
    }

    /// HTTP status the host surface answers with for this error.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotConfigured
            | Self::IntrospectionFailed(_)
            | Self::Unsupported { .. }
            | Self::InvalidRequest(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::RoleNotFound(_) | Self::NotFound(_) => 404,
            Self::UpstreamRejected { .. } | Self::UpstreamUnreachable(_) => 502,
            Self::PersistenceFailed(_) | Self::Config(_) | Self::Io(_) | Self::Json(_) => 500,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::UpstreamUnreachable(e.to_string())
    }
}
