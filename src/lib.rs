//! Artifactory Secrets Backend
//!
//! Issues scoped, short-lived Artifactory access tokens from a single admin
//! credential held by the secret host.
//!
//! # Features
//!
//! - **Role tokens**: named templates fix username, scope, audience and TTLs
//! - **User tokens**: direct issuance for a username under configurable defaults
//! - **Leases**: TTLs clamped to role and backend ceilings, renewable up to the ceiling
//! - **Revocation**: tokens already gone upstream count as revoked
//! - **Rotation**: the admin credential replaces itself without losing its scope
//!
//! # Artifactory Compatibility
//!
//! Scoped tokens need Artifactory 7.21.1 or later; older servers are refused
//! before any token call.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod audit;
pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod records;
pub mod server;
pub mod storage;
pub mod ttl;
pub mod upstream;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
///
/// `RUST_LOG` takes precedence over `level`. `format` selects `json` or text output.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
