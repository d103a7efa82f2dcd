//! HTTP host for the secrets backend

pub mod auth;
pub mod handler;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use crate::backend::Backend;
use crate::config::{Config, StorageKind};
use crate::storage::{FileStorage, MemoryStorage, Storage};
use crate::upstream::{ArtifactoryClient, TokenService};
use crate::{Error, Result};

pub use auth::ResolvedAuth;
pub use handler::{AppState, RouterLimits, create_router};

/// The secrets server
pub struct Server {
    config: Config,
    state: Arc<AppState>,
    auth: Arc<ResolvedAuth>,
}

impl Server {
    /// Build storage, the Artifactory client and the backend from config.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage directory cannot be created or the
    /// HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        let storage: Arc<dyn Storage> = match config.storage.kind {
            StorageKind::Memory => {
                warn!("Using in-memory storage; records are lost on restart");
                Arc::new(MemoryStorage::new())
            }
            StorageKind::File => {
                let file = match config.storage.resolved_path() {
                    Some(path) => FileStorage::new(path)?,
                    None => FileStorage::default_location()?,
                };
                info!(path = %file.base_dir().display(), "Using file storage");
                Arc::new(file)
            }
        };

        let service: Arc<dyn TokenService> = Arc::new(ArtifactoryClient::new(
            config.upstream.timeout,
            &config.upstream.user_agent,
        )?);
        let backend = Backend::new(storage, service, config.backend.clone());
        let auth = Arc::new(ResolvedAuth::from_config(&config.api));

        Ok(Self {
            config,
            state: Arc::new(AppState { backend }),
            auth,
        })
    }

    /// Serve until Ctrl+C or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if the listen address is invalid or cannot be bound.
    pub async fn run(self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.server.host, self.config.server.port)
            .parse()
            .map_err(|e| Error::Config(format!("Invalid listen address: {e}")))?;

        let app = create_router(
            Arc::clone(&self.state),
            Arc::clone(&self.auth),
            RouterLimits {
                request_timeout: self.config.server.request_timeout,
                max_body_size: self.config.server.max_body_size,
            },
        );

        let listener = TcpListener::bind(addr).await?;

        info!("============================================================");
        info!("artifactory-secrets v{}", env!("CARGO_PKG_VERSION"));
        info!("Listening on http://{addr}");
        info!(
            default_ttl = self.config.backend.default_ttl.as_secs(),
            max_ttl = self.config.backend.max_ttl.as_secs(),
            "Lease limits"
        );
        match (self.config.api.bearer_token.as_deref(), self.auth.bearer_token()) {
            (Some("auto"), Some(token)) => info!("API bearer token (auto-generated): {token}"),
            (_, Some(_)) => info!("API authentication enabled"),
            (_, None) => warn!("API authentication disabled; set api.bearer_token to enable it"),
        }
        info!("============================================================");

        let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
        let shutdown_timeout = self.config.server.shutdown_timeout;
        let mut shutdown_rx = shutdown_tx.subscribe();

        let serve = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(shutdown_tx));
        let mut serve = std::pin::pin!(serve.into_future());

        tokio::select! {
            result = &mut serve => result?,
            _ = shutdown_rx.recv() => {
                // In-flight requests get `shutdown_timeout` to drain.
                if tokio::time::timeout(shutdown_timeout, &mut serve).await.is_err() {
                    warn!(
                        timeout_secs = shutdown_timeout.as_secs(),
                        "Shutdown timeout elapsed with requests in flight"
                    );
                }
            }
        }

        info!("Server stopped");
        Ok(())
    }
}

/// Shutdown signal handler
async fn shutdown_signal(shutdown_tx: tokio::sync::broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
    let _ = shutdown_tx.send(());
}
