//! Fire-and-forget usage telemetry.

use std::sync::Arc;

use tracing::debug;

use crate::records::AdminCredential;
use crate::upstream::TokenService;

/// Reports feature usage to Artifactory on a detached task.
#[derive(Clone)]
pub struct UsageReporter {
    service: Arc<dyn TokenService>,
}

impl UsageReporter {
    /// Create a reporter that calls `service`.
    #[must_use]
    pub fn new(service: Arc<dyn TokenService>) -> Self {
        Self { service }
    }

    /// Report `feature` unless the credential opts out.
    ///
    /// Returns immediately. Failures are logged at debug and dropped.
    /// Outside a tokio runtime the report is skipped.
    pub fn report(&self, credential: &AdminCredential, feature: &'static str) {
        if credential.disable_usage_telemetry {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };

        let service = Arc::clone(&self.service);
        let credential = credential.clone();
        runtime.spawn(async move {
            if let Err(e) = service.send_usage(&credential, feature).await {
                debug!(feature, error = %e, "Usage report failed");
            }
        });
    }
}
