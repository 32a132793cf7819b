use crate::error::ValidationError;
use crate::normalize::CanonicalUrl;
use tracing::info;

/// Presentation side of a validation attempt (address field, error label).
pub trait ValidationObserver: Send + Sync {
    /// A new attempt began; any previously shown error is stale.
    fn attempt_started(&self) {}

    /// The address as actually parsed, to be shown back to the user.
    fn url_parsed(&self, _url: &CanonicalUrl) {}

    fn error_reported(&self, _error: &ValidationError) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ValidationObserver for TracingObserver {
    fn url_parsed(&self, url: &CanonicalUrl) {
        info!(url = %url, "server address parsed");
    }
}
