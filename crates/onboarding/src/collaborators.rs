//! Interfaces of the network collaborators the orchestrator drives.
//!
//! Implementations own their transport, redirects and timeouts. They must take
//! their TLS configuration from the [`SessionContext`] they are handed so that
//! certificates trusted earlier in an attempt are honored later in it.

use crate::certificate::{CertificateInfo, CertificateSet};
use crate::error::FetchError;
use crate::normalize::CanonicalUrl;
use crate::session::SessionContext;
use async_trait::async_trait;
use serde::Serialize;
use url::Url;

/// A WebFinger service able to answer for the server directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebFingerService {
    pub href: Url,
}

pub type DiscoveryOutcome = Result<WebFingerService, FetchError>;

pub type ResolutionOutcome = Result<ResolvedUrl, FetchError>;

/// Result of following redirects from the canonical URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUrl {
    pub resolved_url: Url,
    /// Certificates the user accepted through the [`TrustPrompt`] while resolving.
    pub accepted_certificates: CertificateSet,
}

impl ResolvedUrl {
    pub fn new(resolved_url: Url) -> Self {
        Self {
            resolved_url,
            accepted_certificates: CertificateSet::new(),
        }
    }

    pub fn with_accepted_certificates(mut self, certificates: CertificateSet) -> Self {
        self.accepted_certificates = certificates;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuthenticationType {
    OAuth,
    Other,
}

pub type AuthOutcome = Result<AuthenticationType, FetchError>;

#[async_trait]
pub trait WebFingerDiscovery: Send + Sync {
    async fn discover_webfinger_service(
        &self,
        session: &SessionContext,
        url: &CanonicalUrl,
    ) -> DiscoveryOutcome;
}

#[async_trait]
pub trait UrlResolver: Send + Sync {
    /// Follow redirects from `url` and return the actual base URL.
    ///
    /// Untrusted certificates may be accepted once through `prompt`.
    async fn resolve_url(
        &self,
        session: &SessionContext,
        url: &CanonicalUrl,
        prompt: &dyn TrustPrompt,
    ) -> ResolutionOutcome;
}

#[async_trait]
pub trait AuthTypeResolver: Send + Sync {
    async fn determine_auth_type(&self, session: &SessionContext, url: &Url) -> AuthOutcome;
}

/// A one-time trust decision requested by the URL resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrustRequest {
    pub url: Url,
    pub chain: Vec<CertificateInfo>,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustDecision {
    Accept,
    Reject,
}

/// Interaction capability handed to the resolver in place of a UI parent.
#[async_trait]
pub trait TrustPrompt: Send + Sync {
    async fn confirm(&self, request: &TrustRequest) -> TrustDecision;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RejectUntrusted;

#[async_trait]
impl TrustPrompt for RejectUntrusted {
    async fn confirm(&self, request: &TrustRequest) -> TrustDecision {
        tracing::info!(url = %request.url, reason = %request.reason, "rejecting untrusted certificate");
        TrustDecision::Reject
    }
}

/// Accepts every certificate. Only for tests and explicitly unattended setups.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptUntrusted;

#[async_trait]
impl TrustPrompt for AcceptUntrusted {
    async fn confirm(&self, request: &TrustRequest) -> TrustDecision {
        tracing::warn!(url = %request.url, reason = %request.reason, "accepting untrusted certificate");
        TrustDecision::Accept
    }
}
