//! Per-attempt network and trust context shared by the orchestrator and every
//! network collaborator.

use crate::certificate::{Certificate, CertificateSet};
use crate::error::SessionError;
use once_cell::sync::Lazy;
use rustls::crypto::CryptoProvider;
use rustls::{ClientConfig, RootCertStore};
use std::ops::Deref;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::{Mutex, MutexGuard, watch};
use tracing::{debug, warn};

static MOZILLA_ROOTS: Lazy<RootCertStore> = Lazy::new(|| {
    let mut store = RootCertStore::empty();
    store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    store
});

#[derive(Default)]
struct TrustState {
    certificates: CertificateSet,
    generation: u64,
    tls_config: Option<Arc<ClientConfig>>,
}

/// Owned by the caller for the lifetime of an onboarding flow.
///
/// Dropping the last `AccessSession` discards the session: the shared
/// [`SessionContext`] is closed, so a running attempt is cancelled even while
/// the orchestrator still holds the context.
pub struct AccessSession {
    context: Arc<SessionContext>,
}

impl Default for AccessSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessSession {
    pub fn new() -> Self {
        Self {
            context: Arc::new(SessionContext::new()),
        }
    }

    pub fn context(&self) -> &Arc<SessionContext> {
        &self.context
    }
}

impl Deref for AccessSession {
    type Target = SessionContext;

    fn deref(&self) -> &SessionContext {
        &self.context
    }
}

impl Drop for AccessSession {
    fn drop(&mut self) {
        self.context.close();
    }
}

/// State behind an [`AccessSession`], handed to every collaborator call.
/// Collaborators must build their TLS connections from
/// [`SessionContext::tls_client_config`] on every handshake.
pub struct SessionContext {
    trust: RwLock<TrustState>,
    attempt: Mutex<()>,
    closed: watch::Sender<bool>,
}

/// Held for the duration of one validation attempt.
pub(crate) struct AttemptGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl SessionContext {
    fn new() -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            trust: RwLock::new(TrustState::default()),
            attempt: Mutex::new(()),
            closed,
        }
    }

    /// Clear the trust store and any cached connection state.
    pub fn reset(&self) {
        if self.is_closed() {
            return;
        }
        let mut trust = self.write_trust();
        trust.certificates.clear();
        trust.tls_config = None;
        trust.generation += 1;
        debug!(generation = trust.generation, "access session reset");
    }

    /// Merge `certificates` into the trust store. Never removes anything.
    ///
    /// Returns how many certificates were not trusted before.
    pub fn add_custom_trusted_ca_certificates(&self, certificates: &CertificateSet) -> usize {
        if self.is_closed() || certificates.is_empty() {
            return 0;
        }
        let mut trust = self.write_trust();
        let before = trust.certificates.len();
        trust.certificates.extend(certificates.iter().cloned());
        let added = trust.certificates.len() - before;
        if added > 0 {
            trust.tls_config = None;
            trust.generation += 1;
        }
        debug!(added, total = trust.certificates.len(), "trusted certificates merged");
        added
    }

    pub fn trusted_certificates(&self) -> CertificateSet {
        self.read_trust().certificates.clone()
    }

    pub fn is_trusted(&self, certificate: &Certificate) -> bool {
        self.read_trust().certificates.contains(certificate)
    }

    /// Incremented on every change to the trust store, including resets.
    pub fn generation(&self) -> u64 {
        self.read_trust().generation
    }

    /// TLS client configuration honoring the Mozilla roots plus every
    /// certificate trusted in this session. Cached until the trust store changes.
    ///
    /// # Errors
    ///
    /// [`SessionError::Closed`] once the session is discarded, or
    /// [`SessionError::Tls`] when rustls rejects the protocol setup.
    pub fn tls_client_config(&self) -> Result<Arc<ClientConfig>, SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        if let Some(config) = self.read_trust().tls_config.clone() {
            return Ok(config);
        }

        let mut trust = self.write_trust();
        if let Some(config) = trust.tls_config.clone() {
            return Ok(config);
        }

        let roots = build_root_store(&trust.certificates);
        let provider = CryptoProvider::get_default()
            .cloned()
            .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()));
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| SessionError::Tls(e.to_string()))?
            .with_root_certificates(roots)
            .with_no_client_auth();
        let config = Arc::new(config);
        trust.tls_config = Some(config.clone());
        Ok(config)
    }

    /// Mozilla roots plus every usable certificate trusted in this session.
    pub fn root_cert_store(&self) -> RootCertStore {
        build_root_store(&self.read_trust().certificates)
    }

    /// Discard the session without waiting for the owner to be dropped. A
    /// running attempt is cancelled and later mutations are ignored.
    pub fn close(&self) {
        if !self.closed.send_replace(true) {
            debug!("access session closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves once the session is discarded.
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        loop {
            let closed = *rx.borrow_and_update();
            if closed || rx.changed().await.is_err() {
                return;
            }
        }
    }

    pub(crate) async fn begin_attempt(&self) -> AttemptGuard<'_> {
        AttemptGuard {
            _guard: self.attempt.lock().await,
        }
    }

    pub(crate) fn try_begin_attempt(&self) -> Option<AttemptGuard<'_>> {
        self.attempt
            .try_lock()
            .ok()
            .map(|guard| AttemptGuard { _guard: guard })
    }

    fn read_trust(&self) -> RwLockReadGuard<'_, TrustState> {
        self.trust.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_trust(&self) -> RwLockWriteGuard<'_, TrustState> {
        self.trust.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn build_root_store(certificates: &CertificateSet) -> RootCertStore {
    let mut roots = MOZILLA_ROOTS.clone();
    for certificate in certificates {
        if let Err(e) = roots.add(certificate.to_certificate_der()) {
            warn!(
                sha256 = %certificate.sha256_fingerprint(),
                error = %e,
                "skipping trusted certificate that cannot be used as a trust anchor"
            );
        }
    }
    roots
}
