//! The validation orchestrator: one attempt turns server-address text into a
//! confirmed OAuth-capable base URL or a classified failure.
//!
//! Steps are strictly sequential:
//! reset session, normalize, scheme check, WebFinger probe, and when no
//! WebFinger service answers: resolve, query check, certificate merge, auth
//! type check.

use crate::certificate::CertificateSet;
use crate::collaborators::{
    AuthTypeResolver, AuthenticationType, RejectUntrusted, ResolvedUrl, TrustPrompt,
    UrlResolver, WebFingerDiscovery,
};
use crate::config::AppConfig;
use crate::error::ValidationError;
use crate::normalize::{CanonicalUrl, DEFAULT_SCHEME, normalize};
use crate::observer::{TracingObserver, ValidationObserver};
use crate::outcome::{Stage, ValidationEvent, ValidationOutcome};
use crate::session::{AccessSession, SessionContext};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio::task::JoinHandle;
use tracing::{Span, debug, error, field, info};
use url::Url;

pub struct Validator {
    discovery: Arc<dyn WebFingerDiscovery>,
    resolver: Arc<dyn UrlResolver>,
    auth: Arc<dyn AuthTypeResolver>,
    observer: Arc<dyn ValidationObserver>,
    trust_prompt: Arc<dyn TrustPrompt>,
    session: Weak<SessionContext>,
    locked_server_url: Option<String>,
    path_override: Option<String>,
}

/// Mutable bookkeeping of the attempt in flight.
struct Attempt {
    stage: Stage,
    certificates: CertificateSet,
}

impl Attempt {
    fn new() -> Self {
        Self {
            stage: Stage::Start,
            certificates: CertificateSet::new(),
        }
    }

    fn enter(&mut self, stage: Stage) {
        debug!(from = %self.stage, to = %stage, "validation stage");
        self.stage = stage;
    }
}

impl Validator {
    /// A validator without a session; call [`Validator::with_session`] before validating.
    pub fn new(
        discovery: Arc<dyn WebFingerDiscovery>,
        resolver: Arc<dyn UrlResolver>,
        auth: Arc<dyn AuthTypeResolver>,
    ) -> Self {
        Self {
            discovery,
            resolver,
            auth,
            observer: Arc::new(TracingObserver),
            trust_prompt: Arc::new(RejectUntrusted),
            session: Weak::new(),
            locked_server_url: None,
            path_override: None,
        }
    }

    /// Reference (not own) the caller's session. Dropping the caller's
    /// [`AccessSession`] cancels a running attempt.
    pub fn with_session(mut self, session: &AccessSession) -> Self {
        self.session = Arc::downgrade(session.context());
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ValidationObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_trust_prompt(mut self, prompt: Arc<dyn TrustPrompt>) -> Self {
        self.trust_prompt = prompt;
        self
    }

    pub fn with_path_override(mut self, path: Option<String>) -> Self {
        self.path_override = path.filter(|p| !p.is_empty());
        self
    }

    /// Validate this address instead of whatever the user typed.
    pub fn with_locked_server_url(mut self, url: Option<String>) -> Self {
        self.locked_server_url = url.filter(|u| !u.trim().is_empty());
        self
    }

    pub fn with_config(self, config: &AppConfig) -> Self {
        let locked = config
            .override_server_url
            .clone()
            .filter(|_| config.server_url_locked());
        let path = config.path_override().map(str::to_owned);
        self.with_locked_server_url(locked).with_path_override(path)
    }

    /// Run one attempt. Waits behind an attempt already running on the same session.
    pub async fn validate(&self, input: &str) -> ValidationEvent {
        let Some(session) = self.live_session() else {
            return self.unavailable();
        };
        let _attempt = tokio::select! {
            biased;
            _ = session.closed() => return cancelled(),
            guard = session.begin_attempt() => guard,
        };
        self.run_attempt(&session, input).await
    }

    /// Run one attempt, or fail with [`ValidationError::Busy`] when another
    /// attempt holds the session.
    pub async fn try_validate(&self, input: &str) -> ValidationEvent {
        let Some(session) = self.live_session() else {
            return self.unavailable();
        };
        let Some(_attempt) = session.try_begin_attempt() else {
            info!("validation rejected, session busy");
            return ValidationEvent::Failure(ValidationOutcome::failure(
                ValidationError::Busy,
                CertificateSet::new(),
            ));
        };
        self.run_attempt(&session, input).await
    }

    /// Run [`Validator::validate`] on the tokio runtime. Dropping the returned
    /// handle aborts the attempt.
    pub fn spawn(self: &Arc<Self>, input: impl Into<String>) -> PendingValidation {
        let this = Arc::clone(self);
        let input = input.into();
        PendingValidation {
            handle: tokio::spawn(async move { this.validate(&input).await }),
        }
    }

    fn live_session(&self) -> Option<Arc<SessionContext>> {
        self.session.upgrade().filter(|s| !s.is_closed())
    }

    fn unavailable(&self) -> ValidationEvent {
        self.observer.attempt_started();
        self.fail(Attempt::new(), ValidationError::SessionUnavailable)
    }

    #[tracing::instrument(
        name = "validation",
        skip(self, session, input),
        fields(attempt_id = %uuid::Uuid::new_v4(), locked = self.locked_server_url.is_some(), url = tracing::field::Empty)
    )]
    async fn run_attempt(&self, session: &SessionContext, input: &str) -> ValidationEvent {
        self.observer.attempt_started();
        let input = self.locked_server_url.as_deref().unwrap_or(input);
        tokio::select! {
            biased;
            _ = session.closed() => cancelled(),
            event = self.pipeline(session, input) => event,
        }
    }

    async fn pipeline(&self, session: &SessionContext, input: &str) -> ValidationEvent {
        let mut attempt = Attempt::new();
        session.reset();

        attempt.enter(Stage::Normalizing);
        let url = match normalize(input, self.path_override.as_deref()) {
            Ok(url) => url,
            Err(e) => return self.fail(attempt, e.into()),
        };
        // raw input may carry credentials, only the canonical form is recorded
        Span::current().record("url", field::display(&url));

        attempt.enter(Stage::SchemeCheck);
        if let Err(e) = ensure_https(&url) {
            return self.fail(attempt, e);
        }
        self.observer.url_parsed(&url);

        attempt.enter(Stage::WebFingerProbe);
        match self.discovery.discover_webfinger_service(session, &url).await {
            Ok(service) => {
                return self.succeed(attempt, url.into_url(), Some(service.href));
            }
            Err(e) => debug!(error = %e, "no WebFinger service, resolving server URL"),
        }

        attempt.enter(Stage::Resolve);
        let ResolvedUrl {
            resolved_url,
            accepted_certificates,
        } = match self
            .resolver
            .resolve_url(session, &url, self.trust_prompt.as_ref())
            .await
        {
            Ok(resolved) => resolved,
            Err(e) => return self.fail(attempt, ValidationError::ResolverFailure(e.to_string())),
        };

        attempt.enter(Stage::QueryCheck);
        if let Some(query) = resolved_url.query() {
            let query = query.to_string();
            return self.fail(attempt, ValidationError::QueryNotAllowed(query));
        }

        attempt.enter(Stage::CertMerge);
        if !accepted_certificates.is_empty() {
            session.add_custom_trusted_ca_certificates(&accepted_certificates);
            attempt.certificates = accepted_certificates;
        }

        attempt.enter(Stage::AuthCheck);
        match self.auth.determine_auth_type(session, &resolved_url).await {
            Ok(AuthenticationType::OAuth) => {}
            Ok(other) => {
                error!(
                    auth_type = ?other,
                    url = %resolved_url,
                    "resolved server does not use OAuth"
                );
                let message = format!("The server at {resolved_url} does not support OAuth sign in");
                return self.fail(attempt, ValidationError::AuthCheckFailure(message));
            }
            Err(e) => return self.fail(attempt, ValidationError::AuthCheckFailure(e.to_string())),
        }

        self.succeed(attempt, resolved_url, None)
    }

    fn succeed(
        &self,
        mut attempt: Attempt,
        base_server_url: Url,
        webfinger_service_url: Option<Url>,
    ) -> ValidationEvent {
        attempt.enter(Stage::Success);
        info!(
            base_server_url = %base_server_url,
            webfinger = webfinger_service_url.is_some(),
            certificates = attempt.certificates.len(),
            "server validated"
        );
        ValidationEvent::Success(ValidationOutcome::success(
            base_server_url,
            webfinger_service_url,
            attempt.certificates,
        ))
    }

    fn fail(&self, mut attempt: Attempt, error: ValidationError) -> ValidationEvent {
        let failed_at = attempt.stage;
        attempt.enter(Stage::Failed);
        info!(stage = %failed_at, kind = ?error.kind(), error = %error, "server validation failed");
        self.observer.error_reported(&error);
        ValidationEvent::Failure(ValidationOutcome::failure(error, attempt.certificates))
    }
}

/// Only `https` server URLs are accepted.
pub fn ensure_https(url: &CanonicalUrl) -> Result<(), ValidationError> {
    if url.scheme() == DEFAULT_SCHEME {
        Ok(())
    } else {
        Err(ValidationError::UnsupportedScheme {
            scheme: url.scheme().to_string(),
        })
    }
}

fn cancelled() -> ValidationEvent {
    info!("validation cancelled, access session closed");
    ValidationEvent::Failure(ValidationOutcome::failure(
        ValidationError::Cancelled,
        CertificateSet::new(),
    ))
}

/// A spawned attempt. Resolves to its [`ValidationEvent`]; dropping it aborts the attempt.
pub struct PendingValidation {
    handle: JoinHandle<ValidationEvent>,
}

impl PendingValidation {
    pub fn abort(&self) {
        self.handle.abort();
    }
}

impl Future for PendingValidation {
    type Output = ValidationEvent;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx).map(|joined| match joined {
            Ok(event) => event,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => ValidationEvent::Failure(ValidationOutcome::failure(
                ValidationError::Cancelled,
                CertificateSet::new(),
            )),
        })
    }
}

impl Drop for PendingValidation {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
