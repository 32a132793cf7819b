//! Scripted collaborators shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use server_onboarding::certificate::{Certificate, CertificateSet};
use server_onboarding::collaborators::{
    AuthOutcome, AuthTypeResolver, AuthenticationType, DiscoveryOutcome, ResolutionOutcome,
    ResolvedUrl, TrustDecision, TrustPrompt, TrustRequest, UrlResolver, WebFingerDiscovery,
    WebFingerService,
};
use server_onboarding::error::{FetchError, ValidationError};
use server_onboarding::normalize::CanonicalUrl;
use server_onboarding::observer::ValidationObserver;
use server_onboarding::session::{AccessSession, SessionContext};
use server_onboarding::validation::Validator;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use url::Url;

#[derive(Debug, Clone)]
pub struct Call {
    pub collaborator: &'static str,
    pub url: String,
    pub trusted: CertificateSet,
}

#[derive(Default)]
pub struct Recorder {
    calls: Mutex<Vec<Call>>,
}

impl Recorder {
    fn record(&self, collaborator: &'static str, url: &str, session: &SessionContext) {
        self.calls.lock().unwrap().push(Call {
            collaborator,
            url: url.to_string(),
            trusted: session.trusted_certificates(),
        });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, collaborator: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.collaborator == collaborator)
            .count()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.calls().iter().map(|c| c.collaborator).collect()
    }
}

pub fn cert(name: &str) -> Certificate {
    Certificate::from_der(name.as_bytes().to_vec())
}

pub fn certs(names: &[&str]) -> CertificateSet {
    names.iter().map(|n| cert(n)).collect()
}

pub fn url(s: &str) -> Url {
    Url::parse(s).expect("test url")
}

pub struct ScriptedDiscovery {
    recorder: Arc<Recorder>,
    href: Option<Url>,
}

impl ScriptedDiscovery {
    pub fn found(recorder: &Arc<Recorder>, href: &str) -> Arc<Self> {
        Arc::new(Self {
            recorder: recorder.clone(),
            href: Some(url(href)),
        })
    }

    pub fn absent(recorder: &Arc<Recorder>) -> Arc<Self> {
        Arc::new(Self {
            recorder: recorder.clone(),
            href: None,
        })
    }
}

#[async_trait]
impl WebFingerDiscovery for ScriptedDiscovery {
    async fn discover_webfinger_service(
        &self,
        session: &SessionContext,
        url: &CanonicalUrl,
    ) -> DiscoveryOutcome {
        self.recorder.record("discovery", url.as_str(), session);
        match &self.href {
            Some(href) => Ok(WebFingerService { href: href.clone() }),
            None => Err(FetchError::NotFound),
        }
    }
}

pub struct ScriptedResolver {
    recorder: Arc<Recorder>,
    outcome: ResolutionOutcome,
    pub entered: Arc<Notify>,
    pub gate: Option<Arc<Notify>>,
}

impl ScriptedResolver {
    pub fn resolving(recorder: &Arc<Recorder>, resolved: &str, accepted: CertificateSet) -> Self {
        Self {
            recorder: recorder.clone(),
            outcome: Ok(ResolvedUrl::new(url(resolved)).with_accepted_certificates(accepted)),
            entered: Arc::new(Notify::new()),
            gate: None,
        }
    }

    pub fn failing(recorder: &Arc<Recorder>, error: FetchError) -> Self {
        Self {
            recorder: recorder.clone(),
            outcome: Err(error),
            entered: Arc::new(Notify::new()),
            gate: None,
        }
    }

    /// Block inside `resolve_url` until the returned gate is notified.
    pub fn gated(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.gate = Some(gate.clone());
        (self, gate)
    }
}

#[async_trait]
impl UrlResolver for ScriptedResolver {
    async fn resolve_url(
        &self,
        session: &SessionContext,
        url: &CanonicalUrl,
        _prompt: &dyn TrustPrompt,
    ) -> ResolutionOutcome {
        self.recorder.record("resolver", url.as_str(), session);
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.outcome.clone()
    }
}

/// Resolves to the canonical URL, offering `certificate` through the trust prompt.
pub struct PromptingResolver {
    pub recorder: Arc<Recorder>,
    pub certificate: Certificate,
}

#[async_trait]
impl UrlResolver for PromptingResolver {
    async fn resolve_url(
        &self,
        session: &SessionContext,
        url: &CanonicalUrl,
        prompt: &dyn TrustPrompt,
    ) -> ResolutionOutcome {
        self.recorder.record("resolver", url.as_str(), session);
        let request = TrustRequest {
            url: url.as_url().clone(),
            chain: self.certificate.info().into_iter().collect(),
            reason: "self-signed certificate".to_string(),
        };
        match prompt.confirm(&request).await {
            TrustDecision::Accept => Ok(ResolvedUrl::new(url.as_url().clone())
                .with_accepted_certificates([self.certificate.clone()].into_iter().collect())),
            TrustDecision::Reject => Err(FetchError::UntrustedCertificate {
                host: url.host_str().unwrap_or_default().to_string(),
            }),
        }
    }
}

pub struct ScriptedAuth {
    recorder: Arc<Recorder>,
    outcome: AuthOutcome,
}

impl ScriptedAuth {
    pub fn oauth(recorder: &Arc<Recorder>) -> Arc<Self> {
        Self::with(recorder, Ok(AuthenticationType::OAuth))
    }

    pub fn with(recorder: &Arc<Recorder>, outcome: AuthOutcome) -> Arc<Self> {
        Arc::new(Self {
            recorder: recorder.clone(),
            outcome,
        })
    }
}

#[async_trait]
impl AuthTypeResolver for ScriptedAuth {
    async fn determine_auth_type(&self, session: &SessionContext, url: &Url) -> AuthOutcome {
        self.recorder.record("auth", url.as_str(), session);
        self.outcome.clone()
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl ValidationObserver for RecordingObserver {
    fn attempt_started(&self) {
        self.events.lock().unwrap().push("started".to_string());
    }

    fn url_parsed(&self, url: &CanonicalUrl) {
        self.events.lock().unwrap().push(format!("url:{url}"));
    }

    fn error_reported(&self, error: &ValidationError) {
        self.events.lock().unwrap().push(format!("error:{error}"));
    }
}

pub fn validator(
    session: &Arc<AccessSession>,
    discovery: Arc<dyn WebFingerDiscovery>,
    resolver: Arc<dyn UrlResolver>,
    auth: Arc<dyn AuthTypeResolver>,
) -> Validator {
    Validator::new(discovery, resolver, auth).with_session(session)
}
