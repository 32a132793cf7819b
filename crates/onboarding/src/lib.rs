//! Server discovery and authentication resolution for account onboarding.
//!
//! Given free-form server-address text, this library produces a canonical base
//! server URL and confirms the server supports OAuth sign-in. It probes WebFinger
//! first and falls back to redirect resolution plus an auth type check, keeping
//! certificates accepted on first use in the caller's [`session::AccessSession`].
//!
//! The network probes themselves are collaborators behind the traits in
//! [`collaborators`].

pub mod certificate;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod normalize;
pub mod observer;
pub mod outcome;
pub mod session;
pub mod validation;

pub use certificate::{Certificate, CertificateInfo, CertificateSet};
pub use collaborators::{
    AcceptUntrusted, AuthTypeResolver, AuthenticationType, RejectUntrusted, ResolvedUrl,
    TrustDecision, TrustPrompt, TrustRequest, UrlResolver, WebFingerDiscovery, WebFingerService,
};
pub use error::{ErrorKind, FetchError, InvalidUrlError, SessionError, ValidationError};
pub use normalize::{CanonicalUrl, normalize};
pub use outcome::{Stage, ValidationEvent, ValidationOutcome};
pub use session::{AccessSession, SessionContext};
pub use validation::{PendingValidation, Validator, ensure_https};
