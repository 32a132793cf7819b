use crate::certificate::CertificateSet;
use crate::error::{ErrorKind, ValidationError};
use serde::{Serialize, Serializer};
use std::fmt;
use url::Url;

/// Pipeline position of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Start,
    Normalizing,
    SchemeCheck,
    WebFingerProbe,
    Resolve,
    QueryCheck,
    CertMerge,
    AuthCheck,
    Success,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Aggregate result of one attempt. Either a success (base URL set, no error)
/// or a failure (error set, no base URL), never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationOutcome {
    base_server_url: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    webfinger_service_url: Option<Url>,
    certificates: CertificateSet,
    #[serde(serialize_with = "serialize_error", skip_serializing_if = "Option::is_none")]
    error: Option<ValidationError>,
}

#[derive(Serialize)]
struct ErrorRepr {
    kind: ErrorKind,
    message: String,
}

fn serialize_error<S: Serializer>(
    error: &Option<ValidationError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    error
        .as_ref()
        .map(|e| ErrorRepr {
            kind: e.kind(),
            message: e.to_string(),
        })
        .serialize(serializer)
}

impl ValidationOutcome {
    pub(crate) fn success(
        base_server_url: Url,
        webfinger_service_url: Option<Url>,
        certificates: CertificateSet,
    ) -> Self {
        Self {
            base_server_url: Some(base_server_url),
            webfinger_service_url,
            certificates,
            error: None,
        }
    }

    pub(crate) fn failure(error: ValidationError, certificates: CertificateSet) -> Self {
        Self {
            base_server_url: None,
            webfinger_service_url: None,
            certificates,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn base_server_url(&self) -> Option<&Url> {
        self.base_server_url.as_ref()
    }

    pub fn webfinger_service_url(&self) -> Option<&Url> {
        self.webfinger_service_url.as_ref()
    }

    /// Certificates accepted during this attempt, for the account to persist.
    pub fn certificates(&self) -> &CertificateSet {
        &self.certificates
    }

    pub fn error(&self) -> Option<&ValidationError> {
        self.error.as_ref()
    }
}

/// The single terminal event of an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationEvent {
    Success(ValidationOutcome),
    Failure(ValidationOutcome),
}

impl ValidationEvent {
    pub fn is_success(&self) -> bool {
        matches!(self, ValidationEvent::Success(_))
    }

    pub fn outcome(&self) -> &ValidationOutcome {
        match self {
            ValidationEvent::Success(outcome) | ValidationEvent::Failure(outcome) => outcome,
        }
    }

    pub fn into_outcome(self) -> ValidationOutcome {
        match self {
            ValidationEvent::Success(outcome) | ValidationEvent::Failure(outcome) => outcome,
        }
    }

    pub fn error(&self) -> Option<&ValidationError> {
        self.outcome().error()
    }

    pub fn into_result(self) -> Result<ValidationOutcome, ValidationOutcome> {
        match self {
            ValidationEvent::Success(outcome) => Ok(outcome),
            ValidationEvent::Failure(outcome) => Err(outcome),
        }
    }
}

impl From<ValidationOutcome> for ValidationEvent {
    fn from(outcome: ValidationOutcome) -> Self {
        if outcome.is_success() {
            ValidationEvent::Success(outcome)
        } else {
            ValidationEvent::Failure(outcome)
        }
    }
}
