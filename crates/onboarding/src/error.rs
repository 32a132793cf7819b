use serde::Serialize;
use thiserror::Error;

/// Structural parse failure of a server address.
///
/// The message is the first `;`-separated segment of the URL parser's message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid server URL: {message}")]
pub struct InvalidUrlError {
    message: String,
}

impl InvalidUrlError {
    pub fn from_parser_message(full: &str) -> Self {
        let message = full
            .split(';')
            .map(str::trim)
            .find(|part| !part.is_empty())
            .unwrap_or("unknown parse error")
            .to_string();
        Self { message }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "PascalCase")]
pub enum ErrorKind {
    InvalidUrlSyntax,
    UnsupportedScheme,
    ResolverFailure,
    QueryNotAllowed,
    AuthCheckFailure,
    SessionUnavailable,
    Busy,
    Cancelled,
}

/// Terminal failure of one validation attempt. None of these are retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error(transparent)]
    InvalidUrlSyntax(#[from] InvalidUrlError),
    #[error("Invalid URL scheme. Only https is accepted.")]
    UnsupportedScheme { scheme: String },
    #[error("{0}")]
    ResolverFailure(String),
    #[error("The requested URL failed with query value: {0}")]
    QueryNotAllowed(String),
    #[error("{0}")]
    AuthCheckFailure(String),
    #[error("No valid access session is available")]
    SessionUnavailable,
    #[error("A validation attempt is already running for this session")]
    Busy,
    #[error("The validation attempt was cancelled")]
    Cancelled,
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::InvalidUrlSyntax(_) => ErrorKind::InvalidUrlSyntax,
            ValidationError::UnsupportedScheme { .. } => ErrorKind::UnsupportedScheme,
            ValidationError::ResolverFailure(_) => ErrorKind::ResolverFailure,
            ValidationError::QueryNotAllowed(_) => ErrorKind::QueryNotAllowed,
            ValidationError::AuthCheckFailure(_) => ErrorKind::AuthCheckFailure,
            ValidationError::SessionUnavailable => ErrorKind::SessionUnavailable,
            ValidationError::Busy => ErrorKind::Busy,
            ValidationError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// Errors reported by the network collaborators (discovery, resolver, auth check).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("TLS error: {0}")]
    Tls(String),
    #[error("Untrusted certificate for {host} was rejected")]
    UntrustedCertificate { host: String },
    #[error("Network timeout after {0:?}")]
    Timeout(std::time::Duration),
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP status {status}: {context}")]
    Http { status: u16, context: String },
    #[error("JSON parse error: {0}")]
    Json(String),
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),
    #[error("Redirect loop or too many redirects (limit {0})")]
    RedirectLimit(usize),
    #[error("Service not found")]
    NotFound,
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Timeout(_) | FetchError::Network(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("TLS configuration error: {0}")]
    Tls(String),
    #[error("Access session has been closed")]
    Closed,
}
