//! Turning free-form server-address text into a canonical base URL.
//!
//! The canonical URL is the stable identity of a server: it always carries a
//! scheme, never carries credentials and never carries a query.

use crate::error::InvalidUrlError;
use serde::Serialize;
use std::fmt;
use tracing::trace;
use url::Url;

pub const DEFAULT_SCHEME: &str = "https";

/// Validated, immutable server URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CanonicalUrl(Url);

impl CanonicalUrl {
    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    pub fn host_str(&self) -> Option<&str> {
        self.0.host_str()
    }

    pub fn port(&self) -> Option<u16> {
        self.0.port()
    }

    pub fn path(&self) -> &str {
        self.0.path()
    }

    pub fn fragment(&self) -> Option<&str> {
        self.0.fragment()
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    pub fn into_url(self) -> Url {
        self.0
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl AsRef<Url> for CanonicalUrl {
    fn as_ref(&self) -> &Url {
        &self.0
    }
}

/// Normalize `text` into a [`CanonicalUrl`].
///
/// A missing scheme defaults to `https`. The result is always the parse of
/// the (possibly prefixed) input string; a parsed value never has its scheme
/// rewritten. User-info and query are removed, and a non-empty
/// `path_override` replaces the path outright.
///
/// # Errors
///
/// Returns [`InvalidUrlError`] when the text does not parse as a URL.
pub fn normalize(text: &str, path_override: Option<&str>) -> Result<CanonicalUrl, InvalidUrlError> {
    let trimmed = text.trim();
    let explicit_scheme = has_explicit_scheme(trimmed);
    let candidate = if explicit_scheme {
        trimmed.to_string()
    } else {
        format!("{DEFAULT_SCHEME}://{trimmed}")
    };
    trace!(explicit_scheme, "normalizing server address");

    let mut url =
        Url::parse(&candidate).map_err(|e| InvalidUrlError::from_parser_message(&e.to_string()))?;

    // Both fail only for URLs without a host, which carry no user-info anyway.
    let _ = url.set_username("");
    let _ = url.set_password(None);
    url.set_query(None);

    if let Some(path) = path_override.filter(|p| !p.is_empty())
        && !url.cannot_be_a_base()
    {
        url.set_path(path);
    }

    Ok(CanonicalUrl(url))
}

/// Whether `text` starts with an RFC 3986 scheme followed by `:`.
///
/// `host:port` is not a scheme: `example.com:8443/dav` is treated as a
/// scheme-less address.
pub(crate) fn has_explicit_scheme(text: &str) -> bool {
    let Some((scheme, rest)) = text.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    let valid_scheme = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid_scheme && !looks_like_port(rest)
}

fn looks_like_port(rest: &str) -> bool {
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let port = &rest[..end];
    !port.is_empty() && port.chars().all(|c| c.is_ascii_digit())
}
