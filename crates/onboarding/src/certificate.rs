use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rustls_pki_types::CertificateDer;
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;
use x509_parser::prelude::*;

/// A certificate the user explicitly chose to trust, kept as DER bytes.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Certificate {
    der: Vec<u8>,
}

pub type CertificateSet = BTreeSet<Certificate>;

impl Certificate {
    pub fn from_der(der: impl Into<Vec<u8>>) -> Self {
        Self { der: der.into() }
    }

    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    pub fn to_certificate_der(&self) -> CertificateDer<'static> {
        CertificateDer::from(self.der.clone())
    }

    pub fn sha256_fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.der);
        format!("{:X}", hasher.finalize())
    }

    /// Summary for trust prompts and logs. `None` when the bytes are not X509.
    pub fn info(&self) -> Option<CertificateInfo> {
        let (_, parsed) = X509Certificate::from_der(&self.der).ok()?;
        let dns_names = match parsed.subject_alternative_name() {
            Ok(Some(san)) => san
                .value
                .general_names
                .iter()
                .filter_map(|name| match name {
                    GeneralName::DNSName(dns) => Some(dns.to_string()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        Some(CertificateInfo {
            subject_common_name: first_common_name(parsed.subject()),
            issuer_common_name: first_common_name(parsed.issuer()),
            sha256_fingerprint: self.sha256_fingerprint(),
            dns_names,
        })
    }
}

impl From<CertificateDer<'_>> for Certificate {
    fn from(der: CertificateDer<'_>) -> Self {
        Self::from_der(der.as_ref())
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("sha256", &self.sha256_fingerprint())
            .finish()
    }
}

/// Serialized as base64 DER so account persistence can store it verbatim.
impl Serialize for Certificate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.der))
    }
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateInfo {
    pub subject_common_name: String,
    pub issuer_common_name: String,
    pub sha256_fingerprint: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dns_names: Vec<String>,
}

fn first_common_name(name: &X509Name<'_>) -> String {
    name.iter_common_name()
        .find_map(|attr| attr.as_str().ok())
        .unwrap_or("Unknown")
        .to_string()
}
