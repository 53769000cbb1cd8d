//! Decoded client certificate record.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use x509_parser::prelude::*;

use super::decoder::DecodeError;

/// Hash used to fingerprint the DER encoding of a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbprintAlgorithm {
    /// SHA-1, the classic 40 hex digit thumbprint.
    #[default]
    Sha1,
    Sha256,
}

impl ThumbprintAlgorithm {
    /// Uppercase hex digest of `der`.
    pub fn thumbprint(&self, der: &[u8]) -> String {
        match self {
            ThumbprintAlgorithm::Sha1 => hex::encode_upper(Sha1::digest(der)),
            ThumbprintAlgorithm::Sha256 => hex::encode_upper(Sha256::digest(der)),
        }
    }

    /// Number of hex digits in a thumbprint.
    pub fn hex_len(&self) -> usize {
        match self {
            ThumbprintAlgorithm::Sha1 => 40,
            ThumbprintAlgorithm::Sha256 => 64,
        }
    }
}

impl fmt::Display for ThumbprintAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThumbprintAlgorithm::Sha1 => write!(f, "sha1"),
            ThumbprintAlgorithm::Sha256 => write!(f, "sha256"),
        }
    }
}

impl FromStr for ThumbprintAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "").as_str() {
            "sha1" => Ok(ThumbprintAlgorithm::Sha1),
            "sha256" => Ok(ThumbprintAlgorithm::Sha256),
            other => Err(format!("Unsupported thumbprint algorithm: {}", other)),
        }
    }
}

/// A parsed client certificate.
///
/// Built once per request from the forwarded header and dropped with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// Subject Distinguished Name, e.g. `CN=client1, O=Acme`.
    pub subject: String,
    /// Issuer Distinguished Name.
    pub issuer: String,
    /// Start of the validity window.
    pub not_before: DateTime<Utc>,
    /// End of the validity window.
    pub not_after: DateTime<Utc>,
    /// Uppercase hex hash of the DER bytes.
    pub thumbprint: String,
    /// Serial number, colon separated hex.
    pub serial: String,
    /// The DER encoding the record was parsed from.
    pub der: Vec<u8>,
}

impl Certificate {
    /// Parse exactly one DER encoded X.509 certificate.
    pub fn from_der(der: &[u8], algorithm: ThumbprintAlgorithm) -> Result<Self, DecodeError> {
        let (rest, cert) = X509Certificate::from_der(der)
            .map_err(|e| DecodeError::X509(format!("{:?}", e)))?;

        if !rest.is_empty() {
            return Err(DecodeError::TrailingData(rest.len()));
        }

        let serial = cert
            .serial
            .to_bytes_be()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(":");

        Ok(Self {
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            not_before: to_utc(cert.validity().not_before.timestamp())?,
            not_after: to_utc(cert.validity().not_after.timestamp())?,
            thumbprint: algorithm.thumbprint(der),
            serial,
            der: der.to_vec(),
        })
    }

    /// Base64 of the DER bytes, the form proxies forward in headers.
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.der)
    }
}

fn to_utc(timestamp: i64) -> Result<DateTime<Utc>, DecodeError> {
    DateTime::from_timestamp(timestamp, 0)
        .ok_or_else(|| DecodeError::X509(format!("validity timestamp out of range: {}", timestamp)))
}
