//! Forwarded certificate header decoding.

use base64::{engine::general_purpose::STANDARD, Engine};
use thiserror::Error;

use super::certificate::{Certificate, ThumbprintAlgorithm};

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

/// Why a header value could not be turned into a certificate.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("certificate payload is empty")]
    Empty,
    #[error("invalid PEM: {0}")]
    Pem(&'static str),
    #[error("failed to base64 decode certificate: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("failed to parse X.509 certificate: {0}")]
    X509(String),
    #[error("{0} trailing bytes after certificate")]
    TrailingData(usize),
}

/// Decode a forwarded certificate header into a [`Certificate`].
///
/// Accepts base64 DER as forwarded by most proxies, plus URL-encoded and
/// PEM-armored variants. Callers handle the missing-header case before
/// getting here.
pub fn decode(header_value: &str, algorithm: ThumbprintAlgorithm) -> Result<Certificate, DecodeError> {
    let der = decode_cert_data(header_value)?;
    Certificate::from_der(&der, algorithm)
}

/// Turn header text into DER bytes.
fn decode_cert_data(data: &str) -> Result<Vec<u8>, DecodeError> {
    let data = data.trim();
    if data.is_empty() {
        return Err(DecodeError::Empty);
    }

    // Proxies often URL-encode PEM (nginx $ssl_client_escaped_cert)
    let decoded = if data.contains('%') {
        urlencoding::decode(data)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| data.to_string())
    } else {
        data.to_string()
    };

    let body = if decoded.contains(PEM_BEGIN) {
        strip_pem_armor(&decoded)?
    } else {
        decoded.as_str()
    };

    let base64_content: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    if base64_content.is_empty() {
        return Err(DecodeError::Empty);
    }

    Ok(STANDARD.decode(base64_content.as_bytes())?)
}

fn strip_pem_armor(pem: &str) -> Result<&str, DecodeError> {
    let start = pem
        .find(PEM_BEGIN)
        .ok_or(DecodeError::Pem("missing BEGIN marker"))?;
    let body_start = start + PEM_BEGIN.len();
    let end = pem[body_start..]
        .find(PEM_END)
        .ok_or(DecodeError::Pem("missing END marker"))?;

    if pem[body_start + end + PEM_END.len()..].contains(PEM_BEGIN) {
        return Err(DecodeError::Pem("more than one certificate"));
    }

    Ok(&pem[body_start..body_start + end])
}
