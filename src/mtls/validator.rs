//! Client certificate validation.
//!
//! Checks run in a fixed order and the first failure decides the verdict:
//! validity window, subject, issuer, thumbprint, then the trust store
//! lookup, which is the only check that touches anything outside memory.

use chrono::{DateTime, Utc};
use std::fmt;
use tracing::{debug, warn};

use super::certificate::Certificate;
use super::policy::{thumbprints_equal, ValidationPolicy};
use super::trust_store::ThumbprintLookup;

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    MissingHeader,
    DecodeFailure,
    NotYetValid,
    Expired,
    SubjectMismatch,
    IssuerMismatch,
    ThumbprintMismatch,
    NotInTrustStore,
}

impl RejectReason {
    /// Stable code for audit logs.
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::MissingHeader => "MISSING_HEADER",
            RejectReason::DecodeFailure => "DECODE_FAILURE",
            RejectReason::NotYetValid => "NOT_YET_VALID",
            RejectReason::Expired => "EXPIRED",
            RejectReason::SubjectMismatch => "SUBJECT_MISMATCH",
            RejectReason::IssuerMismatch => "ISSUER_MISMATCH",
            RejectReason::ThumbprintMismatch => "THUMBPRINT_MISMATCH",
            RejectReason::NotInTrustStore => "NOT_IN_TRUST_STORE",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Outcome of checking one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Admit,
    Reject(RejectReason),
}

impl Verdict {
    pub fn is_admit(&self) -> bool {
        matches!(self, Verdict::Admit)
    }

    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            Verdict::Admit => None,
            Verdict::Reject(reason) => Some(*reason),
        }
    }
}

impl From<Result<(), RejectReason>> for Verdict {
    fn from(result: Result<(), RejectReason>) -> Self {
        match result {
            Ok(()) => Verdict::Admit,
            Err(reason) => Verdict::Reject(reason),
        }
    }
}

/// Validate a client certificate against the policy as of now.
pub fn validate(
    cert: &Certificate,
    policy: &ValidationPolicy,
    trust_store: &dyn ThumbprintLookup,
) -> Verdict {
    validate_at(cert, policy, trust_store, Utc::now())
}

/// Validate a client certificate against the policy at a given instant.
pub fn validate_at(
    cert: &Certificate,
    policy: &ValidationPolicy,
    trust_store: &dyn ThumbprintLookup,
    now: DateTime<Utc>,
) -> Verdict {
    run_checks(cert, policy, trust_store, now).into()
}

fn run_checks(
    cert: &Certificate,
    policy: &ValidationPolicy,
    trust_store: &dyn ThumbprintLookup,
    now: DateTime<Utc>,
) -> Result<(), RejectReason> {
    // 1. Validity window, both ends inclusive
    if now < cert.not_before {
        return Err(RejectReason::NotYetValid);
    }
    if now > cert.not_after {
        return Err(RejectReason::Expired);
    }

    // 2. Subject
    if !policy.subject_matches(&cert.subject) {
        debug!(subject = %cert.subject, expected = %policy.expected_subject, "Subject mismatch");
        return Err(RejectReason::SubjectMismatch);
    }

    // 3. Issuer
    if !policy.issuer_matches(&cert.issuer) {
        debug!(issuer = %cert.issuer, expected = %policy.expected_issuer, "Issuer mismatch");
        return Err(RejectReason::IssuerMismatch);
    }

    // 4. Thumbprint
    if !policy.thumbprint_matches(&cert.thumbprint) {
        return Err(RejectReason::ThumbprintMismatch);
    }

    // 5. Trust store
    confirm_in_trust_store(cert, policy, trust_store)
}

fn confirm_in_trust_store(
    cert: &Certificate,
    policy: &ValidationPolicy,
    trust_store: &dyn ThumbprintLookup,
) -> Result<(), RejectReason> {
    let trusted = match trust_store.find_by_thumbprint(policy.expected_thumbprint.trim()) {
        Ok(Some(trusted)) => trusted,
        Ok(None) => {
            debug!(thumbprint = %policy.expected_thumbprint, "Expected certificate not in trust store");
            return Err(RejectReason::NotInTrustStore);
        }
        Err(e) => {
            warn!(error = %e, "Trust store lookup failed");
            return Err(RejectReason::NotInTrustStore);
        }
    };

    if !thumbprints_equal(&trusted.thumbprint, &cert.thumbprint) {
        warn!(
            presented = %cert.thumbprint,
            trusted = %trusted.thumbprint,
            "Trust store certificate does not match presented certificate"
        );
        return Err(RejectReason::NotInTrustStore);
    }

    Ok(())
}
