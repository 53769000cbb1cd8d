//! Certificate acceptance policy.

use super::certificate::ThumbprintAlgorithm;

/// What a client certificate must look like to be admitted.
///
/// Built once at startup and shared read-only between requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// A component that must appear in the subject DN, e.g. `CN=client1`.
    pub expected_subject: String,
    /// A component that must appear in the issuer DN, e.g. `CN=TestCA`.
    pub expected_issuer: String,
    /// Hex thumbprint of the one certificate allowed through.
    pub expected_thumbprint: String,
    /// Hash the thumbprints are computed with.
    pub thumbprint_algorithm: ThumbprintAlgorithm,
}

impl ValidationPolicy {
    /// Check if the subject DN carries the expected component.
    pub fn subject_matches(&self, subject_dn: &str) -> bool {
        dn_has_component(subject_dn, &self.expected_subject)
    }

    /// Check if the issuer DN carries the expected component.
    pub fn issuer_matches(&self, issuer_dn: &str) -> bool {
        dn_has_component(issuer_dn, &self.expected_issuer)
    }

    /// Check a thumbprint against the expected one, ignoring case.
    pub fn thumbprint_matches(&self, thumbprint: &str) -> bool {
        thumbprints_equal(thumbprint, &self.expected_thumbprint)
    }
}

/// Component-wise DN match: split on commas, trim, compare exactly.
///
/// Only presence is checked, so `CN=a, O=b` carries both `CN=a` and `O=b`.
pub fn dn_has_component(dn: &str, expected: &str) -> bool {
    dn.split(',')
        .map(str::trim)
        .filter(|component| !component.is_empty())
        .any(|component| component == expected)
}

/// Thumbprints compare ASCII case-insensitively after trimming.
pub fn thumbprints_equal(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
