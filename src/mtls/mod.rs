//! Forwarded client certificate validation.
//!
//! Validates X.509 certificates passed from the proxy after TLS
//! termination against a fixed policy and an operator trust store.

pub mod certificate;
pub mod config;
pub mod decoder;
pub mod policy;
pub mod trust_store;
pub mod validator;

#[cfg(test)]
pub(crate) mod testing;

pub use certificate::{Certificate, ThumbprintAlgorithm};
pub use config::{GateConfig, GateConfigJson};
pub use decoder::{decode, DecodeError};
pub use policy::ValidationPolicy;
pub use trust_store::{DirectoryTrustStore, MemoryTrustStore, ThumbprintLookup};
pub use validator::{validate, validate_at, RejectReason, Verdict};
