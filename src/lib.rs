//! Client certificate gate for services behind a TLS-terminating proxy.
//!
//! The proxy forwards the client certificate in a request header; the gate
//! decodes it, checks it against a fixed policy and an operator trust
//! store, and either lets the request through or answers 403.

pub mod gate;
pub mod mtls;

pub use gate::{CertGate, GateOutcome};
pub use mtls::{Certificate, GateConfig, RejectReason, ValidationPolicy, Verdict};
