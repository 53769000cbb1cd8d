//! Request gate.
//!
//! Pulls the forwarded certificate out of the request headers, runs it
//! through the decoder and validator, and turns the verdict into "continue"
//! or 403. Rejections never tell the client why.

use anyhow::{anyhow, Context, Result};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::mtls::{
    decode, validate, DirectoryTrustStore, GateConfig, RejectReason, ThumbprintLookup,
    ValidationPolicy, Verdict,
};

/// Response header carrying the admitted certificate's thumbprint.
pub const THUMBPRINT_HEADER: &str = "x-client-cert-thumbprint";

/// Result of inspecting one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateOutcome {
    pub verdict: Verdict,
    /// Thumbprint of the presented certificate, when it decoded.
    pub thumbprint: Option<String>,
}

impl GateOutcome {
    fn rejected(reason: RejectReason, thumbprint: Option<String>) -> Self {
        Self {
            verdict: Verdict::Reject(reason),
            thumbprint,
        }
    }
}

/// Client certificate gate shared by all requests.
pub struct CertGate {
    header: HeaderName,
    policy: ValidationPolicy,
    trust_store: Arc<dyn ThumbprintLookup>,
    log_certs: bool,
}

impl CertGate {
    pub fn new(
        header_name: &str,
        policy: ValidationPolicy,
        trust_store: Arc<dyn ThumbprintLookup>,
    ) -> Result<Self> {
        let header = HeaderName::from_bytes(header_name.trim().as_bytes())
            .with_context(|| format!("Invalid client certificate header name: {:?}", header_name))?;

        Ok(Self {
            header,
            policy,
            trust_store,
            log_certs: false,
        })
    }

    /// Build a gate backed by the configured trust store directory.
    pub fn from_config(config: &GateConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow!("Invalid certificate gate configuration: {}", e))?;

        let dir = config
            .trust_store_dir
            .as_ref()
            .ok_or_else(|| anyhow!("trust store directory is not configured"))?;
        let store = DirectoryTrustStore::open(dir, config.thumbprint_algorithm)?;

        let gate = Self::new(&config.client_cert_header, config.policy(), Arc::new(store))?;
        Ok(gate.with_log_certs(config.log_certs))
    }

    /// Log subject and issuer of every decoded certificate at debug level.
    pub fn with_log_certs(mut self, log_certs: bool) -> Self {
        self.log_certs = log_certs;
        self
    }

    pub fn header_name(&self) -> &HeaderName {
        &self.header
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// Inspect request headers. Header names match case-insensitively.
    pub fn inspect(&self, headers: &HeaderMap) -> GateOutcome {
        self.inspect_header(headers.get(&self.header))
    }

    /// Inspect on the blocking pool, for use from async handlers.
    ///
    /// Trust store lookups may hit the filesystem, so they stay off the
    /// runtime workers. A panic while decoding or validating is a reject.
    pub async fn inspect_blocking(self: Arc<Self>, headers: &HeaderMap) -> GateOutcome {
        let value = headers.get(&self.header).cloned();
        match tokio::task::spawn_blocking(move || self.inspect_header(value.as_ref())).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, reason = %RejectReason::NotInTrustStore, "Client certificate check aborted");
                GateOutcome::rejected(RejectReason::NotInTrustStore, None)
            }
        }
    }

    fn inspect_header(&self, value: Option<&HeaderValue>) -> GateOutcome {
        match value.map(|value| value.to_str()) {
            None => self.inspect_value(None),
            Some(Ok(value)) => self.inspect_value(Some(value)),
            Some(Err(_)) => {
                warn!(header = %self.header, reason = %RejectReason::DecodeFailure, "Client certificate header is not valid text");
                GateOutcome::rejected(RejectReason::DecodeFailure, None)
            }
        }
    }

    /// Inspect a raw header value, `None` when the header was absent.
    pub fn inspect_value(&self, value: Option<&str>) -> GateOutcome {
        let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            debug!(header = %self.header, reason = %RejectReason::MissingHeader, "Client certificate header is missing");
            return GateOutcome::rejected(RejectReason::MissingHeader, None);
        };

        let cert = match decode(value, self.policy.thumbprint_algorithm) {
            Ok(cert) => cert,
            Err(e) => {
                warn!(error = %e, reason = %RejectReason::DecodeFailure, "Failed to decode client certificate");
                return GateOutcome::rejected(RejectReason::DecodeFailure, None);
            }
        };

        if self.log_certs {
            debug!(
                subject = %cert.subject,
                issuer = %cert.issuer,
                serial = %cert.serial,
                not_before = %cert.not_before,
                not_after = %cert.not_after,
                "Parsed client certificate"
            );
        }

        let verdict = validate(&cert, &self.policy, self.trust_store.as_ref());
        match verdict {
            Verdict::Admit => {
                info!(thumbprint = %cert.thumbprint, "Client certificate accepted");
            }
            Verdict::Reject(reason) => {
                info!(thumbprint = %cert.thumbprint, reason = %reason, "Client certificate is not valid");
            }
        }

        GateOutcome {
            verdict,
            thumbprint: Some(cert.thumbprint),
        }
    }
}

/// Middleware that only lets requests with an accepted certificate through.
///
/// ```ignore
/// let app = Router::new()
///     .route("/api/todo", get(handler))
///     .layer(middleware::from_fn_with_state(gate, require_client_cert));
/// ```
pub async fn require_client_cert(
    State(gate): State<Arc<CertGate>>,
    request: Request,
    next: Next,
) -> Response {
    let outcome = gate.inspect_blocking(request.headers()).await;
    if outcome.verdict.is_admit() {
        next.run(request).await
    } else {
        forbidden()
    }
}

/// Put `router` behind the certificate gate.
pub fn protect(router: Router, gate: Arc<CertGate>) -> Router {
    router.layer(middleware::from_fn_with_state(gate, require_client_cert))
}

/// Forward-auth service for proxies that ask before forwarding.
///
/// `/healthz` is open; every other request is answered 200 or 403.
pub fn router(gate: Arc<CertGate>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .fallback(forward_auth)
        .with_state(gate)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn forward_auth(State(gate): State<Arc<CertGate>>, headers: HeaderMap) -> Response {
    let outcome = gate.inspect_blocking(&headers).await;
    match (outcome.verdict, outcome.thumbprint) {
        (Verdict::Admit, Some(thumbprint)) => {
            (StatusCode::OK, [(THUMBPRINT_HEADER, thumbprint)]).into_response()
        }
        (Verdict::Admit, None) => StatusCode::OK.into_response(),
        (Verdict::Reject(_), _) => forbidden(),
    }
}

fn forbidden() -> Response {
    (StatusCode::FORBIDDEN, "Forbidden").into_response()
}
