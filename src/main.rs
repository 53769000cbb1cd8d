//! Certificate Gate Agent
//!
//! Forward-auth service that admits requests only when the proxy forwards
//! the expected client certificate.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use certgate_agent::gate::{self, CertGate};
use certgate_agent::mtls::{GateConfig, GateConfigJson, ThumbprintAlgorithm};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "certgate-agent")]
#[command(about = "Client certificate gate for services behind a TLS-terminating proxy")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:9090", env = "CERTGATE_LISTEN")]
    listen: SocketAddr,

    /// JSON configuration file
    #[arg(long, env = "CERTGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Header carrying the forwarded client certificate
    #[arg(long, env = "CERTGATE_CERT_HEADER")]
    cert_header: Option<String>,

    /// Component required in the subject DN (e.g. CN=client1)
    #[arg(long, env = "CERTGATE_EXPECTED_SUBJECT")]
    expected_subject: Option<String>,

    /// Component required in the issuer DN (e.g. CN=TestCA)
    #[arg(long, env = "CERTGATE_EXPECTED_ISSUER")]
    expected_issuer: Option<String>,

    /// Hex thumbprint of the admitted certificate
    #[arg(long, env = "CERTGATE_EXPECTED_THUMBPRINT")]
    expected_thumbprint: Option<String>,

    /// Thumbprint hash (sha1, sha256)
    #[arg(long, env = "CERTGATE_THUMBPRINT_ALGORITHM")]
    thumbprint_algorithm: Option<ThumbprintAlgorithm>,

    /// Directory of trusted certificates
    #[arg(long, env = "CERTGATE_TRUST_STORE_DIR")]
    trust_store_dir: Option<PathBuf>,

    /// Log certificate details
    #[arg(long, env = "CERTGATE_LOG_CERTS")]
    log_certs: bool,

    /// Enable verbose logging
    #[arg(short, long, env = "CERTGATE_VERBOSE")]
    verbose: bool,
}

/// File config first, then command line and environment on top.
fn build_config(args: &Args) -> Result<GateConfig> {
    let mut config = GateConfig::default();

    if let Some(ref path) = args.config {
        GateConfigJson::from_file(path)?.apply_to(&mut config);
    }

    if let Some(ref header) = args.cert_header {
        config.client_cert_header = header.clone();
    }
    if let Some(ref subject) = args.expected_subject {
        config.expected_subject = subject.clone();
    }
    if let Some(ref issuer) = args.expected_issuer {
        config.expected_issuer = issuer.clone();
    }
    if let Some(ref thumbprint) = args.expected_thumbprint {
        config.expected_thumbprint = thumbprint.clone();
    }
    if let Some(algorithm) = args.thumbprint_algorithm {
        config.thumbprint_algorithm = algorithm;
    }
    if let Some(ref dir) = args.trust_store_dir {
        config.trust_store_dir = Some(dir.clone());
    }
    if args.log_certs {
        config.log_certs = true;
    }

    Ok(config)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("{}={}", env!("CARGO_CRATE_NAME"), log_level))
        .json()
        .init();

    info!("Starting Certificate Gate Agent");

    let config = build_config(&args)?;
    let gate = CertGate::from_config(&config)?;

    info!(
        header = %gate.header_name(),
        expected_subject = %config.expected_subject,
        expected_issuer = %config.expected_issuer,
        thumbprint_algorithm = %config.thumbprint_algorithm,
        trust_store = ?config.trust_store_dir,
        "Configuration loaded"
    );

    let app = gate::router(Arc::new(gate));
    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("Failed to bind {}", args.listen))?;

    info!(listen = %args.listen, "Starting forward-auth server");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_args_override_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"expected-subject": "CN=from-file", "expected-issuer": "CN=FileCA"}}"#
        )
        .unwrap();

        let args = Args::parse_from([
            "certgate-agent",
            "--config",
            file.path().to_str().unwrap(),
            "--expected-subject",
            "CN=from-args",
            "--thumbprint-algorithm",
            "sha256",
        ]);
        let config = build_config(&args).unwrap();

        assert_eq!(config.expected_subject, "CN=from-args");
        assert_eq!(config.expected_issuer, "CN=FileCA");
        assert_eq!(config.thumbprint_algorithm, ThumbprintAlgorithm::Sha256);
        assert_eq!(config.client_cert_header, "X-ARR-ClientCert");
    }

    #[test]
    fn test_missing_config_file() {
        let args = Args::parse_from(["certgate-agent", "--config", "/nonexistent/certgate.json"]);
        assert!(build_config(&args).is_err());
    }
}
