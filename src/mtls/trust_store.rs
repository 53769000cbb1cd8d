//! Operator trust stores, looked up by thumbprint.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use x509_parser::pem::Pem;

use super::certificate::{Certificate, ThumbprintAlgorithm};
use super::policy::thumbprints_equal;

/// File extensions the directory store reads.
const CERT_EXTENSIONS: &[&str] = &["pem", "crt", "cer", "der"];

/// Find a trusted certificate by thumbprint.
///
/// Implementations are read-only and must tolerate concurrent callers.
pub trait ThumbprintLookup: Send + Sync {
    /// Return the trusted certificate with this thumbprint, if any.
    fn find_by_thumbprint(&self, thumbprint: &str) -> Result<Option<Certificate>>;
}

/// Trust store backed by a directory of PEM or DER files.
///
/// The directory is re-read on every lookup so operators can add or remove
/// certificates without a restart.
#[derive(Debug, Clone)]
pub struct DirectoryTrustStore {
    dir: PathBuf,
    algorithm: ThumbprintAlgorithm,
}

impl DirectoryTrustStore {
    /// Open a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>, algorithm: ThumbprintAlgorithm) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(anyhow!("Trust store directory does not exist: {:?}", dir));
        }
        Ok(Self { dir, algorithm })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn load_file(&self, path: &Path) -> Result<Vec<Certificate>> {
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read trust store entry: {:?}", path))?;

        // DER starts with a SEQUENCE tag, anything else is treated as PEM
        if data.first() == Some(&0x30) {
            let cert = Certificate::from_der(&data, self.algorithm)?;
            return Ok(vec![cert]);
        }

        // Bad blocks in a bundle are skipped one at a time
        let mut certs = Vec::new();
        for (index, pem) in Pem::iter_from_buffer(&data).enumerate() {
            let pem = match pem {
                Ok(pem) => pem,
                Err(e) => {
                    warn!(path = ?path, block = index, error = ?e, "Invalid PEM, ignoring rest of file");
                    break;
                }
            };
            if pem.label != "CERTIFICATE" {
                continue;
            }
            match Certificate::from_der(&pem.contents, self.algorithm) {
                Ok(cert) => certs.push(cert),
                Err(e) => {
                    warn!(path = ?path, block = index, error = %e, "Skipping unparseable certificate in trust store");
                }
            }
        }
        Ok(certs)
    }
}

impl ThumbprintLookup for DirectoryTrustStore {
    fn find_by_thumbprint(&self, thumbprint: &str) -> Result<Option<Certificate>> {
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to open trust store: {:?}", self.dir))?;

        for entry in entries {
            let path = entry.context("Failed to read trust store directory")?.path();
            let is_cert_file = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| CERT_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false);
            if !is_cert_file || !path.is_file() {
                continue;
            }

            // A broken entry can only hide a certificate, never admit one
            let certs = match self.load_file(&path) {
                Ok(certs) => certs,
                Err(e) => {
                    warn!(path = ?path, error = %e, "Skipping unreadable trust store entry");
                    continue;
                }
            };

            if let Some(cert) = certs
                .into_iter()
                .find(|cert| thumbprints_equal(&cert.thumbprint, thumbprint))
            {
                debug!(path = ?path, thumbprint = %cert.thumbprint, "Found certificate in trust store");
                return Ok(Some(cert));
            }
        }

        Ok(None)
    }
}

/// Trust store held in memory, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryTrustStore {
    certs: Vec<Certificate>,
}

impl MemoryTrustStore {
    pub fn new(certs: Vec<Certificate>) -> Self {
        Self { certs }
    }
}

impl ThumbprintLookup for MemoryTrustStore {
    fn find_by_thumbprint(&self, thumbprint: &str) -> Result<Option<Certificate>> {
        Ok(self
            .certs
            .iter()
            .find(|cert| thumbprints_equal(&cert.thumbprint, thumbprint))
            .cloned())
    }
}
