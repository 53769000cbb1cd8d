//! Certificate gate configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::certificate::ThumbprintAlgorithm;
use super::policy::ValidationPolicy;

/// Client certificate gate configuration.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Header containing the client certificate (from proxy).
    /// Default: X-ARR-ClientCert
    pub client_cert_header: String,

    /// Component required in the subject DN, e.g. `CN=client1`.
    pub expected_subject: String,

    /// Component required in the issuer DN, e.g. `CN=TestCA`.
    pub expected_issuer: String,

    /// Hex thumbprint of the admitted certificate (any case).
    pub expected_thumbprint: String,

    /// Hash used for thumbprints.
    pub thumbprint_algorithm: ThumbprintAlgorithm,

    /// Directory of trusted certificates (PEM or DER).
    pub trust_store_dir: Option<PathBuf>,

    /// Log certificate details for debugging.
    pub log_certs: bool,
}

fn default_cert_header() -> String {
    "X-ARR-ClientCert".to_string()
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            client_cert_header: default_cert_header(),
            expected_subject: String::new(),
            expected_issuer: String::new(),
            expected_thumbprint: String::new(),
            thumbprint_algorithm: ThumbprintAlgorithm::default(),
            trust_store_dir: None,
            log_certs: false,
        }
    }
}

impl GateConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.client_cert_header.trim().is_empty() {
            return Err("client certificate header name is empty".to_string());
        }
        if self.expected_subject.trim().is_empty() {
            return Err("expected subject is not configured".to_string());
        }
        if self.expected_issuer.trim().is_empty() {
            return Err("expected issuer is not configured".to_string());
        }

        let thumbprint = self.expected_thumbprint.trim();
        if thumbprint.is_empty() {
            return Err("expected thumbprint is not configured".to_string());
        }
        if thumbprint.len() != self.thumbprint_algorithm.hex_len()
            || !thumbprint.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(format!(
                "expected thumbprint must be {} hex digits for {}",
                self.thumbprint_algorithm.hex_len(),
                self.thumbprint_algorithm
            ));
        }

        match self.trust_store_dir {
            None => return Err("trust store directory is not configured".to_string()),
            Some(ref path) if !path.is_dir() => {
                return Err(format!("Trust store directory does not exist: {:?}", path));
            }
            Some(_) => {}
        }

        Ok(())
    }

    /// Build the validation policy from this configuration.
    pub fn policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            expected_subject: self.expected_subject.trim().to_string(),
            expected_issuer: self.expected_issuer.trim().to_string(),
            expected_thumbprint: self.expected_thumbprint.trim().to_string(),
            thumbprint_algorithm: self.thumbprint_algorithm,
        }
    }
}

/// JSON configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct GateConfigJson {
    pub client_cert_header: Option<String>,
    pub expected_subject: Option<String>,
    pub expected_issuer: Option<String>,
    pub expected_thumbprint: Option<String>,
    pub thumbprint_algorithm: Option<ThumbprintAlgorithm>,
    pub trust_store_dir: Option<String>,
    pub log_certs: Option<bool>,
}

impl GateConfigJson {
    /// Load from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Apply JSON config to existing config.
    pub fn apply_to(&self, config: &mut GateConfig) {
        if let Some(ref header) = self.client_cert_header {
            config.client_cert_header = header.clone();
        }
        if let Some(ref subject) = self.expected_subject {
            config.expected_subject = subject.clone();
        }
        if let Some(ref issuer) = self.expected_issuer {
            config.expected_issuer = issuer.clone();
        }
        if let Some(ref thumbprint) = self.expected_thumbprint {
            config.expected_thumbprint = thumbprint.clone();
        }
        if let Some(algorithm) = self.thumbprint_algorithm {
            config.thumbprint_algorithm = algorithm;
        }
        if let Some(ref path) = self.trust_store_dir {
            config.trust_store_dir = Some(PathBuf::from(path));
        }
        if let Some(log) = self.log_certs {
            config.log_certs = log;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn valid_config(dir: &Path) -> GateConfig {
        GateConfig {
            expected_subject: "CN=client1".to_string(),
            expected_issuer: "CN=TestCA".to_string(),
            expected_thumbprint: "aa11bb22cc33dd44ee55ff6600112233445566aa".to_string(),
            trust_store_dir: Some(dir.to_path_buf()),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = GateConfig::default();
        assert_eq!(config.client_cert_header, "X-ARR-ClientCert");
        assert_eq!(config.thumbprint_algorithm, ThumbprintAlgorithm::Sha1);
        assert!(!config.log_certs);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_config() {
        let dir = tempdir().unwrap();
        assert!(valid_config(dir.path()).validate().is_ok());
    }

    #[test]
    fn test_thumbprint_shape() {
        let dir = tempdir().unwrap();

        let mut config = valid_config(dir.path());
        config.expected_thumbprint = "xyz".to_string();
        assert!(config.validate().is_err());

        // 40 digits is SHA-1 sized, not SHA-256
        let mut config = valid_config(dir.path());
        config.thumbprint_algorithm = ThumbprintAlgorithm::Sha256;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_trust_store() {
        let dir = tempdir().unwrap();

        let mut config = valid_config(dir.path());
        config.trust_store_dir = None;
        assert!(config.validate().is_err());

        config.trust_store_dir = Some(dir.path().join("missing"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_policy_trims_values() {
        let dir = tempdir().unwrap();
        let mut config = valid_config(dir.path());
        config.expected_subject = " CN=client1 ".to_string();
        config.expected_thumbprint = " AA11 ".to_string();

        let policy = config.policy();
        assert_eq!(policy.expected_subject, "CN=client1");
        assert_eq!(policy.expected_thumbprint, "AA11");
    }

    #[test]
    fn test_json_apply() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "client-cert-header": "X-Client-Cert",
                "expected-subject": "CN=client1",
                "expected-issuer": "CN=TestCA",
                "thumbprint-algorithm": "sha256",
                "trust-store-dir": "/etc/certgate/trusted"
            }}"#
        )
        .unwrap();

        let json = GateConfigJson::from_file(file.path()).unwrap();
        let mut config = GateConfig::default();
        json.apply_to(&mut config);

        assert_eq!(config.client_cert_header, "X-Client-Cert");
        assert_eq!(config.expected_subject, "CN=client1");
        assert_eq!(config.expected_issuer, "CN=TestCA");
        assert_eq!(config.thumbprint_algorithm, ThumbprintAlgorithm::Sha256);
        assert_eq!(config.trust_store_dir, Some(PathBuf::from("/etc/certgate/trusted")));
        assert!(config.expected_thumbprint.is_empty());
    }

    #[test]
    fn test_json_misspelled_key_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"expected-subjet": "CN=client1"}}"#).unwrap();

        let err = GateConfigJson::from_file(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("expected-subjet"));
    }

    #[test]
    fn test_json_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(GateConfigJson::from_file(file.path()).is_err());
    }
}
