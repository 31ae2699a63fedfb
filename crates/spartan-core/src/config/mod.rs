//! Configuration types for Spartan.
//!
//! A single YAML file (`spartan.yaml`) can hold every section; each binary
//! reads the sections it needs and validates them before use.
//!
//! ```yaml
//! keys:
//!   app_private: { file: keys/app/privatekey.pem }
//!   app_public: { file: keys/app/publickey.pem }
//!   as_public: { env: SPARTAN_AS_PUBLIC_KEY }
//! attestation:
//!   as_url: http://localhost:3000/v1/as/tokens
//!   cache_path: /var/run/spartan
//! authenticator:
//!   role: SuperRole
//! ```

pub mod authenticator;
pub mod client;
pub mod keys;
pub mod server;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub use authenticator::{AddressPolicy, AuthenticatorConfig, ReplayPolicy};
pub use client::AttestationConfig;
pub use keys::{KeySource, KeysConfig};
pub use server::{AttestationServiceConfig, RoleGrant, ServerConfig};

/// Complete Spartan configuration loaded from a file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SpartanConfig {
    /// Key material locations.
    #[serde(default)]
    pub keys: KeysConfig,

    /// Client side: how to reach the Attestation Service.
    #[serde(default)]
    pub attestation: Option<AttestationConfig>,

    /// Relying-service side: how inbound tokens are checked.
    #[serde(default)]
    pub authenticator: Option<AuthenticatorConfig>,

    /// Attestation Service side: which roles are granted to whom.
    #[serde(default)]
    pub attestation_service: Option<AttestationServiceConfig>,

    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A required option is absent.
    #[error("missing required option: {0}")]
    MissingField(String),

    /// An option is present but unusable.
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl SpartanConfig {
    /// Load configuration from a YAML file.
    ///
    /// Relative key file paths are resolved against the file's directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;

        let base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        config.keys.rebase(&base_dir);

        Ok(config)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// The attestation client section, or an error naming it.
    pub fn require_attestation(&self) -> Result<&AttestationConfig, ConfigError> {
        self.attestation
            .as_ref()
            .ok_or_else(|| ConfigError::MissingField("attestation".to_string()))
    }

    /// The authenticator section, or an error naming it.
    pub fn require_authenticator(&self) -> Result<&AuthenticatorConfig, ConfigError> {
        self.authenticator
            .as_ref()
            .ok_or_else(|| ConfigError::MissingField("authenticator".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TokenType;
    use jsonwebtoken::Algorithm;

    const FULL: &str = r#"
keys:
  app_private: { file: keys/app/privatekey.pem }
  app_public: { file: /etc/spartan/publickey.pem }
  as_public: { env: SPARTAN_AS_PUBLIC_KEY }
attestation:
  as_url: http://localhost:3000/v1/as/tokens
  cache_path: /var/run/spartan
authenticator:
  role: SuperRole
  token_type: as-app-token
  address_policy: reject
attestation_service:
  issuer: spartan-domain
  grants:
    - role: SuperRole
      members: ["*"]
server:
  bind: 0.0.0.0:3000
"#;

    #[test]
    fn test_parse_full_config() {
        let config = SpartanConfig::from_yaml(FULL).unwrap();

        let attestation = config.require_attestation().unwrap();
        assert_eq!(attestation.as_url, "http://localhost:3000/v1/as/tokens");
        assert_eq!(attestation.envelope_ttl_secs, 60);
        assert_eq!(attestation.algorithm, Algorithm::ES256);

        let auth = config.require_authenticator().unwrap();
        assert_eq!(auth.role.as_deref(), Some("SuperRole"));
        assert_eq!(auth.token_type, TokenType::AsAppToken);
        assert_eq!(auth.address_policy, AddressPolicy::Reject);
        assert_eq!(auth.algorithms, vec![Algorithm::ES256]);

        let service = config.attestation_service.as_ref().unwrap();
        assert_eq!(service.grants.len(), 1);
        assert_eq!(config.server.bind, "0.0.0.0:3000");
    }

    #[test]
    fn test_missing_sections_are_reported() {
        let config = SpartanConfig::from_yaml("server:\n  bind: 127.0.0.1:1\n").unwrap();
        assert!(matches!(
            config.require_attestation(),
            Err(ConfigError::MissingField(_))
        ));
        assert!(config.require_authenticator().is_err());
    }

    #[test]
    fn test_from_file_rebases_relative_key_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spartan.yaml");
        fs::write(&path, FULL).unwrap();

        let config = SpartanConfig::from_file(&path).unwrap();
        assert_eq!(
            config.keys.app_private.file.as_deref(),
            Some(dir.path().join("keys/app/privatekey.pem").as_path())
        );
        assert_eq!(
            config.keys.app_public.file.as_deref(),
            Some(Path::new("/etc/spartan/publickey.pem"))
        );
    }
}
