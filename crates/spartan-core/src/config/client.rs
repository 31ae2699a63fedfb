//! Attestation client configuration.

use super::ConfigError;
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How an application reaches the Attestation Service and caches its answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationConfig {
    /// AS token endpoint, e.g. `http://localhost:3000/v1/as/tokens`.
    pub as_url: String,

    /// Directory holding the token cache. Must be private to the owning user (0700).
    pub cache_path: PathBuf,

    /// Lifetime of envelopes signed by the application, in seconds.
    #[serde(default = "default_envelope_ttl")]
    pub envelope_ttl_secs: u64,

    /// Algorithm used to sign envelopes with the application key.
    #[serde(default = "default_algorithm")]
    pub algorithm: Algorithm,

    /// Key identifier written to the envelope header.
    #[serde(default)]
    pub key_id: Option<String>,

    /// Overall HTTP timeout for the AS call. Transport default when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_envelope_ttl() -> u64 {
    60
}

fn default_algorithm() -> Algorithm {
    Algorithm::ES256
}

impl AttestationConfig {
    /// Create a configuration with default TTL and algorithm.
    pub fn new(as_url: impl Into<String>, cache_path: impl Into<PathBuf>) -> Self {
        Self {
            as_url: as_url.into(),
            cache_path: cache_path.into(),
            envelope_ttl_secs: default_envelope_ttl(),
            algorithm: default_algorithm(),
            key_id: None,
            timeout_secs: None,
        }
    }

    /// Check that every security-relevant option is present and usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.as_url.trim().is_empty() {
            return Err(ConfigError::MissingField("as_url".to_string()));
        }
        if !(self.as_url.starts_with("http://") || self.as_url.starts_with("https://")) {
            return Err(ConfigError::invalid("as_url", "must be an http(s) URL"));
        }
        if self.cache_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("cache_path".to_string()));
        }
        if self.envelope_ttl_secs == 0 {
            return Err(ConfigError::invalid("envelope_ttl_secs", "must be positive"));
        }
        if is_symmetric(self.algorithm) {
            return Err(ConfigError::invalid(
                "algorithm",
                format!("{:?} is symmetric; envelopes need a public-key algorithm", self.algorithm),
            ));
        }
        Ok(())
    }
}

/// HMAC algorithms cannot be used where the verifier only holds a public key.
pub(crate) fn is_symmetric(alg: Algorithm) -> bool {
    matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AttestationConfig::new("http://localhost:3000/v1/as/tokens", "/tmp/cache");
        assert_eq!(config.envelope_ttl_secs, 60);
        assert_eq!(config.algorithm, Algorithm::ES256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_failures() {
        let missing_url = AttestationConfig::new("", "/tmp/cache");
        assert!(matches!(missing_url.validate(), Err(ConfigError::MissingField(f)) if f == "as_url"));

        let missing_cache = AttestationConfig::new("http://as", "");
        assert!(matches!(missing_cache.validate(), Err(ConfigError::MissingField(f)) if f == "cache_path"));

        let mut hmac = AttestationConfig::new("http://as", "/tmp/cache");
        hmac.algorithm = Algorithm::HS256;
        assert!(matches!(hmac.validate(), Err(ConfigError::InvalidValue { .. })));

        let bad_scheme = AttestationConfig::new("ftp://as", "/tmp/cache");
        assert!(bad_scheme.validate().is_err());
    }
}
