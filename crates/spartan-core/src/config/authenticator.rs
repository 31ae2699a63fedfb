//! Inbound token authentication configuration.

use super::ConfigError;
use super::client::is_symmetric;
use crate::TokenType;
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};

/// What to do when the address bound into a credential differs from the
/// address the request actually came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AddressPolicy {
    /// Do not compare addresses.
    Ignore,
    /// Log the mismatch and accept the token.
    #[default]
    SoftWarn,
    /// Reject the token with 403.
    Reject,
}

/// How nonces carried by envelopes are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReplayPolicy {
    /// Rely on the short envelope lifetime; nonces are not remembered.
    #[default]
    ExpiryWindow,
    /// Remember nonces until their token expires and reject reuse.
    RejectReuse,
}

/// Relying-service (or AS-side) authenticator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatorConfig {
    /// Role the presented credential must carry. Not used for `as-app-req`.
    #[serde(default)]
    pub role: Option<String>,

    /// Token type this endpoint accepts.
    #[serde(default)]
    pub token_type: TokenType,

    /// Signature algorithms accepted at verification time.
    #[serde(default = "default_algorithms")]
    pub algorithms: Vec<Algorithm>,

    /// Clock skew tolerated when checking `exp`, in seconds.
    #[serde(default)]
    pub leeway_secs: u64,

    #[serde(default)]
    pub address_policy: AddressPolicy,

    #[serde(default)]
    pub replay: ReplayPolicy,

    /// Require `sub` of self-signed envelopes to be the hash of the embedded key.
    #[serde(default = "default_true")]
    pub require_subject_binding: bool,
}

fn default_algorithms() -> Vec<Algorithm> {
    vec![Algorithm::ES256]
}

fn default_true() -> bool {
    true
}

impl AuthenticatorConfig {
    /// Relying-service configuration requiring `role` on `app-svc-req` tokens.
    pub fn for_role(role: impl Into<String>) -> Self {
        Self {
            role: Some(role.into()),
            ..Self::for_attestation_requests()
        }
        .with_token_type(TokenType::AppSvcReq)
    }

    /// AS-side configuration accepting `as-app-req` envelopes.
    pub fn for_attestation_requests() -> Self {
        Self {
            role: None,
            token_type: TokenType::AsAppReq,
            algorithms: default_algorithms(),
            leeway_secs: 0,
            address_policy: AddressPolicy::default(),
            replay: ReplayPolicy::default(),
            require_subject_binding: true,
        }
    }

    pub fn with_token_type(mut self, token_type: TokenType) -> Self {
        self.token_type = token_type;
        self
    }

    pub fn with_address_policy(mut self, policy: AddressPolicy) -> Self {
        self.address_policy = policy;
        self
    }

    pub fn with_replay(mut self, replay: ReplayPolicy) -> Self {
        self.replay = replay;
        self
    }

    pub fn with_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.algorithms = algorithms;
        self
    }

    pub fn with_leeway(mut self, secs: u64) -> Self {
        self.leeway_secs = secs;
        self
    }

    /// Check that every security-relevant option is present and usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token_type != TokenType::AsAppReq {
            match self.role.as_deref().map(str::trim) {
                None | Some("") => return Err(ConfigError::MissingField("role".to_string())),
                Some(_) => {}
            }
        }
        if self.algorithms.is_empty() {
            return Err(ConfigError::invalid("algorithms", "at least one algorithm is required"));
        }
        if let Some(alg) = self.algorithms.iter().find(|alg| is_symmetric(**alg)) {
            return Err(ConfigError::invalid(
                "algorithms",
                format!("{alg:?} is symmetric and cannot be verified with a public key"),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_role_defaults() {
        let config = AuthenticatorConfig::for_role("SuperRole");
        assert_eq!(config.token_type, TokenType::AppSvcReq);
        assert_eq!(config.address_policy, AddressPolicy::SoftWarn);
        assert_eq!(config.replay, ReplayPolicy::ExpiryWindow);
        assert!(config.require_subject_binding);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_role_required_except_for_attestation_requests() {
        let mut config = AuthenticatorConfig::for_role("SuperRole");
        config.role = Some("  ".to_string());
        assert!(matches!(config.validate(), Err(ConfigError::MissingField(f)) if f == "role"));

        assert!(AuthenticatorConfig::for_attestation_requests().validate().is_ok());
    }

    #[test]
    fn test_symmetric_algorithms_rejected() {
        let config = AuthenticatorConfig::for_role("r").with_algorithms(vec![Algorithm::HS256]);
        assert!(config.validate().is_err());

        let empty = AuthenticatorConfig::for_role("r").with_algorithms(vec![]);
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_yaml_defaults() {
        let config: AuthenticatorConfig = serde_yaml::from_str("role: SuperRole\n").unwrap();
        assert_eq!(config.token_type, TokenType::AppSvcReq);
        assert_eq!(config.algorithms, vec![Algorithm::ES256]);
        assert!(config.require_subject_binding);
    }
}
