//! # spartan-core
//!
//! Protocol vocabulary and configuration shared by every Spartan crate.
//!
//! Spartan authenticates services to each other through an Attestation
//! Service (AS):
//!
//! | Token type | Signed by | Carries |
//! |------------|-----------|---------|
//! | `as-app-req` | Application | App public key, nonce |
//! | `as-app-token` | Attestation Service | Role, optional bound address |
//! | `app-svc-req` | Application | App public key, nonce, nested `as-app-token` |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod config;

pub use config::{
    AddressPolicy, AttestationConfig, AttestationServiceConfig, AuthenticatorConfig, ConfigError,
    KeySource, KeysConfig, ReplayPolicy, RoleGrant, ServerConfig, SpartanConfig,
};

/// HTTP header carrying a Spartan token.
pub const AUTH_HEADER: &str = "x-spartan-auth-token";

/// Query parameter accepted as an alternative to [`AUTH_HEADER`].
pub const AUTH_QUERY_PARAM: &str = "spartantoken";

/// Issuer used by applications for self-signed envelopes.
pub const SELF_ISSUER: &str = "self";

/// Protocol version written into every envelope.
pub const PROTOCOL_VERSION: u32 = 1;

/// The declared purpose of a token (`type` claim).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TokenType {
    /// Application to Attestation Service: "who am I" request.
    AsAppReq,
    /// Attestation Service to application: role credential.
    AsAppToken,
    /// Application to service: envelope around an `as-app-token`.
    #[default]
    AppSvcReq,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::AsAppReq => "as-app-req",
            TokenType::AsAppToken => "as-app-token",
            TokenType::AppSvcReq => "app-svc-req",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "as-app-req" => Ok(TokenType::AsAppReq),
            "as-app-token" => Ok(TokenType::AsAppToken),
            "app-svc-req" => Ok(TokenType::AppSvcReq),
            other => Err(ConfigError::InvalidValue {
                field: "token_type".to_string(),
                reason: format!("unknown token type '{other}'"),
            }),
        }
    }
}

/// One role credential as carried on the wire and in the token cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleToken {
    pub role: String,
    /// The AS-signed `as-app-token` credential.
    pub astoken: String,
}

/// Body of a successful Attestation Service response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub tokens: Vec<RoleToken>,
}
