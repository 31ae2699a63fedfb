//! Token claims.
//!
//! Every Spartan token carries the registered claims `sub`, `iss`, `exp` and
//! `iat` plus a type-specific [`Payload`]. Claims the codec does not know
//! about are kept in [`Payload::extra`] so they survive a verify.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use spartan_core::{PROTOCOL_VERSION, TokenType};

/// Claim names the codec writes itself.
pub(crate) const REGISTERED_CLAIMS: &[&str] = &["sub", "iss", "exp", "iat", "nbf", "aud"];

/// Claim names backed by a typed [`Payload`] field.
pub(crate) const TYPED_CLAIMS: &[&str] =
    &["ver", "type", "role", "pubkey", "astoken", "nonce", "ip"];

/// Type-specific part of a token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Payload {
    /// Protocol version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ver: Option<u32>,

    /// Declared token type, kept verbatim so unknown types can be reported.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Role granted by the AS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Signer's public key (PEM) for self-signed envelopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pubkey: Option<String>,

    /// Nested AS-issued credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub astoken: Option<String>,

    /// Single-use value distinguishing otherwise identical envelopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Address the AS observed when it issued the credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    /// Application-defined claims.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Payload {
    fn typed(token_type: TokenType) -> Self {
        Self {
            ver: Some(PROTOCOL_VERSION),
            kind: Some(token_type.as_str().to_string()),
            ..Default::default()
        }
    }

    /// Application to AS request.
    pub fn as_app_req(pubkey: impl Into<String>, nonce: impl Into<String>) -> Self {
        Self {
            pubkey: Some(pubkey.into()),
            nonce: Some(nonce.into()),
            ..Self::typed(TokenType::AsAppReq)
        }
    }

    /// Role credential minted by the AS.
    pub fn as_app_token(role: impl Into<String>, ip: Option<String>) -> Self {
        Self {
            role: Some(role.into()),
            ip,
            ..Self::typed(TokenType::AsAppToken)
        }
    }

    /// Envelope presented by an application to a service.
    pub fn app_svc_req(
        pubkey: impl Into<String>,
        astoken: impl Into<String>,
        nonce: impl Into<String>,
    ) -> Self {
        Self {
            pubkey: Some(pubkey.into()),
            astoken: Some(astoken.into()),
            nonce: Some(nonce.into()),
            ..Self::typed(TokenType::AppSvcReq)
        }
    }

    /// Add an application-defined claim.
    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    /// The declared type, if it is one Spartan knows.
    pub fn token_type(&self) -> Option<TokenType> {
        self.kind.as_deref().and_then(|kind| kind.parse().ok())
    }

    /// First payload key that collides with a claim the codec owns or with a
    /// typed field. Either would serialize as a duplicate key.
    pub(crate) fn reserved_claim(&self) -> Option<&str> {
        self.extra
            .keys()
            .map(String::as_str)
            .find(|key| REGISTERED_CLAIMS.contains(key) || TYPED_CLAIMS.contains(key))
    }
}

/// Full claim set of a signed token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Identity of the signer.
    #[serde(default)]
    pub sub: String,

    /// `"self"` or the AS's logical name.
    #[serde(default)]
    pub iss: String,

    /// Expiry, unix seconds.
    #[serde(default)]
    pub exp: i64,

    /// Issue time, unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    #[serde(flatten)]
    pub payload: Payload,
}

impl Claims {
    pub fn token_type(&self) -> Option<TokenType> {
        self.payload.token_type()
    }

    /// Whether `exp` has passed at `now` (unix seconds).
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.exp <= now
    }
}
