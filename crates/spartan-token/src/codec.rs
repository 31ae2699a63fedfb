//! Token signing and verification.
//!
//! Tokens are compact JWS (JWT) strings. [`sign`] stamps the registered
//! claims, [`verify`] checks signature, algorithm allow-list and expiry, and
//! [`decode`] gives an unauthenticated view for routing only.

use crate::claims::{Claims, Payload};
use crate::error::TokenError;
use crate::keys::{KeyFamily, KeyPair, PublicKey};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Header, Validation};

/// Default token lifetime in seconds.
pub const DEFAULT_EXPIRY_SECS: u64 = 3600;

/// Options controlling how a token is signed.
#[derive(Debug, Clone)]
pub struct SignOptions {
    pub subject: String,
    pub issuer: String,
    /// Lifetime in seconds, counted from `issued_at`.
    pub expires_in: u64,
    pub algorithm: Algorithm,
    pub key_id: Option<String>,
    /// Issue time (unix seconds); now when unset.
    pub issued_at: Option<i64>,
}

impl SignOptions {
    pub fn new(subject: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            issuer: issuer.into(),
            expires_in: DEFAULT_EXPIRY_SECS,
            algorithm: Algorithm::ES256,
            key_id: None,
            issued_at: None,
        }
    }

    pub fn expires_in(mut self, secs: u64) -> Self {
        self.expires_in = secs;
        self
    }

    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn key_id(mut self, key_id: Option<String>) -> Self {
        self.key_id = key_id;
        self
    }

    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.issued_at = Some(timestamp);
        self
    }
}

/// Options controlling how a token is verified.
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    /// Algorithms accepted in the token header. Anything else is rejected
    /// before the signature is looked at.
    pub algorithms: Vec<Algorithm>,
    /// Clock skew tolerated on `exp`, in seconds.
    pub leeway: u64,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            algorithms: vec![Algorithm::ES256],
            leeway: 0,
        }
    }
}

impl VerifyOptions {
    pub fn new(algorithms: Vec<Algorithm>, leeway: u64) -> Self {
        Self { algorithms, leeway }
    }
}

/// Sign `payload` with `key`.
pub fn sign(payload: &Payload, key: &KeyPair, options: &SignOptions) -> Result<String, TokenError> {
    if options.subject.trim().is_empty() {
        return Err(TokenError::missing("sub"));
    }
    if options.issuer.trim().is_empty() {
        return Err(TokenError::missing("iss"));
    }
    if let Some(reserved) = payload.reserved_claim() {
        return Err(TokenError::ReservedClaim(reserved.to_string()));
    }
    match KeyFamily::of(options.algorithm) {
        None => {
            return Err(TokenError::UnsupportedAlgorithm(format!(
                "{:?}",
                options.algorithm
            )));
        }
        Some(family) if family != key.family() => {
            return Err(TokenError::InvalidPrivateKey(format!(
                "{:?} key cannot sign {:?}",
                key.family(),
                options.algorithm
            )));
        }
        Some(_) => {}
    }

    let issued_at = options.issued_at.unwrap_or_else(|| Utc::now().timestamp());
    let exp = i64::try_from(options.expires_in)
        .ok()
        .and_then(|ttl| issued_at.checked_add(ttl))
        .ok_or_else(|| {
            TokenError::SigningFailed(format!("lifetime of {}s is out of range", options.expires_in))
        })?;
    let claims = Claims {
        sub: options.subject.clone(),
        iss: options.issuer.clone(),
        exp,
        iat: Some(issued_at),
        payload: payload.clone(),
    };

    let mut header = Header::new(options.algorithm);
    header.kid = options
        .key_id
        .clone()
        .or_else(|| key.key_id().map(str::to_string));

    jsonwebtoken::encode(&header, &claims, key.encoding_key()).map_err(|e| match e.kind() {
        ErrorKind::InvalidEcdsaKey | ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidKeyFormat => {
            TokenError::InvalidPrivateKey(e.to_string())
        }
        _ => TokenError::SigningFailed(e.to_string()),
    })
}

/// Verify `token` against `key` and return its claims.
///
/// The header algorithm must appear in `options.algorithms` and belong to
/// the key's family; `sub`, `iss` and `exp` must be present and `exp` must
/// be in the future.
pub fn verify(token: &str, key: &PublicKey, options: &VerifyOptions) -> Result<Claims, TokenError> {
    let header =
        jsonwebtoken::decode_header(token).map_err(|e| TokenError::Malformed(e.to_string()))?;

    if !options.algorithms.contains(&header.alg) {
        return Err(TokenError::AlgorithmNotAllowed(format!("{:?}", header.alg)));
    }
    let decoding_key = key.decoding_key(header.alg)?;

    let mut validation = Validation::new(header.alg);
    validation.set_required_spec_claims(&["exp", "sub", "iss"]);
    validation.leeway = options.leeway;
    validation.validate_aud = false;

    let data = jsonwebtoken::decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
        match e.kind() {
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::ExpiredSignature => TokenError::TokenExpired {
                expired_at: decode(token)
                    .map(|t| format_timestamp(t.claims.exp))
                    .unwrap_or_else(|_| "an unreadable time".to_string()),
            },
            ErrorKind::MissingRequiredClaim(claim) => TokenError::missing(claim),
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => TokenError::Malformed(e.to_string()),
            ErrorKind::InvalidEcdsaKey | ErrorKind::InvalidKeyFormat => {
                TokenError::InvalidPublicKey(e.to_string())
            }
            _ => TokenError::VerificationFailed(e.to_string()),
        }
    })?;

    // jsonwebtoken accepts `exp == now`; a credential is only live strictly before exp.
    let now = Utc::now().timestamp();
    if data.claims.is_expired_at(now.saturating_sub(options.leeway as i64)) {
        return Err(TokenError::TokenExpired {
            expired_at: format_timestamp(data.claims.exp),
        });
    }

    Ok(data.claims)
}

/// A token whose signature has not been checked.
#[derive(Debug, Clone)]
pub struct UnverifiedToken {
    pub header: Header,
    pub claims: Claims,
}

/// Decode a token without verifying it.
///
/// Only for routing decisions (which key to verify with, which cache entry
/// is stale). Never a trust decision.
pub fn decode(token: &str) -> Result<UnverifiedToken, TokenError> {
    let header =
        jsonwebtoken::decode_header(token).map_err(|e| TokenError::Malformed(e.to_string()))?;

    let payload_segment = token
        .split('.')
        .nth(1)
        .ok_or_else(|| TokenError::Malformed("missing payload segment".to_string()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload_segment)
        .map_err(|e| TokenError::Malformed(e.to_string()))?;
    let claims: Claims =
        serde_json::from_slice(&bytes).map_err(|e| TokenError::Malformed(e.to_string()))?;

    Ok(UnverifiedToken { header, claims })
}

fn format_timestamp(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}
