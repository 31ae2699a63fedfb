//! Error types for the token crate.

use thiserror::Error;

/// Errors that can occur during token operations.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Failed to parse private key.
    #[error("failed to parse private key: {0}")]
    InvalidPrivateKey(String),

    /// Failed to parse public key.
    #[error("failed to parse public key: {0}")]
    InvalidPublicKey(String),

    /// The algorithm cannot be used with asymmetric key material.
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Token is missing required claim.
    #[error("token missing required claim: {claim}")]
    MissingClaim { claim: String },

    /// A payload tried to set a claim the codec owns.
    #[error("claim '{0}' is reserved and cannot be set in the payload")]
    ReservedClaim(String),

    /// Failed to create token.
    #[error("failed to sign token: {0}")]
    SigningFailed(String),

    /// Token is not a well-formed JWS.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// Header algorithm is not in the caller's allow-list.
    #[error("token algorithm {0} is not allowed")]
    AlgorithmNotAllowed(String),

    /// Signature does not match the verification key.
    #[error("invalid token signature")]
    InvalidSignature,

    /// Token has expired.
    #[error("token has expired at {expired_at}")]
    TokenExpired { expired_at: String },

    /// Token verification failed.
    #[error("token verification failed: {0}")]
    VerificationFailed(String),

    /// IO error (reading keys).
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl TokenError {
    pub(crate) fn missing(claim: &str) -> Self {
        TokenError::MissingClaim {
            claim: claim.to_string(),
        }
    }
}
