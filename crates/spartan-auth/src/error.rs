//! Authentication failures and their HTTP status codes.

use spartan_core::TokenType;
use spartan_token::TokenError;
use thiserror::Error;

/// Why a token was refused.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no token found")]
    MissingToken,

    /// The token could not be decoded at all.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// The declared `type` is not what this endpoint accepts.
    #[error("Invalid service request type: {actual} (expected {expected})")]
    TypeMismatch { expected: TokenType, actual: String },

    /// Signature, expiry or claim checks failed on the outer token.
    #[error("token verify failed: {0}")]
    Verify(TokenError),

    /// Signature, expiry or claim checks failed on the nested credential.
    #[error("astoken verify failed: {0}")]
    CredentialVerify(TokenError),

    /// `sub` of a self-signed token is not the hash of its embedded key.
    #[error("token subject is not bound to its embedded public key")]
    SubjectBinding,

    /// The nested credential is not an `as-app-token`.
    #[error("nested credential has type {0}, expected as-app-token")]
    NestedType(String),

    /// Envelope and credential were issued to different subjects.
    #[error("app identity mismatch; identity check failed")]
    IdentityMismatch { envelope: String, credential: String },

    /// The credential does not grant the required role.
    #[error("app is not authorized to access role/resource")]
    RoleMismatch {
        expected: String,
        actual: Option<String>,
    },

    /// The credential is bound to another address.
    #[error("IP mismatch: token bound to {bound}, request from {remote}")]
    AddressMismatch { bound: String, remote: String },

    /// The envelope carries no nonce but reuse detection is on.
    #[error("token has no nonce")]
    MissingNonce,

    /// The envelope nonce was seen before.
    #[error("token nonce has already been used")]
    Replay,
}

impl AuthError {
    /// HTTP status reported for this failure: 400, 401 or 403.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::Malformed(_) | AuthError::TypeMismatch { .. } => 400,
            AuthError::RoleMismatch { .. } => 401,
            AuthError::MissingToken
            | AuthError::Verify(_)
            | AuthError::CredentialVerify(_)
            | AuthError::SubjectBinding
            | AuthError::NestedType(_)
            | AuthError::IdentityMismatch { .. }
            | AuthError::AddressMismatch { .. }
            | AuthError::MissingNonce
            | AuthError::Replay => 403,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AuthError::MissingToken.status_code(), 403);
        assert_eq!(AuthError::Malformed("x".into()).status_code(), 400);
        assert_eq!(
            AuthError::TypeMismatch {
                expected: TokenType::AppSvcReq,
                actual: "as-app-token".into()
            }
            .status_code(),
            400
        );
        assert_eq!(
            AuthError::RoleMismatch {
                expected: "SuperRole".into(),
                actual: None
            }
            .status_code(),
            401
        );
        assert_eq!(AuthError::Verify(TokenError::InvalidSignature).status_code(), 403);
        assert_eq!(AuthError::Replay.status_code(), 403);
    }

    #[test]
    fn test_messages() {
        let err = AuthError::TypeMismatch {
            expected: TokenType::AppSvcReq,
            actual: "bogus".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid service request type: bogus (expected app-svc-req)"
        );
        assert_eq!(AuthError::MissingToken.to_string(), "no token found");
    }
}
