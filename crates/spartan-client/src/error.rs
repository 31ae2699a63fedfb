//! Error types for the attestation client.

use spartan_core::ConfigError;
use spartan_token::TokenError;
use thiserror::Error;

/// Errors from reading or writing the token cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The blocking writer task did not complete.
    #[error("cache writer task failed: {0}")]
    Task(String),
}

/// Errors returned by [`crate::AttestationClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// Missing or unusable configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Failed to sign a request or envelope.
    #[error("failed to sign token: {0}")]
    Sign(#[from] TokenError),

    /// The HTTP request did not complete.
    #[error("attestation service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The AS answered with a non-success status.
    #[error("attestation service returned {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The AS answered 2xx with a body that is not a token list.
    #[error("invalid attestation service response: {0}")]
    InvalidResponse(String),

    /// The AS issued no credential for the role.
    #[error("no cert tokens found; app is not authorized to access role: {role}")]
    NotAuthorized { role: String },
}

impl ClientError {
    /// Whether the failure happened talking to the AS (network or status).
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_) | ClientError::Rejected { .. })
    }
}
