//! Outcome of an authentication attempt.

use crate::error::AuthError;
use serde::Serialize;
use spartan_token::Claims;

/// Verified claims handed to the application on success.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuthData {
    /// Self-signed outer token (`app-svc-req` or `as-app-req`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<Claims>,

    /// AS-issued role credential (`as-app-token`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authz_token: Option<Claims>,
}

impl AuthData {
    /// Subject of the authenticated application.
    pub fn subject(&self) -> Option<&str> {
        self.auth_token
            .as_ref()
            .or(self.authz_token.as_ref())
            .map(|claims| claims.sub.as_str())
    }

    /// Role granted by the credential, when one was presented.
    pub fn role(&self) -> Option<&str> {
        self.authz_token
            .as_ref()
            .and_then(|claims| claims.payload.role.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthDecision {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<AuthData>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// 400, 401 or 403 on failure; absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl AuthDecision {
    pub fn allow(data: AuthData) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            status_code: None,
        }
    }

    pub fn deny(error: &AuthError) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(error.to_string()),
            status_code: Some(error.status_code()),
        }
    }

    /// Split into the verified data or the failure message and status.
    pub fn into_result(self) -> Result<AuthData, (u16, String)> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            _ => Err((
                self.status_code.unwrap_or(403),
                self.message.unwrap_or_default(),
            )),
        }
    }
}
