//! Attestation Service.
//!
//! `GET /v1/as/tokens` takes an `as-app-req` in the auth header, and answers
//! with one `as-app-token` credential per role granted to the caller:
//!
//! ```json
//! { "tokens": [ { "role": "SuperRole", "astoken": "eyJ..." } ] }
//! ```

use crate::middleware::{as_auth, peer_ip};
use axum::{
    Json, Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::get,
};
use serde_json::{Value, json};
use spartan_auth::{AuthData, TokenAuthenticator};
use spartan_core::{AttestationServiceConfig, AuthenticatorConfig, ConfigError, RoleToken, TokenResponse};
use spartan_token::{KeyPair, Payload, SignOptions, TokenError, sign};
use std::sync::Arc;

/// Path of the token endpoint.
pub const TOKENS_PATH: &str = "/v1/as/tokens";

/// Shared state of the Attestation Service.
#[derive(Debug)]
pub struct AttestationState {
    keys: KeyPair,
    config: AttestationServiceConfig,
    authenticator: TokenAuthenticator,
}

impl AttestationState {
    /// Service signing with `keys`, accepting requests under the default
    /// request authenticator settings.
    pub fn new(keys: KeyPair, config: AttestationServiceConfig) -> Result<Self, ConfigError> {
        Self::with_authenticator(keys, config, AuthenticatorConfig::for_attestation_requests())
    }

    /// Service with custom request checks (replay policy, algorithms).
    pub fn with_authenticator(
        keys: KeyPair,
        config: AttestationServiceConfig,
        requests: AuthenticatorConfig,
    ) -> Result<Self, ConfigError> {
        if requests.token_type != spartan_core::TokenType::AsAppReq {
            return Err(ConfigError::InvalidValue {
                field: "token_type".to_string(),
                reason: "the attestation service accepts as-app-req tokens".to_string(),
            });
        }
        if config.token_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "token_ttl_secs".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        let authenticator = TokenAuthenticator::new(requests, keys.public_key().clone())?;
        Ok(Self {
            keys,
            config,
            authenticator,
        })
    }

    pub fn authenticator(&self) -> &TokenAuthenticator {
        &self.authenticator
    }

    pub fn config(&self) -> &AttestationServiceConfig {
        &self.config
    }

    /// Sign one credential per role granted to `subject`.
    pub fn mint(&self, subject: &str, ip: Option<&str>) -> Result<Vec<RoleToken>, TokenError> {
        let ip = ip.filter(|_| self.config.bind_address).map(str::to_string);
        let options = SignOptions::new(subject, &self.config.issuer)
            .expires_in(self.config.token_ttl_secs)
            .algorithm(self.keys.family().default_algorithm());

        self.config
            .roles_for(subject)
            .map(|role| -> Result<RoleToken, TokenError> {
                let astoken = sign(&Payload::as_app_token(role, ip.clone()), &self.keys, &options)?;
                Ok(RoleToken {
                    role: role.to_string(),
                    astoken,
                })
            })
            .collect()
    }
}

/// Router serving the token endpoint behind [`as_auth`].
pub fn router(state: Arc<AttestationState>) -> Router {
    Router::new()
        .route(TOKENS_PATH, get(issue_tokens))
        .route_layer(from_fn_with_state(state.clone(), as_auth))
        .with_state(state)
}

async fn issue_tokens(
    State(state): State<Arc<AttestationState>>,
    req: Request,
) -> Result<Json<TokenResponse>, (StatusCode, Json<Value>)> {
    let subject = req
        .extensions()
        .get::<AuthData>()
        .and_then(|data| data.subject())
        .map(str::to_string)
        .ok_or_else(|| {
            (
                StatusCode::FORBIDDEN,
                Json(json!({ "msg": "no authenticated subject" })),
            )
        })?;
    let ip = peer_ip(req.extensions());

    let tokens = state.mint(&subject, ip.as_deref()).map_err(|e| {
        tracing::error!(subject = %subject, error = %e, "Failed to sign role credentials");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "msg": "failed to issue tokens" })),
        )
    })?;

    if tokens.is_empty() {
        tracing::info!(subject = %subject, "No roles granted to subject");
    } else {
        tracing::info!(
            subject = %subject,
            roles = ?tokens.iter().map(|t| t.role.as_str()).collect::<Vec<_>>(),
            "Issued role credentials"
        );
    }
    Ok(Json(TokenResponse { tokens }))
}
