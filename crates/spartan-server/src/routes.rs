//! Health check and the protected demo endpoint.

use crate::middleware::svc_auth;
use axum::{
    Extension, Json, Router,
    middleware::from_fn_with_state,
    routing::get,
};
use serde_json::{Value, json};
use spartan_auth::{AuthData, TokenAuthenticator};
use std::sync::Arc;

/// Path of the protected endpoint.
pub const AUTH_TEST_PATH: &str = "/v1/sp/auth-test";

pub fn health_router() -> Router {
    Router::new().route("/healthz", get(healthz))
}

async fn healthz() -> Json<Value> {
    Json(json!({ "ok": true, "service": "spartan-server" }))
}

/// Router with one endpoint guarded by [`svc_auth`]; echoes who was let in.
pub fn protected_router(authenticator: Arc<TokenAuthenticator>) -> Router {
    Router::new()
        .route(AUTH_TEST_PATH, get(auth_test))
        .route_layer(from_fn_with_state(authenticator, svc_auth))
}

async fn auth_test(Extension(data): Extension<AuthData>) -> Json<Value> {
    Json(json!({
        "msg": "authorized",
        "subject": data.subject(),
        "role": data.role(),
    }))
}
