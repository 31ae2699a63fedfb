//! Axum middleware running the token authenticator.

use crate::attestation::AttestationState;
use axum::{
    Json,
    extract::{ConnectInfo, Query, Request, State},
    http::{Extensions, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use spartan_auth::TokenAuthenticator;
use spartan_core::{AUTH_HEADER, AUTH_QUERY_PARAM};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

/// Relying-service middleware: authenticates `app-svc-req` (or raw
/// credential) tokens and hands [`spartan_auth::AuthData`] to the handler.
pub async fn svc_auth(
    State(authenticator): State<Arc<TokenAuthenticator>>,
    req: Request,
    next: Next,
) -> Response {
    authenticate(&authenticator, req, next).await
}

/// Attestation Service middleware: authenticates `as-app-req` tokens.
pub async fn as_auth(
    State(state): State<Arc<AttestationState>>,
    req: Request,
    next: Next,
) -> Response {
    authenticate(state.authenticator(), req, next).await
}

async fn authenticate(authenticator: &TokenAuthenticator, mut req: Request, next: Next) -> Response {
    let token = extract_token(req.headers(), req.uri());
    let remote_addr = peer_ip(req.extensions());

    let decision = authenticator.authenticate(token.as_deref(), remote_addr.as_deref());
    match decision.into_result() {
        Ok(data) => {
            req.extensions_mut().insert(data);
            next.run(req).await
        }
        Err((status, msg)) => {
            tracing::info!(
                path = %req.uri().path(),
                status,
                reason = %msg,
                "Request refused"
            );
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::FORBIDDEN);
            (status, Json(json!({ "msg": msg }))).into_response()
        }
    }
}

/// Token from the auth header, falling back to the query parameter.
///
/// Request bodies are never read; a `spartantoken` form field is ignored.
pub fn extract_token(headers: &HeaderMap, uri: &axum::http::Uri) -> Option<String> {
    if let Some(v) = headers.get(AUTH_HEADER).and_then(|h| h.to_str().ok()) {
        let s = v.trim();
        if !s.is_empty() {
            return Some(s.to_string());
        }
    }

    let Query(mut params) = Query::<HashMap<String, String>>::try_from_uri(uri).ok()?;
    params
        .remove(AUTH_QUERY_PARAM)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Peer address recorded by `into_make_service_with_connect_info`.
pub fn peer_ip(extensions: &Extensions) -> Option<String> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Uri};

    #[test]
    fn test_extract_token_prefers_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTH_HEADER, HeaderValue::from_static("from-header"));
        let uri: Uri = "/x?spartantoken=from-query".parse().unwrap();
        assert_eq!(extract_token(&headers, &uri).as_deref(), Some("from-header"));
    }

    #[test]
    fn test_extract_token_from_query() {
        let uri: Uri = "/x?a=1&spartantoken=from-query".parse().unwrap();
        assert_eq!(
            extract_token(&HeaderMap::new(), &uri).as_deref(),
            Some("from-query")
        );

        let uri: Uri = "/x?spartantoken=".parse().unwrap();
        assert!(extract_token(&HeaderMap::new(), &uri).is_none());
        let uri: Uri = "/x".parse().unwrap();
        assert!(extract_token(&HeaderMap::new(), &uri).is_none());
    }

    #[test]
    fn test_peer_ip() {
        let mut extensions = Extensions::new();
        assert!(peer_ip(&extensions).is_none());
        extensions.insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 7], 4000))));
        assert_eq!(peer_ip(&extensions).as_deref(), Some("10.0.0.7"));
    }
}
