//! Spartan HTTP server components.
//!
//! - [`middleware`]: `svc_auth` / `as_auth` axum middleware
//! - [`attestation`]: the Attestation Service router
//! - [`routes`]: health check and a protected demo endpoint

pub mod attestation;
pub mod middleware;
pub mod routes;

pub use attestation::{AttestationState, router};
pub use middleware::{as_auth, svc_auth};
