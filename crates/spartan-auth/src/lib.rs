//! Spartan token authentication.
//!
//! [`TokenAuthenticator`] is what a relying service (or the Attestation
//! Service itself) runs on every inbound token. It never returns an error
//! to the caller: the outcome is an [`AuthDecision`] carrying either the
//! verified claims or a message with a 400, 401 or 403 status.

pub mod authenticator;
pub mod decision;
pub mod error;
pub mod replay;

pub use authenticator::TokenAuthenticator;
pub use decision::{AuthData, AuthDecision};
pub use error::AuthError;
pub use replay::ReplayGuard;
