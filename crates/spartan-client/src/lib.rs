//! Spartan attestation client.
//!
//! An application uses [`AttestationClient`] to turn its key pair into a
//! token for a role: the client proves the application's identity to the
//! Attestation Service, caches the role credentials it receives in a
//! [`TokenCache`], and wraps them in short-lived envelopes.
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use spartan_client::{AttestationClient, FetchOptions};
//! use spartan_core::AttestationConfig;
//! use spartan_token::KeyPair;
//! use std::path::Path;
//!
//! let keys = KeyPair::load_from_files(
//!     Path::new("keys/app/privatekey.pem"),
//!     Path::new("keys/app/publickey.pem"),
//! )?;
//! let config = AttestationConfig::new("http://localhost:3000/v1/as/tokens", "/var/run/spartan");
//! let client = AttestationClient::new(config, keys)?;
//! let token = client.fetch("SuperRole", &FetchOptions::default()).await?;
//! # let _ = token;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod error;

pub use cache::{CacheRecord, TokenCache};
pub use client::{AttestationClient, FetchOptions};
pub use error::{CacheError, ClientError};
