//! # spartan-token
//!
//! Token handling for Spartan.
//!
//! This crate provides:
//! - Signing tokens with an application or AS key pair ([`sign`])
//! - Verifying tokens against an explicit algorithm allow-list ([`verify`])
//! - Unauthenticated decoding for dispatch ([`decode`])
//! - PEM key material and subject derivation ([`KeyPair`], [`PublicKey`])
//! - Versioned key directories ([`Keychain`])
//!
//! Tokens are JWTs. The header algorithm is never trusted on its own:
//! verification fails unless it is in the caller's allow-list and matches
//! the key family. HMAC algorithms are never accepted.

pub mod claims;
pub mod codec;
pub mod error;
pub mod keychain;
pub mod keys;

pub use claims::{Claims, Payload};
pub use codec::{SignOptions, UnverifiedToken, VerifyOptions, decode, sign, verify};
pub use error::TokenError;
pub use jsonwebtoken::Algorithm;
pub use keychain::{KeyRecord, Keychain};
pub use keys::{KeyFamily, KeyPair, PublicKey, subject_for};
