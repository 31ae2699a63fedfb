//! Key material for signing and verifying tokens.
//!
//! Keys are PEM text: PKCS#8 private keys and SPKI public keys. The key
//! family (EC, RSA or Ed25519) is detected from the PEM and must match the
//! algorithm a token is signed or verified with.

use crate::error::TokenError;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, crypto};
use sha2::{Digest, Sha256};
use spartan_core::KeySource;
use std::fmt;
use std::path::Path;

/// Asymmetric key families Spartan can sign and verify with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Ec,
    Rsa,
    Ed25519,
}

impl KeyFamily {
    /// Family an algorithm belongs to; `None` for HMAC.
    pub fn of(alg: Algorithm) -> Option<Self> {
        match alg {
            Algorithm::ES256 | Algorithm::ES384 => Some(KeyFamily::Ec),
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => Some(KeyFamily::Rsa),
            Algorithm::EdDSA => Some(KeyFamily::Ed25519),
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => None,
        }
    }

    /// Algorithm used when nothing else is configured.
    pub fn default_algorithm(self) -> Algorithm {
        match self {
            KeyFamily::Ec => Algorithm::ES256,
            KeyFamily::Rsa => Algorithm::RS256,
            KeyFamily::Ed25519 => Algorithm::EdDSA,
        }
    }
}

/// Subject derived from a public key: hex SHA-256 of the PEM text as given.
pub fn subject_for(public_pem: &str) -> String {
    hex::encode(Sha256::digest(public_pem.as_bytes()))
}

/// A public key used to verify tokens.
#[derive(Clone)]
pub struct PublicKey {
    pem: String,
    family: KeyFamily,
}

impl PublicKey {
    /// Parse a PEM public key.
    pub fn from_pem(pem: impl Into<String>) -> Result<Self, TokenError> {
        let pem = pem.into();
        let bytes = pem.as_bytes();
        let family = if DecodingKey::from_ec_pem(bytes).is_ok() {
            KeyFamily::Ec
        } else if DecodingKey::from_rsa_pem(bytes).is_ok() {
            KeyFamily::Rsa
        } else if DecodingKey::from_ed_pem(bytes).is_ok() {
            KeyFamily::Ed25519
        } else {
            return Err(TokenError::InvalidPublicKey(
                "expected a PEM encoded EC, RSA or Ed25519 public key".to_string(),
            ));
        };
        Ok(Self { pem, family })
    }

    /// Load a public key from a PEM file.
    pub fn load_from_file(path: &Path) -> Result<Self, TokenError> {
        Self::from_pem(std::fs::read_to_string(path)?)
    }

    /// Resolve a configured key. `None` when the source yields nothing.
    pub fn from_source(source: &KeySource) -> Result<Option<Self>, TokenError> {
        source.resolve()?.map(Self::from_pem).transpose()
    }

    pub fn pem(&self) -> &str {
        &self.pem
    }

    pub fn family(&self) -> KeyFamily {
        self.family
    }

    /// Subject of the holder of this key.
    pub fn subject(&self) -> String {
        subject_for(&self.pem)
    }

    /// Decoding key for `alg`, refusing algorithms outside the key's family.
    pub(crate) fn decoding_key(&self, alg: Algorithm) -> Result<DecodingKey, TokenError> {
        if KeyFamily::of(alg) != Some(self.family) {
            return Err(TokenError::AlgorithmNotAllowed(format!(
                "{alg:?} (key is {:?})",
                self.family
            )));
        }
        let bytes = self.pem.as_bytes();
        let key = match self.family {
            KeyFamily::Ec => DecodingKey::from_ec_pem(bytes),
            KeyFamily::Rsa => DecodingKey::from_rsa_pem(bytes),
            KeyFamily::Ed25519 => DecodingKey::from_ed_pem(bytes),
        };
        key.map_err(|e| TokenError::InvalidPublicKey(e.to_string()))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("family", &self.family)
            .field("subject", &self.subject())
            .finish()
    }
}

/// A private/public key pair used to sign tokens.
#[derive(Clone)]
pub struct KeyPair {
    encoding: EncodingKey,
    family: KeyFamily,
    public: PublicKey,
    key_id: Option<String>,
}

impl KeyPair {
    /// Build a key pair from PEM text.
    pub fn from_pem(private_pem: &str, public_pem: impl Into<String>) -> Result<Self, TokenError> {
        let bytes = private_pem.as_bytes();
        let (encoding, family) = if let Ok(key) = EncodingKey::from_ec_pem(bytes) {
            (key, KeyFamily::Ec)
        } else if let Ok(key) = EncodingKey::from_rsa_pem(bytes) {
            (key, KeyFamily::Rsa)
        } else if let Ok(key) = EncodingKey::from_ed_pem(bytes) {
            (key, KeyFamily::Ed25519)
        } else {
            return Err(TokenError::InvalidPrivateKey(
                "expected a PEM encoded EC, RSA or Ed25519 private key".to_string(),
            ));
        };

        let public = PublicKey::from_pem(public_pem)?;
        if public.family() != family {
            return Err(TokenError::InvalidPrivateKey(format!(
                "private key is {family:?} but public key is {:?}",
                public.family()
            )));
        }
        ensure_same_key(&encoding, &public)?;

        Ok(Self {
            encoding,
            family,
            public,
            key_id: None,
        })
    }

    /// Load a key pair from PEM files.
    pub fn load_from_files(private_path: &Path, public_path: &Path) -> Result<Self, TokenError> {
        let private_pem = std::fs::read_to_string(private_path)?;
        let public_pem = std::fs::read_to_string(public_path)?;
        Self::from_pem(&private_pem, public_pem)
    }

    /// Resolve both halves from configured sources. `None` unless both resolve.
    pub fn from_sources(private: &KeySource, public: &KeySource) -> Result<Option<Self>, TokenError> {
        match (private.resolve()?, public.resolve()?) {
            (Some(private_pem), Some(public_pem)) => Self::from_pem(&private_pem, public_pem).map(Some),
            _ => Ok(None),
        }
    }

    /// Tag the key pair with a key identifier (`kid` header).
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    pub fn family(&self) -> KeyFamily {
        self.family
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn public_key_pem(&self) -> &str {
        self.public.pem()
    }

    /// Subject of this key pair's holder.
    pub fn subject(&self) -> String {
        self.public.subject()
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.encoding
    }
}

/// Sign a fixed message with the private half and check it against the
/// public half. EC keys may be P-256 or P-384, so both curves are tried.
fn ensure_same_key(encoding: &EncodingKey, public: &PublicKey) -> Result<(), TokenError> {
    const MESSAGE: &[u8] = b"spartan key pair check";
    let candidates: &[Algorithm] = match public.family() {
        KeyFamily::Ec => &[Algorithm::ES256, Algorithm::ES384],
        KeyFamily::Rsa => &[Algorithm::RS256],
        KeyFamily::Ed25519 => &[Algorithm::EdDSA],
    };

    for &alg in candidates {
        let Ok(signature) = crypto::sign(MESSAGE, encoding, alg) else {
            continue;
        };
        let decoding = public.decoding_key(alg)?;
        return match crypto::verify(&signature, MESSAGE, &decoding, alg) {
            Ok(true) => Ok(()),
            _ => Err(TokenError::InvalidPrivateKey(
                "private key does not match public key".to_string(),
            )),
        };
    }
    Err(TokenError::InvalidPrivateKey(format!(
        "{:?} private key cannot produce a signature",
        public.family()
    )))
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("family", &self.family)
            .field("key_id", &self.key_id)
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}
