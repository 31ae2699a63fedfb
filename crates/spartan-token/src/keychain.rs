//! Versioned key directories.
//!
//! ```text
//! /path/to/keys
//!     /v1            <- key version, used as the `kid` header
//!         publickey.pem
//!         privatekey.pem
//!         current    <- empty marker: this is the version to sign with
//!     /v2
//!         publickey.pem
//! ```
//!
//! Files are classified by content, not by name. Keys are loaded once at
//! start-up, so this module uses blocking file I/O.

use crate::error::TokenError;
use crate::keys::{KeyPair, PublicKey};
use std::fs;
use std::path::Path;

const CURRENT_MARKER: &str = "current";
const PUBLIC_PEM_TAG: &str = "-----BEGIN PUBLIC KEY-----";
const PRIVATE_PEM_TAG: &str = "PRIVATE KEY-----";

/// One key version.
#[derive(Clone, Default)]
pub struct KeyRecord {
    pub kid: String,
    pub current: bool,
    pub public_pem: Option<String>,
    pub private_pem: Option<String>,
}

impl std::fmt::Debug for KeyRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRecord")
            .field("kid", &self.kid)
            .field("current", &self.current)
            .field("has_public", &self.public_pem.is_some())
            .field("has_private", &self.private_pem.is_some())
            .finish()
    }
}

impl KeyRecord {
    /// The public key of this version.
    pub fn public_key(&self) -> Result<PublicKey, TokenError> {
        let pem = self.public_pem.as_deref().ok_or_else(|| {
            TokenError::InvalidPublicKey(format!("key version '{}' has no public key", self.kid))
        })?;
        PublicKey::from_pem(pem)
    }

    /// The key pair of this version, tagged with its `kid`.
    pub fn key_pair(&self) -> Result<KeyPair, TokenError> {
        let private_pem = self.private_pem.as_deref().ok_or_else(|| {
            TokenError::InvalidPrivateKey(format!("key version '{}' has no private key", self.kid))
        })?;
        let public_pem = self.public_pem.clone().ok_or_else(|| {
            TokenError::InvalidPublicKey(format!("key version '{}' has no public key", self.kid))
        })?;
        Ok(KeyPair::from_pem(private_pem, public_pem)?.with_key_id(self.kid.clone()))
    }
}

/// All key versions found under a directory, sorted by `kid`.
#[derive(Debug, Clone, Default)]
pub struct Keychain {
    records: Vec<KeyRecord>,
}

impl Keychain {
    /// Load every version directory under `dir`.
    ///
    /// With `public_only`, private key files are not kept in memory.
    pub fn load(dir: &Path, public_only: bool) -> Result<Self, TokenError> {
        let mut records = Vec::new();

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let version_dir = entry.path();
            if !version_dir.is_dir() {
                continue;
            }

            let mut record = KeyRecord {
                kid: entry.file_name().to_string_lossy().into_owned(),
                ..Default::default()
            };

            for file in fs::read_dir(&version_dir)? {
                let file = file?;
                if file.file_name() == CURRENT_MARKER {
                    record.current = true;
                }

                let path = file.path();
                if !path.is_file() {
                    continue;
                }
                // Non-UTF-8 files cannot be PEM keys.
                let Ok(content) = fs::read_to_string(&path) else {
                    continue;
                };
                if content.contains(PUBLIC_PEM_TAG) {
                    record.public_pem = Some(content);
                } else if content.contains(PRIVATE_PEM_TAG) && !public_only {
                    record.private_pem = Some(content);
                }
            }

            tracing::debug!(kid = %record.kid, current = record.current, "Loaded key version");
            records.push(record);
        }

        records.sort_by(|a, b| a.kid.cmp(&b.kid));
        Ok(Self { records })
    }

    pub fn records(&self) -> &[KeyRecord] {
        &self.records
    }

    /// The version marked `current`.
    pub fn current(&self) -> Option<&KeyRecord> {
        self.records.iter().find(|record| record.current)
    }

    /// Look up a version by `kid`.
    pub fn get(&self, kid: &str) -> Option<&KeyRecord> {
        self.records.iter().find(|record| record.kid == kid)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const APP_PRIVATE: &str = include_str!("../../../testdata/app-es256-private.pem");
    const APP_PUBLIC: &str = include_str!("../../../testdata/app-es256-public.pem");
    const OTHER_PUBLIC: &str = include_str!("../../../testdata/other-es256-public.pem");

    fn key_dir() -> TempDir {
        let dir = TempDir::new().unwrap();

        let v1 = dir.path().join("v1");
        fs::create_dir(&v1).unwrap();
        fs::write(v1.join("publickey.pem"), APP_PUBLIC).unwrap();
        fs::write(v1.join("privatekey.pem"), APP_PRIVATE).unwrap();
        fs::write(v1.join("current"), "").unwrap();

        let v2 = dir.path().join("v2");
        fs::create_dir(&v2).unwrap();
        fs::write(v2.join("publickey.pem"), OTHER_PUBLIC).unwrap();
        fs::write(v2.join("notes.txt"), "not a key").unwrap();

        fs::write(dir.path().join("README"), "stray file").unwrap();
        dir
    }

    #[test]
    fn test_load_keychain() {
        let dir = key_dir();
        let keychain = Keychain::load(dir.path(), false).unwrap();

        assert_eq!(keychain.records().len(), 2);
        let current = keychain.current().unwrap();
        assert_eq!(current.kid, "v1");
        assert!(current.private_pem.is_some());

        let v2 = keychain.get("v2").unwrap();
        assert!(!v2.current);
        assert_eq!(v2.public_pem.as_deref(), Some(OTHER_PUBLIC));
        assert!(v2.private_pem.is_none());
        assert!(v2.key_pair().is_err());
        assert!(v2.public_key().is_ok());
    }

    #[test]
    fn test_public_only_drops_private_keys() {
        let dir = key_dir();
        let keychain = Keychain::load(dir.path(), true).unwrap();
        assert!(keychain.records().iter().all(|r| r.private_pem.is_none()));
    }

    #[test]
    fn test_current_key_pair_carries_kid() {
        let dir = key_dir();
        let keychain = Keychain::load(dir.path(), false).unwrap();
        let keys = keychain.current().unwrap().key_pair().unwrap();
        assert_eq!(keys.key_id(), Some("v1"));
    }

    #[test]
    fn test_missing_dir_is_an_error() {
        assert!(Keychain::load(Path::new("/nonexistent/spartan/keys"), true).is_err());
    }
}
