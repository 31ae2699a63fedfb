//! Key material locations.
//!
//! Keys are PEM text. Each key may come from an environment variable (the
//! PEM itself) or from a file; the environment wins when both are set.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where to find one PEM key.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KeySource {
    /// Environment variable containing the PEM text.
    #[serde(default)]
    pub env: Option<String>,

    /// Path to a PEM file.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl KeySource {
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            env: None,
            file: Some(path.into()),
        }
    }

    /// Resolve the key from environment or file.
    pub fn resolve(&self) -> Result<Option<String>, std::io::Error> {
        if let Some(env_var) = &self.env {
            if let Ok(key) = std::env::var(env_var) {
                return Ok(Some(key));
            }
        }

        if let Some(path) = &self.file {
            if path.exists() {
                return std::fs::read_to_string(path).map(Some);
            }
        }

        Ok(None)
    }

    pub fn is_configured(&self) -> bool {
        self.env.is_some() || self.file.is_some()
    }
}

/// Key material for an application, a relying service or the AS.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KeysConfig {
    /// Application private key (signs envelopes).
    #[serde(default)]
    pub app_private: KeySource,

    /// Application public key (embedded in envelopes; its hash is the subject).
    #[serde(default)]
    pub app_public: KeySource,

    /// AS private key (signs role credentials). Only the AS needs it.
    #[serde(default)]
    pub as_private: KeySource,

    /// AS public key (verifies role credentials).
    #[serde(default)]
    pub as_public: KeySource,

    /// Versioned key directory; used for the AS key pair when `as_private`
    /// and `as_public` are not set.
    #[serde(default)]
    pub keys_dir: Option<PathBuf>,
}

impl KeysConfig {
    /// Make relative file paths relative to `base_dir`.
    pub(crate) fn rebase(&mut self, base_dir: &Path) {
        for source in [
            &mut self.app_private,
            &mut self.app_public,
            &mut self.as_private,
            &mut self.as_public,
        ] {
            if let Some(file) = &source.file {
                if file.is_relative() {
                    source.file = Some(base_dir.join(file));
                }
            }
        }
        if let Some(dir) = &self.keys_dir {
            if dir.is_relative() {
                self.keys_dir = Some(base_dir.join(dir));
            }
        }
    }
}
