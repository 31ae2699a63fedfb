//! On-disk cache of role credentials.
//!
//! The cache is a single JSON file, `<dir>/tokens`:
//!
//! ```json
//! { "updated_at": 1700000000, "tokens": [ { "role": "SuperRole", "astoken": "eyJ..." } ] }
//! ```
//!
//! Writers hold an exclusive lock on `<dir>/tokens.lock`, merge their roles
//! into what is on disk and atomically replace the file, so concurrent
//! fetches for different roles do not lose each other's entries. Readers
//! never lock: they see either the old or the new file.

use crate::error::CacheError;
use chrono::Utc;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use spartan_core::RoleToken;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Name of the cache file inside the cache directory.
pub const CACHE_FILE_NAME: &str = "tokens";

const LOCK_FILE_NAME: &str = "tokens.lock";

/// Contents of the cache file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// When the file was last written, unix seconds. Informational only.
    #[serde(default)]
    pub updated_at: i64,

    #[serde(default)]
    pub tokens: Vec<RoleToken>,
}

impl CacheRecord {
    /// A credential for `role` whose `exp` is still in the future at `now`.
    ///
    /// Expiry is read from the credential itself without verifying it; the
    /// relying service verifies it anyway.
    pub fn fresh_token(&self, role: &str, now: i64) -> Option<&str> {
        self.tokens
            .iter()
            .filter(|entry| entry.role == role)
            .find(|entry| is_fresh(&entry.astoken, now))
            .map(|entry| entry.astoken.as_str())
    }

    /// Merge `incoming` into `existing`: incoming entries replace entries of the
    /// same role, other roles are kept while still fresh. One entry per role.
    pub fn merge(existing: Option<CacheRecord>, incoming: Vec<RoleToken>, now: i64) -> Self {
        let mut tokens: Vec<RoleToken> = Vec::with_capacity(incoming.len());
        for entry in incoming {
            if !tokens.iter().any(|t| t.role == entry.role) {
                tokens.push(entry);
            }
        }

        if let Some(existing) = existing {
            for entry in existing.tokens {
                if !tokens.iter().any(|t| t.role == entry.role) && is_fresh(&entry.astoken, now) {
                    tokens.push(entry);
                }
            }
        }

        Self {
            updated_at: now,
            tokens,
        }
    }
}

fn is_fresh(astoken: &str, now: i64) -> bool {
    spartan_token::decode(astoken)
        .map(|token| !token.claims.is_expired_at(now))
        .unwrap_or(false)
}

/// Handle on a cache directory.
#[derive(Debug, Clone)]
pub struct TokenCache {
    dir: PathBuf,
}

impl TokenCache {
    /// Use `dir` as the cache directory. It should be private to the owning user.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        warn_if_shared(&dir);
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the cache file.
    pub fn path(&self) -> PathBuf {
        self.dir.join(CACHE_FILE_NAME)
    }

    /// Read the cache file. `None` when it does not exist yet.
    pub async fn load(&self) -> Result<Option<CacheRecord>, CacheError> {
        match tokio::fs::read(self.path()).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Merge `tokens` into the cache file and return what was written.
    pub async fn store(&self, tokens: Vec<RoleToken>) -> Result<CacheRecord, CacheError> {
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || store_blocking(&dir, tokens))
            .await
            .map_err(|e| CacheError::Task(e.to_string()))?
    }
}

fn store_blocking(dir: &Path, tokens: Vec<RoleToken>) -> Result<CacheRecord, CacheError> {
    ensure_private_dir(dir)?;

    let lock = open_private(&dir.join(LOCK_FILE_NAME))?;
    lock.lock_exclusive()?;

    let path = dir.join(CACHE_FILE_NAME);
    let existing = match fs::read(&path) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .inspect_err(|e| tracing::debug!(error = %e, "Discarding unreadable token cache"))
            .ok(),
        Err(_) => None,
    };
    let record = CacheRecord::merge(existing, tokens, Utc::now().timestamp());

    let mut tmp = NamedTempFile::new_in(dir)?;
    set_private(tmp.as_file())?;
    serde_json::to_writer_pretty(&mut tmp, &record)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(&path).map_err(|e| e.error)?;

    FileExt::unlock(&lock)?;
    Ok(record)
}

fn open_private(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(false);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

fn set_private(file: &File) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    #[cfg(not(unix))]
    let _ = file;
    Ok(())
}

fn ensure_private_dir(dir: &Path) -> io::Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}

fn warn_if_shared(dir: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(meta) = fs::metadata(dir) {
            let mode = meta.permissions().mode();
            if mode & 0o077 != 0 {
                tracing::warn!(
                    dir = %dir.display(),
                    mode = format!("{:o}", mode & 0o777),
                    "Token cache directory is accessible by group/other; restrict it to 0700"
                );
            }
        }
    }
    #[cfg(not(unix))]
    let _ = dir;
}
