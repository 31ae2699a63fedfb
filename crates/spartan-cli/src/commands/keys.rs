//! Key commands.
//!
//! `spartan keys list` - List the versions in a key directory.
//! `spartan keys subject` - Print the subject derived from a public key.

use super::file_or_value;
use anyhow::Context;
use spartan_token::{Keychain, PublicKey};
use std::path::Path;

/// List keychain versions, one per line; `*` marks the current version.
pub fn list(dir: &Path, public_only: bool) -> anyhow::Result<()> {
    let keychain = Keychain::load(dir, public_only)
        .with_context(|| format!("Failed to load keys from {}", dir.display()))?;

    if keychain.is_empty() {
        println!("No keys found in {}", dir.display());
        return Ok(());
    }

    println!("{:<2} {:<20} {:<8} SUBJECT", "", "KID", "PRIVATE");
    for record in keychain.records() {
        let marker = if record.current { "*" } else { "" };
        let private = if record.private_pem.is_some() { "yes" } else { "no" };
        let subject = match record.public_key() {
            Ok(key) => key.subject(),
            Err(e) => format!("(invalid public key: {e})"),
        };
        println!("{:<2} {:<20} {:<8} {}", marker, record.kid, private, subject);
    }

    Ok(())
}

/// Print the subject an application with this public key is known by.
pub fn subject(key: &str) -> anyhow::Result<()> {
    let key = PublicKey::from_pem(file_or_value(key)?).context("Failed to load public key")?;
    println!("{}", key.subject());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const APP_PRIVATE: &str = include_str!("../../../../testdata/app-es256-private.pem");
    const APP_PUBLIC: &str = include_str!("../../../../testdata/app-es256-public.pem");

    #[test]
    fn test_list_keychain() {
        let dir = tempdir().unwrap();
        let version = dir.path().join("v1");
        fs::create_dir(&version).unwrap();
        fs::write(version.join("publickey.pem"), APP_PUBLIC).unwrap();
        fs::write(version.join("privatekey.pem"), APP_PRIVATE).unwrap();
        fs::write(version.join("current"), "").unwrap();

        list(dir.path(), false).unwrap();
        list(dir.path(), true).unwrap();
    }

    #[test]
    fn test_list_empty_and_missing_dirs() {
        let dir = tempdir().unwrap();
        list(dir.path(), false).unwrap();
        assert!(list(&dir.path().join("missing"), false).is_err());
    }

    #[test]
    fn test_subject_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("publickey.pem");
        fs::write(&path, APP_PUBLIC).unwrap();
        subject(&path.to_string_lossy()).unwrap();
        assert!(subject("not a key").is_err());
    }
}
