//! In-memory nonce cache for reuse detection.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Remembers envelope nonces until the envelope that carried them can no
/// longer pass verification.
///
/// Scoped to one authenticator; nothing is shared across processes.
#[derive(Debug, Default)]
pub struct ReplayGuard {
    seen: Mutex<HashMap<String, i64>>,
}

impl ReplayGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `nonce` for `subject` until `expires_at`. Returns `false` when the
    /// pair was already recorded and has not expired at `now`.
    pub fn check_and_record(&self, subject: &str, nonce: &str, expires_at: i64, now: i64) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        seen.retain(|_, exp| *exp > now);

        let key = format!("{subject}:{nonce}");
        if seen.contains_key(&key) {
            return false;
        }
        seen.insert(key, expires_at);
        true
    }

    /// Number of nonces currently remembered.
    pub fn len(&self) -> usize {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
