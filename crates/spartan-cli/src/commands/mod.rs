//! CLI command implementations.

pub mod keys;
pub mod token;

use anyhow::Context;
use std::fs;
use std::path::Path;

/// Read `value` as a file when such a file exists, otherwise use it as is.
pub(crate) fn file_or_value(value: &str) -> anyhow::Result<String> {
    let path = Path::new(value);
    if path.exists() {
        return fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()));
    }
    Ok(value.to_string())
}
