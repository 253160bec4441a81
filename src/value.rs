//! Value projection
//!
//! The cache only holds text, so every value entering a collection is
//! projected to UTF-8 before any write happens.

use crate::error::{Result, ShelfError};

/// Borrow raw bytes as text, or fail with `ValueNotText`
pub fn as_text(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|_| ShelfError::ValueNotText)
}

/// Validate a database or collection name
///
/// Names become directory names, so they are limited to a portable subset.
pub fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 255
        && name != "."
        && name != ".."
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));

    if valid {
        Ok(())
    } else {
        Err(ShelfError::InvalidName(name.to_string()))
    }
}
