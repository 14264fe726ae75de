//! Cache keys and their file-name encoding.

use std::fmt;

use crate::error::{CacheError, CacheResult};

/// Longest window address accepted as a key, in bytes.
pub const MAX_KEY_LEN: usize = 128;

/// Window identity used to address one cache entry.
///
/// Ordering is lexical on the address, which eviction uses to break
/// timestamp ties deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Validate a window address as a cache key.
    pub fn new(address: impl Into<String>) -> CacheResult<Self> {
        let address = address.into();
        if address.is_empty() {
            return Err(CacheError::InvalidKey {
                reason: "address is empty",
            });
        }
        if address.len() > MAX_KEY_LEN {
            return Err(CacheError::InvalidKey {
                reason: "address is too long",
            });
        }
        Ok(Self(address))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Encode the address into a file stem.
    ///
    /// ASCII alphanumerics, `-` and `_` are kept; every other byte
    /// (including `%` and `.`) becomes `%XX`. The mapping is injective, so
    /// distinct addresses never share files.
    pub fn file_stem(&self) -> String {
        let mut encoded = String::with_capacity(self.0.len());
        for byte in self.0.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
                encoded.push(byte as char);
            } else {
                encoded.push_str(&format!("%{:02X}", byte));
            }
        }
        encoded
    }

    /// Recover a key from a file stem produced by [`CacheKey::file_stem`].
    ///
    /// Returns `None` for anything `file_stem` could not have produced.
    pub fn from_file_stem(stem: &str) -> Option<Self> {
        let bytes = stem.as_bytes();
        let mut decoded = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'%' {
                let hex = stem.get(i + 1..i + 3)?;
                decoded.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            } else {
                decoded.push(bytes[i]);
                i += 1;
            }
        }

        let key = Self::new(String::from_utf8(decoded).ok()?).ok()?;
        // Reject non-canonical spellings such as lowercase hex or escaped
        // alphanumerics
        (key.file_stem() == stem).then_some(key)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
