//! Key types with secure memory handling.
//!
//! All key types automatically zeroize their memory on drop to prevent
//! sensitive data from persisting in memory.

use chacha20poly1305::aead::{rand_core::RngCore, OsRng};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::encoding;
use pwseal_common::{Error, Result};

/// Length of derived keys in bytes (256-bit).
pub const KEY_LENGTH: usize = 32;

/// Length of each half of a split Fernet key.
pub const HALF_KEY_LENGTH: usize = KEY_LENGTH / 2;

/// Length of randomly generated salts.
pub const SALT_LENGTH: usize = 16;

/// Key derived from a password.
///
/// Fernet splits it in two: the first half signs, the second half
/// encrypts. The salted scheme uses all 32 bytes as one XChaCha20 key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; KEY_LENGTH],
}

impl DerivedKey {
    /// Create a key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }

    /// HMAC-SHA256 signing half.
    pub fn signing_key(&self) -> &[u8] {
        &self.key[..HALF_KEY_LENGTH]
    }

    /// AES-128 encryption half.
    pub fn encryption_key(&self) -> &[u8] {
        &self.key[HALF_KEY_LENGTH..]
    }

    /// Encode as a padded base64-url string, the textual Fernet key form.
    pub fn to_base64(&self) -> Zeroizing<String> {
        Zeroizing::new(encoding::encode(&self.key))
    }

    /// Parse a padded or unpadded base64-url key string.
    ///
    /// # Errors
    /// - Returns `InvalidInput` if the string is not base64-url or does not
    ///   decode to exactly KEY_LENGTH bytes
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let decoded = Zeroizing::new(
            encoding::decode(encoded)
                .map_err(|_| Error::InvalidInput("Key is not valid base64-url".to_string()))?,
        );

        if decoded.len() != KEY_LENGTH {
            return Err(Error::InvalidInput(format!(
                "Invalid key length: expected {}, got {}",
                KEY_LENGTH,
                decoded.len()
            )));
        }

        let mut key = [0u8; KEY_LENGTH];
        key.copy_from_slice(&decoded);
        Ok(Self { key })
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DerivedKey([REDACTED])")
    }
}

/// Salt for key derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Salt(Vec<u8>);

impl Salt {
    /// Generate a random salt of SALT_LENGTH bytes.
    pub fn generate() -> Self {
        let mut salt = vec![0u8; SALT_LENGTH];
        OsRng.fill_bytes(&mut salt);
        Self(salt)
    }

    /// Get the salt bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}
