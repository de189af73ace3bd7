//! Key derivation using PBKDF2-HMAC-SHA256.
//!
//! The default parameters reproduce the fixed-salt derivation that existing
//! Fernet tokens were keyed with, so both parties reach the same key from
//! nothing but the shared password. A fixed salt gives no protection against
//! precomputed dictionaries; the salted scheme in [`crate::aead`] is the
//! alternative when interop is not needed.

use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;

use crate::keys::{DerivedKey, KEY_LENGTH};
use pwseal_common::{Error, Result};

/// Salt every interop token was derived with.
pub const DEFAULT_SALT: &[u8] = b"fixed_salt_for_tanja";

/// PBKDF2 iteration count every interop token was derived with.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Parameters for PBKDF2 key derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Salt fed to PBKDF2. Ignored by the salted scheme, which carries its own.
    pub salt: Vec<u8>,
    /// Number of HMAC-SHA256 iterations.
    pub iterations: u32,
}

impl KdfParams {
    /// Create parameters from a salt and iteration count.
    pub fn new(salt: impl Into<Vec<u8>>, iterations: u32) -> Self {
        Self {
            salt: salt.into(),
            iterations,
        }
    }

    /// Check that the parameters can drive PBKDF2.
    ///
    /// # Errors
    /// - Returns error if iterations is zero
    pub fn validate(&self) -> Result<()> {
        validate_iterations(self.iterations)
    }

    /// Whether these are the interop defaults.
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            salt: DEFAULT_SALT.to_vec(),
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

/// Turns passwords into keys under one fixed set of parameters.
#[derive(Debug, Clone, Default)]
pub struct KeyDeriver {
    params: KdfParams,
}

impl KeyDeriver {
    /// Create a deriver for the given parameters.
    ///
    /// # Errors
    /// - Returns error if the parameters fail [`KdfParams::validate`]
    pub fn new(params: KdfParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Derive a key from a password.
    ///
    /// Any string is accepted, including the empty one. The result depends
    /// only on the password and the parameters.
    pub fn derive(&self, password: &str) -> DerivedKey {
        derive_key(password.as_bytes(), &self.params.salt, self.params.iterations)
    }
}

/// Reject iteration counts PBKDF2 cannot meaningfully run with.
pub(crate) fn validate_iterations(iterations: u32) -> Result<()> {
    if iterations == 0 {
        return Err(Error::InvalidInput(
            "KDF iterations must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Derive a key from password bytes, a salt and an iteration count.
///
/// # Preconditions
/// - `iterations` has passed [`validate_iterations`]; every caller in this
///   crate checks it when its parameters are built
///
/// # Security
/// - Password is not stored or logged
/// - The intermediate buffer is moved into a zeroizing key
pub(crate) fn derive_key(password: &[u8], salt: &[u8], iterations: u32) -> DerivedKey {
    debug!(iterations, salt_len = salt.len(), "Deriving key");

    let mut key_bytes = [0u8; KEY_LENGTH];
    pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut key_bytes);
    DerivedKey::from_bytes(key_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_key_known_answer() {
        let deriver = KeyDeriver::default();
        let key = deriver.derive("correct horse");

        assert_eq!(
            key.to_base64().as_str(),
            "-AXYGDgjxxcdqluFqncn22VtKmuuV4yIHHatBFBqn8E="
        );
    }

    #[test]
    fn test_derive_key_empty_password() {
        let key = KeyDeriver::default().derive("");

        assert_eq!(
            key.to_base64().as_str(),
            "2G4oDBDh0Cu0CD7RUhslVyEyHFpDPxgF5Ao6x7qVIfE="
        );
    }

    #[test]
    fn test_derive_key_injected_params() {
        let deriver = KeyDeriver::new(KdfParams::new(b"NaCl".to_vec(), 1)).unwrap();
        let key = deriver.derive("x");

        assert_eq!(
            key.to_base64().as_str(),
            "cRk3HJGFnF2Yw13O9-CbQm3wF7X1IDtKUvhDEhudRBk="
        );
    }

    #[test]
    fn test_derive_key_deterministic() {
        let deriver = KeyDeriver::new(KdfParams::new(b"salt".to_vec(), 10)).unwrap();

        let key1 = deriver.derive("test-password-123");
        let key2 = deriver.derive("test-password-123");

        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_different_salt() {
        let key1 = derive_key(b"test-password-123", b"salt-one", 10);
        let key2 = derive_key(b"test-password-123", b"salt-two", 10);

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_different_password() {
        let key1 = derive_key(b"password1", DEFAULT_SALT, 10);
        let key2 = derive_key(b"password2", DEFAULT_SALT, 10);

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_zero_iterations_rejected() {
        assert!(matches!(
            KeyDeriver::new(KdfParams::new(DEFAULT_SALT.to_vec(), 0)),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_default_params() {
        let params = KdfParams::default();
        assert_eq!(params.salt, b"fixed_salt_for_tanja");
        assert_eq!(params.iterations, 100_000);
        assert!(params.is_default());
        assert!(!KdfParams::new(b"other".to_vec(), 100_000).is_default());
    }

    #[test]
    fn test_params_serde() {
        let params = KdfParams::new(b"ab".to_vec(), 5);
        let json = serde_json::to_string(&params).unwrap();
        let back: KdfParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }
}
