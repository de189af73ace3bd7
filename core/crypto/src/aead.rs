//! Salted tokens using XChaCha20-Poly1305.
//!
//! Unlike Fernet tokens, each salted token carries a random salt, so the
//! same password yields an unrelated key for every message:
//!
//! ```text
//! version (1) | salt (16) | nonce (24) | ciphertext | tag (16)
//! ```
//!
//! The header is bound as associated data.

use chacha20poly1305::{
    aead::{generic_array::GenericArray, Aead, AeadCore, KeyInit, OsRng, Payload},
    XChaCha20Poly1305,
};
use tracing::trace;

use crate::cipher::AuthenticatedCipher;
use crate::encoding;
use crate::kdf::{derive_key, validate_iterations};
use crate::keys::{Salt, SALT_LENGTH};
use pwseal_common::{Error, Result, Scheme, SensitiveBytes};

/// Version byte of every salted token.
pub const VERSION: u8 = 0x02;

/// Nonce size for XChaCha20-Poly1305 (24 bytes).
pub const NONCE_SIZE: usize = 24;

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

const HEADER_SIZE: usize = 1 + SALT_LENGTH + NONCE_SIZE;

/// Cipher that derives a fresh key per token from a password.
#[derive(Debug, Clone)]
pub struct SaltedCipher {
    password: SensitiveBytes,
    iterations: u32,
}

impl SaltedCipher {
    /// Create a cipher for `password` with an explicit PBKDF2 iteration count.
    ///
    /// # Errors
    /// - Returns `InvalidInput` if iterations is zero
    pub fn with_iterations(password: &str, iterations: u32) -> Result<Self> {
        validate_iterations(iterations)?;

        Ok(Self {
            password: SensitiveBytes::new(password.as_bytes().to_vec()),
            iterations,
        })
    }

    fn cipher_for(&self, salt: &[u8]) -> XChaCha20Poly1305 {
        let key = derive_key(self.password.as_bytes(), salt, self.iterations);
        XChaCha20Poly1305::new(GenericArray::from_slice(key.as_bytes()))
    }

    /// Encrypt raw bytes under a freshly salted key.
    ///
    /// # Preconditions
    /// - `plaintext` can be any size
    ///
    /// # Postconditions
    /// - Returns base64url(version || salt || nonce || ciphertext || tag)
    /// - Salt and nonce are freshly drawn from the OS RNG on every call
    ///
    /// # Errors
    /// - Returns `Crypto` if the underlying AEAD rejects the input
    ///
    /// # Security
    /// - The password is only read to derive the per-token key
    /// - The header is authenticated as associated data
    pub fn seal_bytes(&self, plaintext: &[u8]) -> Result<String> {
        let salt = Salt::generate();
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);

        let mut token = Vec::with_capacity(HEADER_SIZE + plaintext.len() + TAG_SIZE);
        token.push(VERSION);
        token.extend_from_slice(salt.as_bytes());
        token.extend_from_slice(&nonce);

        let ciphertext = self
            .cipher_for(salt.as_bytes())
            .encrypt(
                &nonce,
                Payload {
                    msg: plaintext,
                    aad: &token,
                },
            )
            .map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))?;

        token.extend_from_slice(&ciphertext);
        Ok(encoding::encode(&token))
    }

    /// Verify and decrypt, returning the raw plaintext bytes.
    ///
    /// # Preconditions
    /// - `token` may carry surrounding whitespace and may omit padding
    ///
    /// # Postconditions
    /// - Returns the original plaintext, zeroized when dropped
    ///
    /// # Errors
    /// - Returns `MalformedToken` if the token is not base64-url or shorter
    ///   than header plus tag
    /// - Returns `Authentication` on a wrong password, tampering or an
    ///   unknown version byte
    ///
    /// # Security
    /// - The key is derived before the version byte is looked at, so every
    ///   rejected token costs the same
    pub fn open_bytes(&self, token: &str) -> Result<SensitiveBytes> {
        let data = encoding::decode(token)?;

        if data.len() < HEADER_SIZE + TAG_SIZE {
            return Err(Error::MalformedToken("Token too short".to_string()));
        }

        let (header, ciphertext) = data.split_at(HEADER_SIZE);
        let salt = &header[1..1 + SALT_LENGTH];
        let nonce = GenericArray::from_slice(&header[1 + SALT_LENGTH..]);

        let plaintext = self
            .cipher_for(salt)
            .decrypt(
                nonce,
                Payload {
                    msg: ciphertext,
                    aad: header,
                },
            )
            .map_err(|_| {
                trace!("Salted token failed authentication");
                Error::Authentication
            })?;

        if header[0] != VERSION {
            return Err(Error::Authentication);
        }

        Ok(SensitiveBytes::new(plaintext))
    }
}

impl AuthenticatedCipher for SaltedCipher {
    fn scheme(&self) -> Scheme {
        Scheme::Salted
    }

    fn seal(&self, plaintext: &str) -> Result<String> {
        self.seal_bytes(plaintext.as_bytes())
    }

    fn open(&self, token: &str) -> Result<String> {
        self.open_bytes(token)?.to_utf8()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A single iteration keeps the tests fast; the format is unaffected.
    fn cipher(password: &str) -> SaltedCipher {
        SaltedCipher::with_iterations(password, 1).unwrap()
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let salted = cipher("correct horse");
        let long = "long message ".repeat(2_000);

        for message in ["", "meet at 9am", "Grüße, 世界 🔐", long.as_str()] {
            let token = salted.seal(message).unwrap();
            assert_eq!(salted.open(&token).unwrap(), message);
        }
    }

    #[test]
    fn test_token_size() {
        let token = cipher("pw").seal("Test message").unwrap();
        let data = encoding::decode(&token).unwrap();

        assert_eq!(data[0], VERSION);
        assert_eq!(data.len(), HEADER_SIZE + "Test message".len() + TAG_SIZE);
    }

    #[test]
    fn test_fresh_salt_and_nonce_each_time() {
        let salted = cipher("pw");

        let t1 = encoding::decode(&salted.seal("same").unwrap()).unwrap();
        let t2 = encoding::decode(&salted.seal("same").unwrap()).unwrap();

        assert_ne!(&t1[1..1 + SALT_LENGTH], &t2[1..1 + SALT_LENGTH]);
        assert_ne!(&t1[1 + SALT_LENGTH..HEADER_SIZE], &t2[1 + SALT_LENGTH..HEADER_SIZE]);
    }

    #[test]
    fn test_wrong_password_fails() {
        let token = cipher("correct horse").seal("meet at 9am").unwrap();
        let result = cipher("wrong horse").open(&token);

        assert!(matches!(result, Err(Error::Authentication)));
    }

    #[test]
    fn test_iteration_count_is_part_of_key() {
        let token = SaltedCipher::with_iterations("pw", 2).unwrap().seal("data").unwrap();
        let result = SaltedCipher::with_iterations("pw", 3).unwrap().open(&token);

        assert!(matches!(result, Err(Error::Authentication)));
    }

    #[test]
    fn test_every_bit_flip_fails() {
        let salted = cipher("pw");
        let data = encoding::decode(&salted.seal("tamper me").unwrap()).unwrap();

        for index in 0..data.len() {
            for bit in 0..8 {
                let mut tampered = data.clone();
                tampered[index] ^= 1 << bit;
                let result = salted.open(&encoding::encode(&tampered));
                assert!(
                    matches!(result, Err(Error::Authentication)),
                    "flip at byte {} bit {} was not rejected",
                    index,
                    bit
                );
            }
        }
    }

    #[test]
    fn test_malformed_tokens() {
        let salted = cipher("pw");

        assert!(matches!(salted.open("not-a-valid-token"), Err(Error::MalformedToken(_))));
        assert!(matches!(salted.open("AgAA"), Err(Error::MalformedToken(_))));
    }

    #[test]
    fn test_zero_iterations_rejected() {
        assert!(matches!(
            SaltedCipher::with_iterations("pw", 0),
            Err(Error::InvalidInput(_))
        ));
    }
}
