//! Fernet tokens: HMAC-SHA256 authenticated AES-128-CBC.
//!
//! Layout of a decoded token:
//!
//! ```text
//! version (1) | timestamp (8, BE) | iv (16) | ciphertext (n * 16) | hmac (32)
//! ```
//!
//! The HMAC covers everything before it and is checked in constant time
//! before the version byte is trusted or any decryption happens.

use aes::Aes128;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use chacha20poly1305::aead::{rand_core::RngCore, OsRng};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;
use tracing::trace;

use crate::cipher::AuthenticatedCipher;
use crate::encoding;
use crate::keys::DerivedKey;
use pwseal_common::{Error, Result, Scheme, SensitiveBytes};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type HmacSha256 = Hmac<Sha256>;

/// Version byte of every Fernet token.
pub const VERSION: u8 = 0x80;

/// Size of the big-endian timestamp.
pub const TIMESTAMP_SIZE: usize = 8;

/// AES block and IV size.
pub const IV_SIZE: usize = 16;

/// HMAC-SHA256 tag size.
pub const HMAC_SIZE: usize = 32;

const BLOCK_SIZE: usize = 16;
const HEADER_SIZE: usize = 1 + TIMESTAMP_SIZE + IV_SIZE;

/// Smallest possible token: header, one padded block, tag.
pub const MIN_TOKEN_SIZE: usize = HEADER_SIZE + BLOCK_SIZE + HMAC_SIZE;

/// How far in the future a timestamp may lie when a TTL is enforced.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(60);

/// Fernet cipher bound to one derived key.
#[derive(Debug, Clone)]
pub struct Fernet {
    key: DerivedKey,
}

/// Decoded token whose tag and version have been checked.
struct VerifiedToken {
    data: Vec<u8>,
}

impl VerifiedToken {
    fn timestamp(&self) -> u64 {
        let mut bytes = [0u8; TIMESTAMP_SIZE];
        bytes.copy_from_slice(&self.data[1..1 + TIMESTAMP_SIZE]);
        u64::from_be_bytes(bytes)
    }

    fn iv(&self) -> &[u8] {
        &self.data[1 + TIMESTAMP_SIZE..HEADER_SIZE]
    }

    fn ciphertext(&self) -> &[u8] {
        &self.data[HEADER_SIZE..self.data.len() - HMAC_SIZE]
    }
}

impl Fernet {
    /// Create a cipher that takes ownership of `key`.
    pub fn new(key: DerivedKey) -> Self {
        Self { key }
    }

    /// Encrypt with a fresh random IV and the current time.
    ///
    /// # Preconditions
    /// - `plaintext` can be any size
    ///
    /// # Postconditions
    /// - Returns a padded base64-url Fernet token
    /// - The IV is randomly generated on every call
    ///
    /// # Errors
    /// - Returns `Crypto` if the cipher or HMAC rejects the key halves
    ///
    /// # Security
    /// - The tag covers version, timestamp, IV and ciphertext
    pub fn seal_bytes(&self, plaintext: &[u8]) -> Result<String> {
        let mut iv = [0u8; IV_SIZE];
        OsRng.fill_bytes(&mut iv);
        self.seal_with_parts(plaintext, unix_now(), &iv)
    }

    /// Encrypt with a caller-chosen timestamp and IV.
    ///
    /// # Warning
    /// Reusing an IV under the same key leaks plaintext prefixes. Only
    /// known-answer tests should call this directly.
    pub(crate) fn seal_with_parts(
        &self,
        plaintext: &[u8],
        timestamp: u64,
        iv: &[u8; IV_SIZE],
    ) -> Result<String> {
        let ciphertext = Aes128CbcEnc::new_from_slices(self.key.encryption_key(), iv)
            .map_err(|e| Error::Crypto(format!("Invalid cipher parameters: {}", e)))?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        let mut data = Vec::with_capacity(HEADER_SIZE + ciphertext.len() + HMAC_SIZE);
        data.push(VERSION);
        data.extend_from_slice(&timestamp.to_be_bytes());
        data.extend_from_slice(iv);
        data.extend_from_slice(&ciphertext);

        let mut mac = self.mac()?;
        mac.update(&data);
        data.extend_from_slice(&mac.finalize().into_bytes());

        Ok(encoding::encode(&data))
    }

    /// Verify and decrypt, returning the raw plaintext bytes.
    pub fn open_bytes(&self, token: &str) -> Result<SensitiveBytes> {
        let verified = self.verify(token)?;
        self.decrypt(&verified)
    }

    /// Verify and decrypt, rejecting tokens older than `ttl`.
    ///
    /// # Errors
    /// - `Expired` if the token is older than `ttl` or stamped more than
    ///   MAX_CLOCK_SKEW in the future
    /// - Otherwise as [`AuthenticatedCipher::open`]
    pub fn open_with_ttl(&self, token: &str, ttl: Duration) -> Result<String> {
        self.open_at(token, Some(ttl), unix_now())
    }

    pub(crate) fn open_at(&self, token: &str, ttl: Option<Duration>, now: u64) -> Result<String> {
        let verified = self.verify(token)?;

        if let Some(ttl) = ttl {
            let timestamp = verified.timestamp();
            if timestamp.saturating_add(ttl.as_secs()) < now {
                return Err(Error::Expired);
            }
            if now.saturating_add(MAX_CLOCK_SKEW.as_secs()) < timestamp {
                return Err(Error::Expired);
            }
        }

        self.decrypt(&verified)?.to_utf8()
    }

    /// Authenticated creation time of a token, in seconds since the epoch.
    pub fn timestamp(&self, token: &str) -> Result<u64> {
        Ok(self.verify(token)?.timestamp())
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(self.key.signing_key())
            .map_err(|e| Error::Crypto(format!("Invalid signing key: {}", e)))
    }

    fn verify(&self, token: &str) -> Result<VerifiedToken> {
        let data = encoding::decode(token)?;

        if data.len() < MIN_TOKEN_SIZE {
            return Err(Error::MalformedToken("Token too short".to_string()));
        }
        if (data.len() - HEADER_SIZE - HMAC_SIZE) % BLOCK_SIZE != 0 {
            return Err(Error::MalformedToken(
                "Ciphertext is not a whole number of blocks".to_string(),
            ));
        }

        let (signed, tag) = data.split_at(data.len() - HMAC_SIZE);
        let mut mac = self.mac()?;
        mac.update(signed);
        let expected = mac.finalize().into_bytes();

        if !bool::from(expected.as_slice().ct_eq(tag)) {
            trace!("Token tag mismatch");
            return Err(Error::Authentication);
        }
        if data[0] != VERSION {
            trace!(version = data[0], "Unknown token version");
            return Err(Error::Authentication);
        }

        Ok(VerifiedToken { data })
    }

    fn decrypt(&self, verified: &VerifiedToken) -> Result<SensitiveBytes> {
        let plaintext = Aes128CbcDec::new_from_slices(self.key.encryption_key(), verified.iv())
            .map_err(|e| Error::Crypto(format!("Invalid cipher parameters: {}", e)))?
            .decrypt_padded_vec_mut::<Pkcs7>(verified.ciphertext())
            .map_err(|_| Error::Authentication)?;

        Ok(SensitiveBytes::new(plaintext))
    }
}

impl AuthenticatedCipher for Fernet {
    fn scheme(&self) -> Scheme {
        Scheme::Fernet
    }

    fn seal(&self, plaintext: &str) -> Result<String> {
        self.seal_bytes(plaintext.as_bytes())
    }

    fn open(&self, token: &str) -> Result<String> {
        self.open_at(token, None, unix_now())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
