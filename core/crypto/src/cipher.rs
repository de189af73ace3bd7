//! The seam between a derived key and a token format.

use pwseal_common::{Result, Scheme};

/// Authenticated encryption of text into printable tokens.
///
/// Implementations are stateless between calls: every `seal` draws fresh
/// randomness and every `open` verifies integrity before returning
/// anything.
pub trait AuthenticatedCipher: Send + Sync {
    /// Token scheme this cipher produces.
    fn scheme(&self) -> Scheme;

    /// Encrypt and authenticate `plaintext` into a base64-url token.
    fn seal(&self, plaintext: &str) -> Result<String>;

    /// Verify and decrypt a token.
    ///
    /// # Errors
    /// - `MalformedToken` if the token cannot be decoded
    /// - `Authentication` on a wrong key, tampering or an unknown version
    fn open(&self, token: &str) -> Result<String>;
}
