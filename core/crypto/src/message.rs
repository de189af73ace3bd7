//! Password-in, token-out entry points.
//!
//! These are the only calls a front end needs: pass a message (or a token)
//! and the shared password, get a token (or the message) back.

use tracing::debug;

use crate::aead::SaltedCipher;
use crate::cipher::AuthenticatedCipher;
use crate::encoding;
use crate::fernet::Fernet;
use crate::kdf::{KdfParams, KeyDeriver};
use pwseal_common::{Error, Result, Scheme};

/// Encrypt a message as a Fernet token under the default parameters.
pub fn encrypt_message(message: &str, password: &str) -> Result<String> {
    encrypt_message_with(message, password, Scheme::Fernet, &KdfParams::default())
}

/// Decrypt a token of either scheme under the default parameters.
///
/// # Errors
/// - `MalformedToken` if the token cannot be decoded
/// - `Authentication` on a wrong password, tampering or an unknown version
pub fn decrypt_message(token: &str, password: &str) -> Result<String> {
    decrypt_message_with(token, password, &KdfParams::default())
}

/// Encrypt a message with an explicit scheme and KDF parameters.
///
/// # Preconditions
/// - `password` may be any string, including the empty one
///
/// # Postconditions
/// - Returns a printable base64-url token whose first decoded byte
///   identifies `scheme`
/// - Two calls with the same inputs never return the same token
///
/// # Errors
/// - Returns `InvalidInput` if `params` fail [`KdfParams::validate`]
/// - Returns `Crypto` if the cipher cannot be constructed
///
/// # Security
/// - Neither the message nor the password is logged
pub fn encrypt_message_with(
    message: &str,
    password: &str,
    scheme: Scheme,
    params: &KdfParams,
) -> Result<String> {
    let cipher = cipher_for(scheme, password, params)?;
    let token = cipher.seal(message)?;

    debug!(%scheme, token_len = token.len(), "Message sealed");
    Ok(token)
}

/// Decrypt a token, picking the scheme from its version byte.
pub fn decrypt_message_with(token: &str, password: &str, params: &KdfParams) -> Result<String> {
    let scheme = detect_scheme(token)?;
    debug!(%scheme, token_len = token.trim().len(), "Opening token");

    cipher_for(scheme, password, params)?.open(token)
}

/// Build the cipher for a scheme from a password.
///
/// For Fernet the key is derived here, once; the salted scheme derives per
/// token from the salt it carries and only uses `params.iterations`.
pub fn cipher_for(
    scheme: Scheme,
    password: &str,
    params: &KdfParams,
) -> Result<Box<dyn AuthenticatedCipher>> {
    params.validate()?;

    Ok(match scheme {
        Scheme::Fernet => {
            let deriver = KeyDeriver::new(params.clone())?;
            Box::new(Fernet::new(deriver.derive(password)))
        }
        Scheme::Salted => Box::new(SaltedCipher::with_iterations(password, params.iterations)?),
    })
}

/// Identify the scheme of a token without a key.
///
/// The version byte is not authenticated at this point; the chosen cipher
/// still verifies it.
///
/// # Errors
/// - `MalformedToken` if the token is not base64-url or empty
/// - `Authentication` if the version byte belongs to no known scheme
pub fn detect_scheme(token: &str) -> Result<Scheme> {
    let data = encoding::decode(token)?;
    let first = *data
        .first()
        .ok_or_else(|| Error::MalformedToken("Token is empty".to_string()))?;

    Scheme::from_version_byte(first).ok_or(Error::Authentication)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_params() -> KdfParams {
        KdfParams::new(b"fixed_salt_for_tanja".to_vec(), 1)
    }

    #[test]
    fn test_roundtrip_each_scheme() {
        let params = fast_params();

        for scheme in [Scheme::Fernet, Scheme::Salted] {
            let token = encrypt_message_with("meet at 9am", "pw", scheme, &params).unwrap();
            assert_eq!(detect_scheme(&token).unwrap(), scheme);
            assert_eq!(
                decrypt_message_with(&token, "pw", &params).unwrap(),
                "meet at 9am"
            );
        }
    }

    #[test]
    fn test_wrong_password_each_scheme() {
        let params = fast_params();

        for scheme in [Scheme::Fernet, Scheme::Salted] {
            let token = encrypt_message_with("secret", "pw", scheme, &params).unwrap();
            let result = decrypt_message_with(&token, "other", &params);
            assert!(matches!(result, Err(Error::Authentication)));
        }
    }

    #[test]
    fn test_fernet_salt_mismatch_fails() {
        let token = encrypt_message_with("secret", "pw", Scheme::Fernet, &fast_params()).unwrap();
        let other = KdfParams::new(b"another_salt".to_vec(), 1);

        assert!(matches!(
            decrypt_message_with(&token, "pw", &other),
            Err(Error::Authentication)
        ));
    }

    #[test]
    fn test_salted_ignores_configured_salt() {
        let token = encrypt_message_with("secret", "pw", Scheme::Salted, &fast_params()).unwrap();
        let other = KdfParams::new(b"another_salt".to_vec(), 1);

        assert_eq!(decrypt_message_with(&token, "pw", &other).unwrap(), "secret");
    }

    #[test]
    fn test_unknown_version() {
        let token = encoding::encode(&[0x07; 80]);

        assert!(matches!(detect_scheme(&token), Err(Error::Authentication)));
        assert!(matches!(
            decrypt_message_with(&token, "pw", &fast_params()),
            Err(Error::Authentication)
        ));
    }

    #[test]
    fn test_empty_token_is_malformed() {
        assert!(matches!(detect_scheme(""), Err(Error::MalformedToken(_))));
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let params = KdfParams::new(b"salt".to_vec(), 0);

        for scheme in [Scheme::Fernet, Scheme::Salted] {
            assert!(matches!(
                encrypt_message_with("m", "pw", scheme, &params),
                Err(Error::InvalidInput(_))
            ));
        }
    }
}
