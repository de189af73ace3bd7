//! Base64-url framing shared by every token and key string.

use base64::{
    alphabet,
    engine::{general_purpose::GeneralPurpose, DecodePaddingMode, GeneralPurposeConfig},
    Engine,
};

use pwseal_common::{Error, Result};

/// URL-safe alphabet, padded on encode, padding optional on decode.
const TOKEN_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encode bytes as padded base64-url.
pub fn encode(bytes: &[u8]) -> String {
    TOKEN_ENGINE.encode(bytes)
}

/// Decode a base64-url string, ignoring surrounding whitespace.
///
/// # Errors
/// - Returns `MalformedToken` if the input is not base64-url
pub fn decode(text: &str) -> Result<Vec<u8>> {
    TOKEN_ENGINE
        .decode(text.trim())
        .map_err(|_| Error::MalformedToken("Token is not valid base64-url".to_string()))
}
