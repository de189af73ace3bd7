//! Common types used throughout PwSeal.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Token scheme produced or consumed by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// Fernet tokens keyed from the fixed-salt derivation.
    ///
    /// Interoperable with tokens produced by any Fernet implementation that
    /// derives its key the same way.
    #[default]
    Fernet,

    /// XChaCha20-Poly1305 tokens carrying their own random salt.
    Salted,
}

impl Scheme {
    /// Leading version byte of a decoded token in this scheme.
    pub fn version_byte(self) -> u8 {
        match self {
            Scheme::Fernet => 0x80,
            Scheme::Salted => 0x02,
        }
    }

    /// Map a leading version byte back to its scheme.
    pub fn from_version_byte(byte: u8) -> Option<Self> {
        match byte {
            0x80 => Some(Scheme::Fernet),
            0x02 => Some(Scheme::Salted),
            _ => None,
        }
    }

    /// Lowercase name as accepted on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Fernet => "fernet",
            Scheme::Salted => "salted",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fernet" => Ok(Scheme::Fernet),
            "salted" => Ok(Scheme::Salted),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown scheme '{}'. Use: fernet or salted",
                other
            ))),
        }
    }
}

/// Sensitive data wrapper that zeroizes on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SensitiveBytes(Vec<u8>);

impl SensitiveBytes {
    /// Create new sensitive bytes.
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    /// Get a reference to the inner bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Interpret the bytes as UTF-8 text.
    ///
    /// The returned string is a fresh copy; the wrapped buffer is still
    /// zeroized when `self` drops.
    pub fn to_utf8(&self) -> crate::Result<String> {
        std::str::from_utf8(&self.0)
            .map(str::to_owned)
            .map_err(|_| crate::Error::MalformedToken("Plaintext is not valid UTF-8".to_string()))
    }
}

impl fmt::Debug for SensitiveBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SensitiveBytes([REDACTED; {} bytes])", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_version_bytes() {
        for scheme in [Scheme::Fernet, Scheme::Salted] {
            assert_eq!(Scheme::from_version_byte(scheme.version_byte()), Some(scheme));
        }
        assert_eq!(Scheme::from_version_byte(0x81), None);
    }

    #[test]
    fn test_scheme_parse() {
        assert_eq!("fernet".parse::<Scheme>().unwrap(), Scheme::Fernet);
        assert_eq!("SALTED".parse::<Scheme>().unwrap(), Scheme::Salted);
        assert!("gcm".parse::<Scheme>().is_err());
    }

    #[test]
    fn test_scheme_default_is_fernet() {
        assert_eq!(Scheme::default(), Scheme::Fernet);
    }

    #[test]
    fn test_scheme_serde_lowercase() {
        let json = serde_json::to_string(&Scheme::Salted).unwrap();
        assert_eq!(json, "\"salted\"");
    }

    #[test]
    fn test_sensitive_bytes_debug_redacted() {
        let bytes = SensitiveBytes::new(b"secret".to_vec());
        assert_eq!(format!("{:?}", bytes), "SensitiveBytes([REDACTED; 6 bytes])");
    }

    #[test]
    fn test_sensitive_bytes_utf8() {
        let ok = SensitiveBytes::new("grüße".as_bytes().to_vec());
        assert_eq!(ok.to_utf8().unwrap(), "grüße");

        let bad = SensitiveBytes::new(vec![0xff, 0xfe]);
        assert!(matches!(bad.to_utf8(), Err(crate::Error::MalformedToken(_))));
    }
}
