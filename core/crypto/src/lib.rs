//! Cryptographic core of PwSeal.
//!
//! This module provides:
//! - Key derivation using PBKDF2-HMAC-SHA256
//! - Fernet tokens (AES-128-CBC + HMAC-SHA256) for interop with existing tokens
//! - Salted XChaCha20-Poly1305 tokens with a random salt per message
//! - `encrypt_message` / `decrypt_message`, the password-level entry points
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext, password or key material is ever logged
//! - Authentication tags are compared in constant time
//! - A wrong password and a tampered token produce the same error

pub mod aead;
pub mod cipher;
pub mod encoding;
pub mod fernet;
pub mod kdf;
pub mod keys;
pub mod message;

pub use aead::SaltedCipher;
pub use cipher::AuthenticatedCipher;
pub use fernet::Fernet;
pub use kdf::{KdfParams, KeyDeriver, DEFAULT_ITERATIONS, DEFAULT_SALT};
pub use keys::{DerivedKey, Salt, KEY_LENGTH};
pub use message::{
    cipher_for, decrypt_message, decrypt_message_with, detect_scheme, encrypt_message,
    encrypt_message_with,
};
