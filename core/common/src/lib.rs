//! Common utilities and types shared across PwSeal crates.
//!
//! This module provides the error type every layer reports through and the
//! small value types passed between the core and the CLI.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{Scheme, SensitiveBytes};
