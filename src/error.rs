//! Error types for the Autocrypt core.
//!
//! Every failure here is recoverable: a caller that hits one of these
//! degrades to "header absent", "not PGP", "could not decrypt" or
//! "ask for the setup code again" and carries on.

use thiserror::Error;

/// Result type alias for Autocrypt core operations.
pub type Result<T> = std::result::Result<T, AutocryptError>;

/// Main error type for Autocrypt core operations.
#[derive(Error, Debug)]
pub enum AutocryptError {
    /// Malformed or unsupported Autocrypt header
    #[error("Header parse error: {0}")]
    Parse(String),

    /// No usable armor block in the input
    #[error("Armor framing error: {0}")]
    Framing(String),

    /// Key material that is not a structurally valid key
    #[error("Key validation error: {0}")]
    KeyValidation(String),

    /// No matching private key, or corrupt ciphertext
    #[error("Decryption error: {0}")]
    Decryption(String),

    /// Symmetric unprotect of a setup message failed
    #[error("Wrong setup code")]
    WrongSetupCode,

    /// Failure reported by a cryptographic primitive
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Packet parsing or construction errors
    #[error("Packet error: {0}")]
    Packet(String),

    /// Input validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors surfaced by a peer-state store
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl AutocryptError {
    /// Creates a new header parse error.
    pub fn parse<T: ToString>(msg: T) -> Self {
        Self::Parse(msg.to_string())
    }

    /// Creates a new armor framing error.
    pub fn framing<T: ToString>(msg: T) -> Self {
        Self::Framing(msg.to_string())
    }

    /// Creates a new key validation error.
    pub fn key_validation<T: ToString>(msg: T) -> Self {
        Self::KeyValidation(msg.to_string())
    }

    /// Creates a new decryption error.
    pub fn decryption<T: ToString>(msg: T) -> Self {
        Self::Decryption(msg.to_string())
    }

    /// Creates a new cryptographic error.
    pub fn crypto<T: ToString>(msg: T) -> Self {
        Self::Crypto(msg.to_string())
    }

    /// Creates a new packet error.
    pub fn packet<T: ToString>(msg: T) -> Self {
        Self::Packet(msg.to_string())
    }

    /// Creates a new validation error.
    pub fn validation<T: ToString>(msg: T) -> Self {
        Self::Validation(msg.to_string())
    }

    /// Creates a new serialization error.
    pub fn serialization<T: ToString>(msg: T) -> Self {
        Self::Serialization(msg.to_string())
    }

    /// Creates a new configuration error.
    pub fn config<T: ToString>(msg: T) -> Self {
        Self::Config(msg.to_string())
    }

    /// Creates a new persistence error.
    pub fn persistence<T: ToString>(msg: T) -> Self {
        Self::Persistence(msg.to_string())
    }
}
