//! Error types for wikivault core primitives.

use thiserror::Error;

/// Errors raised by the cryptographic and encoding primitives.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("encryption error: {0}")]
    EncryptionError(String),

    #[error("decryption error: {0}")]
    DecryptionError(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),

    #[error("invalid revision id: {0}")]
    InvalidRevision(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
