//! Error types for the keyring module.

use thiserror::Error;
use wikivault_access::AccessError;
use wikivault_core::CoreError;

/// Errors that can occur while operating on a keyring tree.
#[derive(Debug, Error)]
pub enum KeyringError {
    /// A handle or path names nothing.
    #[error("missing reference: {0}")]
    MissingReference(String),

    /// A keyring already has a child with this name.
    #[error("name {name:?} already used in keyring {keyring:?}")]
    NameTaken { keyring: String, name: String },

    /// Names may not be empty or contain a path separator.
    #[error("invalid name: {0:?}")]
    InvalidName(String),

    /// A move would detach a keyring from the tree.
    #[error("cannot move {from:?} to {to:?}: {reason}")]
    InvalidMove {
        from: String,
        to: String,
        reason: &'static str,
    },

    /// A persisted document could not be read back.
    #[error("malformed keyring document: {0}")]
    MalformedDocument(String),

    /// Access record error.
    #[error(transparent)]
    Access(#[from] AccessError),

    /// Core primitive error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

impl From<serde_json::Error> for KeyringError {
    fn from(err: serde_json::Error) -> Self {
        KeyringError::MalformedDocument(err.to_string())
    }
}

/// Result type for keyring operations.
pub type Result<T> = std::result::Result<T, KeyringError>;
