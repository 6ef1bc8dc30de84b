//! Error types for the inbox module.

use thiserror::Error;

/// Errors that can occur while delivering to or reading an inbox.
#[derive(Debug, Error)]
pub enum InboxError {
    /// No contact with this nickname.
    #[error("unknown contact: {0}")]
    UnknownContact(String),

    /// No mailbox of ours is handed to this peer.
    #[error("no inbox for peer: {0}")]
    UnknownOwnContact(String),

    /// The inbox is write-only here; its secret key is not held.
    #[error("inbox {page_name} cannot be read: secret key not held")]
    NotReadable { page_name: String },

    /// An inbox entry could not be opened or decoded.
    #[error("malformed inbox entry: {0}")]
    MalformedEntry(String),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] wikivault_store::StoreError),

    /// Keyring operation failed.
    #[error(transparent)]
    Keyring(#[from] wikivault_keyring::KeyringError),

    /// Access record error.
    #[error(transparent)]
    Access(#[from] wikivault_access::AccessError),

    /// Core primitive error.
    #[error("core error: {0}")]
    Core(#[from] wikivault_core::CoreError),
}

/// Result type for inbox operations.
pub type Result<T> = std::result::Result<T, InboxError>;
