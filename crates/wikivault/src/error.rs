//! Error types for the keyring manager.

use wikivault_access::AccessError;
use wikivault_core::{CoreError, RevisionId};
use wikivault_inbox::InboxError;
use wikivault_keyring::KeyringError;
use wikivault_store::StoreError;
use thiserror::Error;

/// Errors that can occur during manager operations.
#[derive(Debug, Error)]
pub enum WikivaultError {
    /// Reading or writing a keyring document failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Keyring tree error.
    #[error(transparent)]
    Keyring(#[from] KeyringError),

    /// Access record error.
    #[error(transparent)]
    Access(#[from] AccessError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Inbox error.
    #[error("inbox error: {0}")]
    Inbox(#[from] InboxError),

    /// Core primitive error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// No entry at this path.
    #[error("not found: {0}")]
    NotFound(String),

    /// The store has no such revision of the page.
    #[error("revision {revision} of page {page_name} not found")]
    RevisionNotFound {
        page_name: String,
        revision: RevisionId,
    },
}

/// Result type for manager operations.
pub type Result<T> = std::result::Result<T, WikivaultError>;
