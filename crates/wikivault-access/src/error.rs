//! Error types for access records.

use thiserror::Error;
use wikivault_core::{CoreError, RevisionId};

/// Errors that can occur while operating on an AccessFile.
///
/// Every variant names the offending page so callers can report it.
#[derive(Debug, Error)]
pub enum AccessError {
    /// Two records share a page but are not the same entity.
    #[error("identity mismatch on page {page_name}: {field} differs")]
    IdentityMismatch {
        page_name: String,
        field: &'static str,
    },

    /// A key generation failed signature verification.
    #[error("signature verification failed for page {page_name}")]
    SignatureVerification { page_name: String },

    /// No generation is currently active.
    #[error("no active key generation for page {page_name}")]
    NoActiveKey { page_name: String },

    /// The owner private key is required but absent.
    #[error("owner private key not held for page {page_name}")]
    NotOwner { page_name: String },

    /// The active generation's write key is required but absent.
    #[error("write access not held for page {page_name}")]
    ReadOnly { page_name: String },

    /// No generation covers the requested revision.
    #[error("no key generation of page {page_name} covers revision {revision}")]
    RevisionNotCovered {
        page_name: String,
        revision: RevisionId,
    },

    /// Structural invariant of the key list is violated.
    #[error("malformed key list for page {page_name}: {reason}")]
    MalformedKeyList { page_name: String, reason: String },

    /// Core primitive error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

/// Result type for access operations.
pub type Result<T> = std::result::Result<T, AccessError>;
