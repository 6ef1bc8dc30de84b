//! # wikivault Core
//!
//! Pure primitives for wikivault: signing keys, sealed boxes, symmetric
//! envelopes and revision bounds.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`Keypair`] / [`Ed25519SecretKey`] - Ed25519 signing (owner keys, generation write keys)
//! - [`X25519SecretKey`] / [`X25519PublicKey`] - inbox key agreement
//! - [`SymmetricKey`] - ChaCha20-Poly1305 content keys
//! - [`SealedBox`] - asymmetric encryption to one recipient
//! - [`RevisionStart`] / [`RevisionEnd`] - validity bounds of a key generation

pub mod crypto;
pub mod envelope;
pub mod error;
pub mod revision;

pub use crypto::{
    Ed25519PublicKey, Ed25519SecretKey, Ed25519Signature, EncryptionNonce, EphemeralKeyPair,
    Keypair, SharedKey, SymmetricKey, X25519PublicKey, X25519SecretKey,
};
pub use envelope::{from_cbor, to_cbor, EncryptedPayload, EncryptionFormat, SealedBox};
pub use error::{CoreError, Result};
pub use revision::{RevisionEnd, RevisionId, RevisionStart, REVISION_SENTINEL};
