//! Sealed page revisions.
//!
//! A revision of an encrypted file is the content encrypted under the
//! active generation's symmetric key, signed by that generation's write key.
//! Readers pick the generation by revision id, check the signature against
//! the generation public key, and decrypt.

use serde::{Deserialize, Serialize};

use wikivault_core::{from_cbor, to_cbor, EncryptedPayload, Ed25519Signature, RevisionId};

use crate::access_file::AccessFile;
use crate::error::{AccessError, Result};

/// The bytes uploaded to the revision store for one revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedRevision {
    pub payload: EncryptedPayload,

    /// Generation write-key signature over `nonce || ciphertext`.
    pub signature: Ed25519Signature,
}

impl SealedRevision {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(to_cbor(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(from_cbor(bytes)?)
    }

    fn signed_message(payload: &EncryptedPayload) -> Vec<u8> {
        let mut message = Vec::with_capacity(payload.nonce.0.len() + payload.ciphertext.len());
        message.extend_from_slice(&payload.nonce.0);
        message.extend_from_slice(&payload.ciphertext);
        message
    }
}

impl AccessFile {
    /// Encrypt and sign `plaintext` with the active generation.
    ///
    /// Requires the generation's write key.
    pub fn seal_content(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let active = self.active_key().ok_or_else(|| AccessError::NoActiveKey {
            page_name: self.page_name.clone(),
        })?;
        let writer = active.write_keypair().ok_or_else(|| AccessError::ReadOnly {
            page_name: self.page_name.clone(),
        })?;

        let payload = EncryptedPayload::encrypt(plaintext, &active.symm_key)?;
        let signature = writer.sign(&SealedRevision::signed_message(&payload));

        SealedRevision { payload, signature }.to_bytes()
    }

    /// Verify and decrypt the content of revision `rev`.
    pub fn open_content(&self, rev: RevisionId, sealed: &[u8]) -> Result<Vec<u8>> {
        let key = self
            .lookup_by_revision(rev)
            .ok_or_else(|| AccessError::RevisionNotCovered {
                page_name: self.page_name.clone(),
                revision: rev,
            })?;

        let sealed = SealedRevision::from_bytes(sealed)?;
        key.public_key
            .verify(&SealedRevision::signed_message(&sealed.payload), &sealed.signature)
            .map_err(|_| AccessError::SignatureVerification {
                page_name: self.page_name.clone(),
            })?;

        Ok(sealed.payload.decrypt(&key.symm_key)?)
    }
}
