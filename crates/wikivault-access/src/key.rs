//! A single key generation of an AccessFile.
//!
//! Each generation carries a symmetric content key and its own Ed25519
//! write keypair. The owner signs the generation twice:
//!
//! - the **read** signature covers `symm_key || public_key`, so a holder of
//!   only those two values can prove read access;
//! - the **write** signature covers the generation's private key, so only a
//!   holder of the private key can prove write access.

use serde::{Deserialize, Serialize};

use wikivault_core::{
    Ed25519PublicKey, Ed25519SecretKey, Ed25519Signature, Keypair, RevisionEnd, RevisionId,
    RevisionStart, SymmetricKey,
};

/// One key generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessFileKey {
    /// Symmetric content key.
    pub symm_key: SymmetricKey,

    /// Write key. Absent on read-only copies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<Ed25519SecretKey>,

    /// Public half of the write key.
    pub public_key: Ed25519PublicKey,

    /// Owner signature over the private key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_write_key: Option<Ed25519Signature>,

    /// Owner signature over `symm_key || public_key`.
    #[serde(default)]
    pub signed_read_keys: Option<Ed25519Signature>,

    pub revision_start: RevisionStart,
    pub revision_end: RevisionEnd,
}

impl AccessFileKey {
    /// Mint a fresh generation signed by `owner`.
    pub fn generate(owner: &Keypair, revision_start: RevisionStart) -> Self {
        let symm_key = SymmetricKey::generate();
        let write = Keypair::generate();
        let public_key = write.public_key();
        let private_key = write.secret_key();

        let signed_read_keys = owner.sign(&read_message(&symm_key, &public_key));
        let signed_write_key = owner.sign(private_key.as_bytes());

        Self {
            symm_key,
            private_key: Some(private_key),
            public_key,
            signed_write_key: Some(signed_write_key),
            signed_read_keys: Some(signed_read_keys),
            revision_start,
            revision_end: RevisionEnd::Unbounded,
        }
    }

    /// Check both owner signatures. Fails closed.
    ///
    /// The write signature is only checked when the private key is held; a
    /// held private key must also derive `public_key`.
    pub fn verify(&self, owner: &Ed25519PublicKey) -> bool {
        let Some(read_sig) = &self.signed_read_keys else {
            return false;
        };
        if owner
            .verify(&read_message(&self.symm_key, &self.public_key), read_sig)
            .is_err()
        {
            return false;
        }

        match &self.private_key {
            None => true,
            Some(private_key) => {
                let Some(write_sig) = &self.signed_write_key else {
                    return false;
                };
                private_key.public_key() == self.public_key
                    && owner.verify(private_key.as_bytes(), write_sig).is_ok()
            }
        }
    }

    /// Whether this is the active (unbounded) generation.
    pub fn is_active(&self) -> bool {
        self.revision_end.is_unbounded()
    }

    /// Whether `rev` falls in this generation's range.
    ///
    /// Retired generations cover `start..=end`; active ones cover `start..`.
    /// A generation that was never used covers nothing.
    pub fn contains(&self, rev: RevisionId) -> bool {
        let Some(start) = self.revision_start.id() else {
            return false;
        };
        match self.revision_end {
            RevisionEnd::Unbounded => rev >= start,
            RevisionEnd::At(end) => start <= rev && rev <= end,
        }
    }

    /// The generation's write keypair, if held.
    pub fn write_keypair(&self) -> Option<Keypair> {
        self.private_key.as_ref().map(Ed25519SecretKey::to_keypair)
    }

    /// Drop everything that proves write access.
    pub fn strip_write_access(&mut self) {
        self.private_key = None;
        self.signed_write_key = None;
    }

    /// Fold another copy of the same generation into this one.
    ///
    /// Both sides must carry the same public key.
    pub(crate) fn absorb(&mut self, other: &AccessFileKey) {
        debug_assert_eq!(self.public_key, other.public_key);

        if self.private_key.is_none() && other.private_key.is_some() {
            self.private_key = other.private_key.clone();
        }
        if self.signed_write_key.is_none() && other.signed_write_key.is_some() {
            self.signed_write_key = other.signed_write_key;
        }
        if self.signed_read_keys.is_none() && other.signed_read_keys.is_some() {
            self.signed_read_keys = other.signed_read_keys;
        }
        self.revision_start = self.revision_start.earliest(other.revision_start);
        self.revision_end = self.revision_end.most_advanced(other.revision_end);
    }
}

/// The message covered by the read signature.
fn read_message(symm_key: &SymmetricKey, public_key: &Ed25519PublicKey) -> Vec<u8> {
    let mut message = Vec::with_capacity(64);
    message.extend_from_slice(symm_key.as_bytes());
    message.extend_from_slice(public_key.as_bytes());
    message
}
