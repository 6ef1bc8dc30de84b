//! Encrypted envelopes.
//!
//! [`EncryptedPayload`] is symmetric: whoever holds the key can open it.
//! [`SealedBox`] is asymmetric: an ephemeral X25519 agreement with the
//! recipient's public key yields the symmetric key, so only the recipient's
//! secret opens it. Both encode to CBOR for the wire.

use serde::{Deserialize, Serialize};

use crate::crypto::{EncryptionNonce, EphemeralKeyPair, SymmetricKey, X25519PublicKey, X25519SecretKey};
use crate::error::{CoreError, Result};

/// Cipher tag carried on the wire, so new ciphers can be added later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EncryptionFormat {
    ChaCha20Poly1305 = 1,
}

/// A symmetrically encrypted payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    pub format: EncryptionFormat,

    pub nonce: EncryptionNonce,

    /// Ciphertext followed by the Poly1305 tag.
    pub ciphertext: Vec<u8>,
}

impl EncryptedPayload {
    /// Encrypt under `key` with a fresh nonce.
    pub fn encrypt(plaintext: &[u8], key: &SymmetricKey) -> Result<Self> {
        let nonce = EncryptionNonce::generate();
        let ciphertext = key.encrypt(plaintext, &nonce)?;

        Ok(Self {
            format: EncryptionFormat::ChaCha20Poly1305,
            nonce,
            ciphertext,
        })
    }

    pub fn decrypt(&self, key: &SymmetricKey) -> Result<Vec<u8>> {
        match self.format {
            EncryptionFormat::ChaCha20Poly1305 => key.decrypt(&self.ciphertext, &self.nonce),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        to_cbor(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        from_cbor(bytes)
    }
}

/// A payload sealed to one recipient's X25519 public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBox {
    /// Sender's single-use agreement key.
    pub ephemeral_public: X25519PublicKey,

    /// The payload, encrypted with the derived shared secret.
    pub payload: EncryptedPayload,
}

impl SealedBox {
    /// Seal `plaintext` for `recipient`.
    ///
    /// `context` is mixed into the key derivation; the recipient must pass
    /// the same bytes to [`SealedBox::open`].
    pub fn seal(plaintext: &[u8], recipient: &X25519PublicKey, context: &[u8]) -> Result<Self> {
        let ephemeral = EphemeralKeyPair::generate();
        let ephemeral_public = ephemeral.public_key();

        let shared = ephemeral.diffie_hellman(recipient);
        let wrap_key = shared.derive_symmetric_key(context);

        Ok(Self {
            ephemeral_public,
            payload: EncryptedPayload::encrypt(plaintext, &wrap_key)?,
        })
    }

    /// Open with the recipient's secret key.
    pub fn open(&self, recipient: &X25519SecretKey, context: &[u8]) -> Result<Vec<u8>> {
        let shared = recipient.diffie_hellman(&self.ephemeral_public);
        let wrap_key = shared.derive_symmetric_key(context);
        self.payload.decrypt(&wrap_key)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        to_cbor(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        from_cbor(bytes)
    }
}

/// Encode any serializable value as CBOR.
pub fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| CoreError::EncodingError(e.to_string()))?;
    Ok(buf)
}

/// Decode a CBOR value.
pub fn from_cbor<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = SymmetricKey::generate();
        let envelope = EncryptedPayload::encrypt(b"hello, encrypted world!", &key).unwrap();

        assert_eq!(envelope.decrypt(&key).unwrap(), b"hello, encrypted world!");
    }

    #[test]
    fn test_envelope_serialization() {
        let key = SymmetricKey::generate();
        let envelope = EncryptedPayload::encrypt(b"test", &key).unwrap();

        let bytes = envelope.to_bytes().unwrap();
        let recovered = EncryptedPayload::from_bytes(&bytes).unwrap();

        assert_eq!(envelope, recovered);
    }

    #[test]
    fn test_wrong_key_fails() {
        let envelope = EncryptedPayload::encrypt(b"secret", &SymmetricKey::generate()).unwrap();
        assert!(envelope.decrypt(&SymmetricKey::generate()).is_err());
    }

    #[test]
    fn test_sealed_box_roundtrip() {
        let recipient = X25519SecretKey::generate();
        let sealed = SealedBox::seal(b"for bob", &recipient.public_key(), b"Inbox:bob").unwrap();

        let bytes = sealed.to_bytes().unwrap();
        let recovered = SealedBox::from_bytes(&bytes).unwrap();

        assert_eq!(recovered.open(&recipient, b"Inbox:bob").unwrap(), b"for bob");
    }

    #[test]
    fn test_sealed_box_wrong_recipient_fails() {
        let recipient = X25519SecretKey::generate();
        let other = X25519SecretKey::generate();
        let sealed = SealedBox::seal(b"for bob", &recipient.public_key(), b"ctx").unwrap();

        assert!(sealed.open(&other, b"ctx").is_err());
    }

    #[test]
    fn test_sealed_box_context_bound() {
        let recipient = X25519SecretKey::generate();
        let sealed = SealedBox::seal(b"for bob", &recipient.public_key(), b"Inbox:bob").unwrap();

        assert!(sealed.open(&recipient, b"Inbox:mallory").is_err());
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(SealedBox::from_bytes(&[0xff, 0x00, 0x13]).is_err());
        assert!(SealedBox::from_bytes(&[]).is_err());
    }
}
