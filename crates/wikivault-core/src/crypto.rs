//! Cryptographic primitives for wikivault.
//!
//! Wraps Ed25519 signing, X25519 key agreement and ChaCha20-Poly1305
//! authenticated encryption with strong types. Every key newtype serializes
//! as a lowercase hex string so persisted documents stay readable.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use std::fmt;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use crate::error::{CoreError, Result};

/// Byte accessors, hex serde and `Debug` for a `[u8; N]` newtype.
///
/// `public` types also get `to_hex`/`from_hex`, `AsRef<[u8]>` and a `Debug`
/// showing a short hex prefix. `secret` types print as redacted.
macro_rules! byte_newtype {
    (public $ty:ident, $len:expr, $label:literal) => {
        byte_newtype!(@common $ty, $len);

        impl $ty {
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            pub fn from_hex(s: &str) -> std::result::Result<Self, hex::FromHexError> {
                let mut bytes = [0u8; $len];
                hex::decode_to_slice(s, &mut bytes)?;
                Ok(Self(bytes))
            }
        }

        impl AsRef<[u8]> for $ty {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({}..)"), &self.to_hex()[..12])
            }
        }
    };
    (secret $ty:ident, $len:expr, $label:literal) => {
        byte_newtype!(@common $ty, $len);

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(concat!($label, "(redacted)"))
            }
        }
    };
    (@common $ty:ident, $len:expr) => {
        impl $ty {
            pub const fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl serde::Serialize for $ty {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&hex::encode(self.0))
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let text = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
                let mut bytes = [0u8; $len];
                hex::decode_to_slice(text.as_ref(), &mut bytes).map_err(|e| {
                    serde::de::Error::custom(format_args!(
                        "expected {} hex-encoded bytes: {}",
                        $len, e
                    ))
                })?;
                Ok(Self(bytes))
            }
        }
    };
}

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

// ─────────────────────────────────────────────────────────────────────────────
// Ed25519
// ─────────────────────────────────────────────────────────────────────────────

/// Verifying half of an Ed25519 key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ed25519PublicKey(pub [u8; 32]);

byte_newtype!(public Ed25519PublicKey, 32, "Ed25519Pub");

impl Ed25519PublicKey {
    /// Check `signature` over `message`.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<()> {
        let key = VerifyingKey::from_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)?;
        key.verify(message, &Signature::from_bytes(&signature.0))
            .map_err(|_| CoreError::InvalidSignature)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ed25519Signature(pub [u8; 64]);

byte_newtype!(public Ed25519Signature, 64, "Ed25519Sig");

/// The 32-byte seed of an Ed25519 signing key.
///
/// This is the serializable form of a [`Keypair`]. It is what an
/// AccessFile stores as an owner or generation private key.
#[derive(Clone, PartialEq, Eq)]
pub struct Ed25519SecretKey(pub(crate) [u8; 32]);

byte_newtype!(secret Ed25519SecretKey, 32, "Ed25519Secret");

impl Ed25519SecretKey {
    pub fn to_keypair(&self) -> Keypair {
        Keypair::from_seed(&self.0)
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        self.to_keypair().public_key()
    }
}

/// An Ed25519 signing key.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut rand::thread_rng()),
        }
    }

    /// Deterministic keypair from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// The seed, in the form AccessFiles persist.
    pub fn secret_key(&self) -> Ed25519SecretKey {
        Ed25519SecretKey(self.signing_key.to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        Ed25519Signature(self.signing_key.sign(message).to_bytes())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Keypair").field(&self.public_key()).finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// X25519
// ─────────────────────────────────────────────────────────────────────────────

/// Public half of an inbox or ephemeral agreement key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct X25519PublicKey(pub [u8; 32]);

byte_newtype!(public X25519PublicKey, 32, "X25519Pub");

impl X25519PublicKey {
    fn to_dalek(self) -> PublicKey {
        PublicKey::from(self.0)
    }
}

impl From<PublicKey> for X25519PublicKey {
    fn from(key: PublicKey) -> Self {
        Self(key.to_bytes())
    }
}

/// Long-lived X25519 secret. Agreement only; inbox pages use these.
#[derive(Clone, PartialEq, Eq)]
pub struct X25519SecretKey(pub(crate) [u8; 32]);

byte_newtype!(secret X25519SecretKey, 32, "X25519Secret");

impl X25519SecretKey {
    pub fn generate() -> Self {
        Self(random_bytes())
    }

    pub fn public_key(&self) -> X25519PublicKey {
        PublicKey::from(&StaticSecret::from(self.0)).into()
    }

    pub fn diffie_hellman(&self, peer: &X25519PublicKey) -> SharedKey {
        let shared = StaticSecret::from(self.0).diffie_hellman(&peer.to_dalek());
        SharedKey(shared.to_bytes())
    }
}

/// Raw output of an X25519 agreement. Never used as a key directly.
#[derive(Clone)]
pub struct SharedKey([u8; 32]);

impl SharedKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Symmetric key for this agreement, bound to `context`.
    pub fn derive_symmetric_key(&self, context: &[u8]) -> SymmetricKey {
        let mut hasher = blake3::Hasher::new_derive_key("wikivault-v1 sealed-box");
        hasher.update(&self.0);
        hasher.update(context);
        SymmetricKey(*hasher.finalize().as_bytes())
    }
}

/// Single-use sender key for a [`SealedBox`](crate::envelope::SealedBox).
pub struct EphemeralKeyPair {
    secret: EphemeralSecret,
    public: X25519PublicKey,
}

impl EphemeralKeyPair {
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random_from_rng(rand::thread_rng());
        let public = PublicKey::from(&secret).into();
        Self { secret, public }
    }

    pub fn public_key(&self) -> X25519PublicKey {
        self.public
    }

    /// Agree with `peer`, consuming the secret.
    pub fn diffie_hellman(self, peer: &X25519PublicKey) -> SharedKey {
        SharedKey(self.secret.diffie_hellman(&peer.to_dalek()).to_bytes())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Symmetric
// ─────────────────────────────────────────────────────────────────────────────

/// A ChaCha20-Poly1305 key. Each keyring entry and each key generation
/// carries one.
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey(pub(crate) [u8; 32]);

byte_newtype!(secret SymmetricKey, 32, "SymmetricKey");

impl SymmetricKey {
    pub fn generate() -> Self {
        Self(random_bytes())
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.0))
    }

    pub fn encrypt(&self, plaintext: &[u8], nonce: &EncryptionNonce) -> Result<Vec<u8>> {
        self.cipher()
            .encrypt(Nonce::from_slice(&nonce.0), plaintext)
            .map_err(|e| CoreError::EncryptionError(e.to_string()))
    }

    /// Fails if the key is wrong or the ciphertext was altered.
    pub fn decrypt(&self, ciphertext: &[u8], nonce: &EncryptionNonce) -> Result<Vec<u8>> {
        self.cipher()
            .decrypt(Nonce::from_slice(&nonce.0), ciphertext)
            .map_err(|e| CoreError::DecryptionError(e.to_string()))
    }
}

/// A 96-bit ChaCha20-Poly1305 nonce, random per encryption.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct EncryptionNonce(pub [u8; 12]);

byte_newtype!(public EncryptionNonce, 12, "Nonce");

impl EncryptionNonce {
    pub fn generate() -> Self {
        Self(random_bytes())
    }
}
