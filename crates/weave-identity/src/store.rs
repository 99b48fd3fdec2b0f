//! Secure key store contract and the in-memory software store.
//!
//! A store-backed identity owns an opaque [`KeyHandle`]; the store owns
//! the private key bytes. The store is never asked to export a private
//! scalar -- only to report public halves and to sign digests by
//! reference.

use std::collections::HashMap;
use std::fmt;

use p256::ecdsa::signature::hazmat::PrehashSigner;
use p256::ecdsa::{Signature as EcdsaSignature, SigningKey};
use p256::pkcs8::DecodePrivateKey;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{IdentityError, Result};
use crate::keypair::generate_signing_key;
use crate::keys::{PublicKey, Signature};

/// Opaque reference to a private key resident in a secure store.
///
/// The handle carries no key material. Its meaning is private to the
/// store that issued it; holding a handle to a deleted entry is legal and
/// surfaces as a signing error on next use.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyHandle(String);

impl KeyHandle {
    /// Wrap a store-issued reference string.
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// The reference as issued by the store.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Contract this component requires from a secure key store.
///
/// Implementations must be safe for concurrent signing operations; the
/// identity does not serialize access. A hardware-resident key may block
/// in [`sign_digest`](Self::sign_digest).
pub trait SecureKeyStore: Send + Sync {
    /// Report the public half of the key behind `handle`.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Store` if the handle is unknown or the
    /// backend fails.
    fn public_key(&self, handle: &KeyHandle) -> Result<PublicKey>;

    /// Produce a raw fixed-width ECDSA P-256 signature over a
    /// caller-supplied SHA-256 digest.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Signing` if the handle is no longer
    /// usable, e.g. the entry was deleted after the identity was
    /// constructed.
    fn sign_digest(&self, handle: &KeyHandle, digest: &[u8; 32]) -> Result<Signature>;
}

/// In-memory software key store.
///
/// Stands in for a hardware-backed store in tests and software-only
/// deployments. Keys live for the lifetime of the store and are dropped
/// (and zeroized by the underlying `SigningKey`) with it.
#[derive(Default)]
pub struct SoftwareKeyStore {
    keys: RwLock<HashMap<KeyHandle, SigningKey>>,
}

impl SoftwareKeyStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a fresh P-256 key under `label`.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::KeyGeneration` if the random source fails,
    /// or `IdentityError::Store` if `label` is already occupied.
    pub fn generate_key(&self, label: &str) -> Result<KeyHandle> {
        let key = generate_signing_key()?;
        self.insert(label, key)
    }

    /// Import a PKCS#8 DER private key under `label`.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::InvalidKeyEncoding` if the DER is not a
    /// valid P-256 private key, or `IdentityError::Store` if `label` is
    /// already occupied.
    pub fn import_pkcs8_der(&self, label: &str, der: &[u8]) -> Result<KeyHandle> {
        let key = SigningKey::from_pkcs8_der(der).map_err(|e| {
            IdentityError::InvalidKeyEncoding(format!("not a PKCS#8 P-256 private key: {e}"))
        })?;
        self.insert(label, key)
    }

    /// Import a PEM-armored (`PRIVATE KEY`) PKCS#8 key under `label`.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::InvalidKeyEncoding` on malformed PEM or
    /// key material, or `IdentityError::Store` if `label` is occupied.
    pub fn import_pem(&self, label: &str, pem_text: &str) -> Result<KeyHandle> {
        let block = pem::parse(pem_text).map_err(|e| {
            IdentityError::InvalidKeyEncoding(format!("malformed PEM: {e}"))
        })?;
        if block.tag() != "PRIVATE KEY" {
            return Err(IdentityError::InvalidKeyEncoding(format!(
                "expected a PRIVATE KEY block, found {}",
                block.tag()
            )));
        }
        self.import_pkcs8_der(label, block.contents())
    }

    /// Delete the key behind `handle`.
    ///
    /// Outstanding identities holding this handle keep their cached
    /// public key but fail with a signing error on next use. Returns
    /// whether an entry was removed.
    pub fn remove_key(&self, handle: &KeyHandle) -> bool {
        let removed = self.keys.write().remove(handle).is_some();
        if removed {
            debug!(handle = %handle, "removed key store entry");
        }
        removed
    }

    fn insert(&self, label: &str, key: SigningKey) -> Result<KeyHandle> {
        let handle = KeyHandle::new(label);
        let mut keys = self.keys.write();
        if keys.contains_key(&handle) {
            return Err(IdentityError::Store(format!(
                "key store label already in use: {label}"
            )));
        }
        keys.insert(handle.clone(), key);
        debug!(handle = %handle, "installed key store entry");
        Ok(handle)
    }
}

impl SecureKeyStore for SoftwareKeyStore {
    fn public_key(&self, handle: &KeyHandle) -> Result<PublicKey> {
        let keys = self.keys.read();
        let key = keys
            .get(handle)
            .ok_or_else(|| IdentityError::Store(format!("unknown key handle: {handle}")))?;
        Ok(PublicKey::from_verifying_key(key.verifying_key()))
    }

    fn sign_digest(&self, handle: &KeyHandle, digest: &[u8; 32]) -> Result<Signature> {
        let keys = self.keys.read();
        let key = keys.get(handle).ok_or_else(|| {
            IdentityError::Signing(format!("key store entry no longer exists: {handle}"))
        })?;
        let sig: EcdsaSignature = key
            .sign_prehash(digest)
            .map_err(|e| IdentityError::Signing(e.to_string()))?;
        Ok(sig.into())
    }
}

impl fmt::Debug for SoftwareKeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftwareKeyStore")
            .field("keys", &self.keys.read().len())
            .finish()
    }
}
