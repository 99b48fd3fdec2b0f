//! Public key and signature value types.
//!
//! Both are fixed-width raw encodings as the commissioning certificate
//! format expects: uncompressed SEC1 points for public keys, `(r, s)`
//! concatenation (not DER) for signatures.

use std::fmt;

use p256::ecdsa::VerifyingKey;
use ring::digest::{digest, SHA256};

use crate::error::{IdentityError, Result};

/// Uncompressed SEC1 point length for P-256 (`0x04 || X || Y`).
pub const PUBLIC_KEY_LEN: usize = 65;

/// Raw `(r, s)` signature length for P-256.
pub const SIGNATURE_LEN: usize = 64;

/// SHA-256 of `data`, lowercase hex.
pub(crate) fn sha256_hex(data: &[u8]) -> String {
    hex::encode(digest(&SHA256, data).as_ref())
}

/// A validated P-256 public key in uncompressed SEC1 encoding.
///
/// Always the public half of the private key its `FabricIdentity` holds;
/// immutable for the life of the instance.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey([u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    /// Parse and validate a SEC1-encoded point.
    ///
    /// Compressed points are accepted and normalized to the uncompressed
    /// encoding.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::InvalidKeyEncoding` if the bytes are not a
    /// point on P-256.
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self> {
        let key = p256::PublicKey::from_sec1_bytes(bytes).map_err(|_| {
            IdentityError::InvalidKeyEncoding(
                "byte string is not a SEC1-encoded P-256 point".to_string(),
            )
        })?;
        Ok(Self::from_verifying_key(&VerifyingKey::from(key)))
    }

    pub(crate) fn from_verifying_key(key: &VerifyingKey) -> Self {
        let point = key.to_encoded_point(false);
        let mut bytes = [0u8; PUBLIC_KEY_LEN];
        bytes.copy_from_slice(point.as_bytes());
        Self(bytes)
    }

    /// The uncompressed SEC1 encoding.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    /// SHA-256 fingerprint of the SEC1 encoding, lowercase hex.
    ///
    /// Safe for logs and mismatch diagnostics.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        sha256_hex(&self.0)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", &self.fingerprint()[..12])
    }
}

/// A raw fixed-width ECDSA P-256 signature.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature([u8; SIGNATURE_LEN]);

impl Signature {
    /// Wrap a raw `(r, s)` concatenation.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::InvalidKeyEncoding` unless `bytes` is
    /// exactly [`SIGNATURE_LEN`] bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; SIGNATURE_LEN] = bytes.try_into().map_err(|_| {
            IdentityError::InvalidKeyEncoding(format!(
                "signature must be exactly {SIGNATURE_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// The raw `(r, s)` bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }

    /// The `r` scalar half.
    #[must_use]
    pub fn r(&self) -> &[u8] {
        &self.0[..SIGNATURE_LEN / 2]
    }

    /// The `s` scalar half.
    #[must_use]
    pub fn s(&self) -> &[u8] {
        &self.0[SIGNATURE_LEN / 2..]
    }
}

impl From<p256::ecdsa::Signature> for Signature {
    fn from(sig: p256::ecdsa::Signature) -> Self {
        let mut bytes = [0u8; SIGNATURE_LEN];
        bytes.copy_from_slice(&sig.to_bytes());
        Self(bytes)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(self.0))
    }
}
