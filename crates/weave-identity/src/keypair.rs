//! CA signing keypair, raw-backed or store-backed.
//!
//! The two backings expose one capability set: sign a message, report the
//! public key. Exactly one backing is active per keypair and it never
//! changes after construction.

use std::sync::Arc;

use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature as EcdsaSignature, SigningKey};
use ring::digest::{digest, SHA256};
use ring::rand::{SecureRandom, SystemRandom};
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{IdentityError, Result};
use crate::keys::{PublicKey, Signature};
use crate::store::{KeyHandle, SecureKeyStore};

/// Private scalar length for P-256 in bytes.
pub(crate) const SCALAR_LEN: usize = 32;

/// Which representation backs an identity's private key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyBacking {
    /// Raw key bytes owned exclusively by the identity
    Raw,
    /// A reference into an external secure key store
    StoreReference,
}

/// Generate a fresh P-256 signing key from the system random source.
///
/// Scalar candidates outside `[1, n)` are rejected and redrawn; several
/// misses in a row mean the random source is broken, not unlucky.
pub(crate) fn generate_signing_key() -> Result<SigningKey> {
    let rng = SystemRandom::new();
    let mut candidate = Zeroizing::new([0u8; SCALAR_LEN]);
    for _ in 0..4 {
        rng.fill(candidate.as_mut()).map_err(|_| {
            IdentityError::KeyGeneration("system random source unavailable".to_string())
        })?;
        if let Ok(key) = SigningKey::from_slice(candidate.as_ref()) {
            return Ok(key);
        }
    }
    Err(IdentityError::KeyGeneration(
        "random source repeatedly produced out-of-range scalars".to_string(),
    ))
}

/// The fabric's CA-capable signing keypair.
pub(crate) enum CaKeyPair {
    Raw(RawKeyPair),
    Store(StoreKeyPair),
}

/// Keypair whose private scalar lives in this process.
///
/// `SigningKey` zeroizes its scalar on drop.
pub(crate) struct RawKeyPair {
    signing_key: SigningKey,
    public: PublicKey,
}

/// Keypair whose private key never leaves an external secure store.
///
/// The identity owns the reference; the store owns the bytes.
pub(crate) struct StoreKeyPair {
    store: Arc<dyn SecureKeyStore>,
    handle: KeyHandle,
    public: PublicKey,
}

impl CaKeyPair {
    /// Generate a fresh raw-backed keypair.
    pub(crate) fn generate() -> Result<Self> {
        let signing_key = generate_signing_key()?;
        Ok(Self::from_signing_key(signing_key))
    }

    /// Import a raw private scalar and derive its public key.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::InvalidKeyEncoding` if the scalar has the
    /// wrong length, is zero, or is not below the curve order.
    pub(crate) fn from_scalar(scalar: &[u8]) -> Result<Self> {
        if scalar.len() != SCALAR_LEN {
            return Err(IdentityError::InvalidKeyEncoding(format!(
                "private scalar must be {SCALAR_LEN} bytes, got {}",
                scalar.len()
            )));
        }
        let signing_key = SigningKey::from_slice(scalar).map_err(|_| {
            IdentityError::InvalidKeyEncoding(
                "private scalar is zero or not below the curve order".to_string(),
            )
        })?;
        Ok(Self::from_signing_key(signing_key))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let public = PublicKey::from_verifying_key(signing_key.verifying_key());
        Self::Raw(RawKeyPair {
            signing_key,
            public,
        })
    }

    /// Wrap a store reference whose public key has already been validated.
    pub(crate) fn store_backed(
        store: Arc<dyn SecureKeyStore>,
        handle: KeyHandle,
        public: PublicKey,
    ) -> Self {
        Self::Store(StoreKeyPair {
            store,
            handle,
            public,
        })
    }

    pub(crate) fn backing(&self) -> KeyBacking {
        match self {
            Self::Raw(_) => KeyBacking::Raw,
            Self::Store(_) => KeyBacking::StoreReference,
        }
    }

    pub(crate) fn public_key(&self) -> &PublicKey {
        match self {
            Self::Raw(pair) => &pair.public,
            Self::Store(pair) => &pair.public,
        }
    }

    /// ECDSA P-256 / SHA-256 signature over `message`, raw `(r, s)` form.
    ///
    /// Store-backed keypairs hash here and delegate the raw signing
    /// operation over the digest to the store.
    pub(crate) fn sign(&self, message: &[u8]) -> Result<Signature> {
        match self {
            Self::Raw(pair) => {
                let sig: EcdsaSignature = pair
                    .signing_key
                    .try_sign(message)
                    .map_err(|e| IdentityError::Signing(e.to_string()))?;
                Ok(sig.into())
            }
            Self::Store(pair) => {
                let mut sha256 = [0u8; 32];
                sha256.copy_from_slice(digest(&SHA256, message).as_ref());
                debug!(handle = %pair.handle, "delegating signature to secure key store");
                pair.store.sign_digest(&pair.handle, &sha256)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::signature::Verifier;
    use p256::ecdsa::VerifyingKey;

    /// Uncompressed encoding of the P-256 base point: scalar 1 times G.
    const GENERATOR_SEC1: &str = "046b17d1f2e12c4247f8bce6e563a440f277037d812deb33a0f4a13945d898c2964fe342e2fe1a7f9b8ee7eb4a7c0f9e162bce33576b315ececbb6406837bf51f5";

    /// The P-256 group order n.
    const CURVE_ORDER: &str = "ffffffff00000000ffffffffffffffffbce6faada7179e84f3b9cac2fc632551";

    fn scalar_one() -> [u8; SCALAR_LEN] {
        let mut s = [0u8; SCALAR_LEN];
        s[SCALAR_LEN - 1] = 1;
        s
    }

    #[test]
    fn scalar_one_yields_generator() {
        let pair = CaKeyPair::from_scalar(&scalar_one()).unwrap();
        assert_eq!(hex::encode(pair.public_key().as_bytes()), GENERATOR_SEC1);
        assert_eq!(pair.backing(), KeyBacking::Raw);
    }

    #[test]
    fn scalar_import_is_deterministic() {
        let scalar = hex::decode("c9afa9d845ba75166b5c215767b1d6934e50c3db36e89b127b8a622b120f6721")
            .unwrap();
        let a = CaKeyPair::from_scalar(&scalar).unwrap();
        let b = CaKeyPair::from_scalar(&scalar).unwrap();
        assert_eq!(a.public_key(), b.public_key());
    }

    #[test]
    fn rejects_zero_scalar() {
        assert!(matches!(
            CaKeyPair::from_scalar(&[0u8; SCALAR_LEN]),
            Err(IdentityError::InvalidKeyEncoding(_))
        ));
    }

    #[test]
    fn rejects_wrong_length_scalar() {
        assert!(CaKeyPair::from_scalar(&[1u8; 31]).is_err());
        assert!(CaKeyPair::from_scalar(&[1u8; 33]).is_err());
    }

    #[test]
    fn rejects_scalar_at_curve_order() {
        let order = hex::decode(CURVE_ORDER).unwrap();
        assert!(matches!(
            CaKeyPair::from_scalar(&order),
            Err(IdentityError::InvalidKeyEncoding(_))
        ));
    }

    #[test]
    fn generated_keypairs_are_distinct() {
        let a = CaKeyPair::generate().unwrap();
        let b = CaKeyPair::generate().unwrap();
        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn raw_signature_verifies() {
        let pair = CaKeyPair::generate().unwrap();
        let message = b"to-be-signed certificate body";
        let sig = pair.sign(message).unwrap();

        let verifying =
            VerifyingKey::from_sec1_bytes(pair.public_key().as_bytes()).unwrap();
        let parsed = EcdsaSignature::from_slice(sig.as_bytes()).unwrap();
        verifying.verify(message, &parsed).unwrap();
    }
}
