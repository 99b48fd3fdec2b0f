//! Identity Protection Key handling.
//!
//! The IPK is a 16-byte symmetric key scoped to one fabric. Group session
//! keys protecting multicast traffic are derived from it by the
//! commissioning orchestration; this component only holds the key.

use std::fmt;

use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroize;

use crate::error::{IdentityError, Result};

/// Exact length of an Identity Protection Key in bytes.
pub const IPK_LEN: usize = 16;

/// A fabric's Identity Protection Key.
///
/// Immutable once constructed; the buffer is zeroed on drop. `Debug`
/// output never reveals the key bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Ipk([u8; IPK_LEN]);

impl Ipk {
    /// Generate a fresh random IPK from the system random source.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::KeyGeneration` if the random source fails.
    pub fn generate() -> Result<Self> {
        let rng = SystemRandom::new();
        let mut bytes = [0u8; IPK_LEN];
        rng.fill(&mut bytes)
            .map_err(|_| IdentityError::KeyGeneration("system random source unavailable".to_string()))?;
        Ok(Self(bytes))
    }

    /// Wrap previously provisioned IPK bytes.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::InvalidKeyEncoding` unless `bytes` is
    /// exactly [`IPK_LEN`] bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; IPK_LEN] = bytes.try_into().map_err(|_| {
            IdentityError::InvalidKeyEncoding(format!(
                "IPK must be exactly {IPK_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// The raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; IPK_LEN] {
        &self.0
    }
}

impl Drop for Ipk {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for Ipk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Ipk(..)")
    }
}
