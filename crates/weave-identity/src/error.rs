use thiserror::Error;

/// Result type alias for fabric identity operations
pub type Result<T> = std::result::Result<T, IdentityError>;

/// Errors raised while constructing or operating a fabric identity.
///
/// Every kind is terminal for the operation that raised it: retrying a key
/// operation with the same inputs cannot change the outcome, and masking a
/// mismatch or malformed key would be a security defect. No partially
/// constructed identity is ever observable.
#[derive(Error, Debug)]
pub enum IdentityError {
    /// The system random source or a curve operation failed during key
    /// generation. Fatal to commissioning; never retried with weaker
    /// randomness.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Supplied key material is not a valid encoding for P-256: wrong
    /// length, a zero scalar, a scalar at or above the curve order, a
    /// malformed point, or an IPK buffer that is not exactly 16 bytes.
    #[error("invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    /// The secure store reports a public key that disagrees with the one
    /// it is being paired against (a root certificate's embedded key, or
    /// the declared public key handle).
    #[error("public key mismatch: store reports {store}, expected {expected}")]
    KeyMismatch {
        /// Fingerprint of the store-reported public key
        store: String,
        /// Fingerprint of the public key the caller declared
        expected: String,
    },

    /// The DER buffer could not be parsed as an X.509 certificate carrying
    /// a P-256 public key.
    #[error("certificate parse failed: {0}")]
    CertificateParse(String),

    /// The group id is empty or malformed.
    #[error("invalid group id: {0}")]
    GroupId(String),

    /// The private key handle was not usable at signing time, e.g. the
    /// backing secure-store entry has been deleted. Surfaced to the
    /// caller; never retried automatically.
    #[error("signing failed: {0}")]
    Signing(String),

    /// The secure key store failed for a reason other than a key mismatch
    /// (backend unavailable, unknown handle at construction time).
    #[error("key store error: {0}")]
    Store(String),
}

impl IdentityError {
    /// Returns true if the error can only occur during construction
    #[must_use]
    pub const fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::KeyGeneration(_)
                | Self::InvalidKeyEncoding(_)
                | Self::KeyMismatch { .. }
                | Self::CertificateParse(_)
                | Self::GroupId(_)
        )
    }

    /// Returns true if the error originated in the backing secure store
    #[must_use]
    pub const fn is_store_error(&self) -> bool {
        matches!(self, Self::Signing(_) | Self::Store(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_errors_are_classified() {
        assert!(IdentityError::GroupId("empty".into()).is_construction_error());
        assert!(IdentityError::CertificateParse("bad DER".into()).is_construction_error());
        assert!(!IdentityError::Signing("gone".into()).is_construction_error());
    }

    #[test]
    fn store_errors_are_classified() {
        assert!(IdentityError::Signing("gone".into()).is_store_error());
        assert!(IdentityError::Store("backend down".into()).is_store_error());
        assert!(!IdentityError::KeyGeneration("rng".into()).is_store_error());
    }

    #[test]
    fn mismatch_message_names_both_fingerprints() {
        let err = IdentityError::KeyMismatch {
            store: "aaaa".into(),
            expected: "bbbb".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("aaaa"));
        assert!(msg.contains("bbbb"));
    }
}
