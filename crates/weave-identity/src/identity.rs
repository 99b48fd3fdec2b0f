//! The fabric identity entity and its construction modes.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::cert::{parse_root_certificate, CertificateInfo};
use crate::error::{IdentityError, Result};
use crate::group::GroupId;
use crate::ipk::Ipk;
use crate::keypair::{CaKeyPair, KeyBacking};
use crate::keys::{PublicKey, Signature, PUBLIC_KEY_LEN};
use crate::store::{KeyHandle, SecureKeyStore};

/// The CA keypair and Identity Protection Key of one fabric.
///
/// An effectively-immutable value object: no state changes after
/// construction, so concurrent signing, public key export, and IPK reads
/// need no additional locking. Signing may block when the private key is
/// hardware-resident; dispatch it off latency-sensitive threads.
///
/// Construction either yields a fully initialized identity or fails with
/// the precise invariant that was violated.
pub struct FabricIdentity {
    keypair: CaKeyPair,
    ipk: Ipk,
    group_id: GroupId,
    root_cert: Option<CertificateInfo>,
}

impl FabricIdentity {
    /// Form a new fabric: generate a fresh P-256 CA keypair and a fresh
    /// IPK under the default group id.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::KeyGeneration` if the system random source
    /// or a curve operation fails. Fatal to commissioning; never retried
    /// with weaker randomness.
    pub fn generate() -> Result<Self> {
        let keypair = CaKeyPair::generate()?;
        let ipk = Ipk::generate()?;
        let group_id = GroupId::default_group();
        info!(
            group = %group_id,
            fingerprint = %keypair.public_key().fingerprint(),
            "generated fresh fabric identity"
        );
        Ok(Self {
            keypair,
            ipk,
            group_id,
            root_cert: None,
        })
    }

    /// Import a raw private scalar; the public key is derived from it by
    /// scalar-point multiplication. A fresh IPK is generated.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::InvalidKeyEncoding` if the scalar has the
    /// wrong length, is zero, or is not below the curve order.
    pub fn from_private_scalar(scalar: &[u8]) -> Result<Self> {
        let keypair = CaKeyPair::from_scalar(scalar)?;
        let ipk = Ipk::generate()?;
        let group_id = GroupId::default_group();
        info!(
            group = %group_id,
            fingerprint = %keypair.public_key().fingerprint(),
            "imported fabric identity from raw private key"
        );
        Ok(Self {
            keypair,
            ipk,
            group_id,
            root_cert: None,
        })
    }

    /// Load an existing fabric: a DER-encoded root certificate plus a
    /// reference to the matching private key held in `store`, under the
    /// default group id.
    ///
    /// Pass `Some(ipk)` to reuse a previously provisioned IPK; `None`
    /// generates a fresh one.
    ///
    /// # Errors
    ///
    /// - `IdentityError::CertificateParse` if the DER is not a valid
    ///   certificate with a P-256 key.
    /// - `IdentityError::KeyMismatch` if the store-reported public key
    ///   differs from the certificate's embedded public key.
    /// - `IdentityError::Store` if the store cannot report a public key
    ///   for `private_key`.
    pub fn from_root_cert(
        store: Arc<dyn SecureKeyStore>,
        private_key: KeyHandle,
        cert_der: &[u8],
        ipk: Option<Ipk>,
    ) -> Result<Self> {
        Self::with_root_cert(store, private_key, cert_der, GroupId::default_group(), ipk)
    }

    /// [`from_root_cert`](Self::from_root_cert) with an explicit group id
    /// for custom fabric commissioning flows.
    ///
    /// # Errors
    ///
    /// As `from_root_cert`, plus `IdentityError::GroupId` if `group_id`
    /// is empty or blank.
    pub fn from_root_cert_in_group(
        store: Arc<dyn SecureKeyStore>,
        private_key: KeyHandle,
        cert_der: &[u8],
        group_id: impl Into<String>,
        ipk: Option<Ipk>,
    ) -> Result<Self> {
        let group_id = GroupId::new(group_id)?;
        Self::with_root_cert(store, private_key, cert_der, group_id, ipk)
    }

    /// Multi-fabric import: both key halves are references into `store`,
    /// and the group id is always explicit. No raw key bytes cross into
    /// this component.
    ///
    /// The two handles must agree on the public key; that keeps the
    /// public key consistent with the private key handle.
    ///
    /// # Errors
    ///
    /// - `IdentityError::GroupId` if `group_id` is empty or blank.
    /// - `IdentityError::KeyMismatch` if the handles report different
    ///   public keys.
    /// - `IdentityError::Store` if either handle is unknown to the store.
    pub fn from_store_handles(
        store: Arc<dyn SecureKeyStore>,
        public_key: &KeyHandle,
        private_key: KeyHandle,
        group_id: impl Into<String>,
        ipk: Option<Ipk>,
    ) -> Result<Self> {
        let group_id = GroupId::new(group_id)?;
        let declared = store.public_key(public_key)?;
        let derived = store.public_key(&private_key)?;
        if declared != derived {
            return Err(IdentityError::KeyMismatch {
                store: derived.fingerprint(),
                expected: declared.fingerprint(),
            });
        }

        let ipk = Self::ipk_or_fresh(ipk)?;
        info!(
            group = %group_id,
            fingerprint = %declared.fingerprint(),
            "bound fabric identity to store-resident keypair"
        );
        Ok(Self {
            keypair: CaKeyPair::store_backed(store, private_key, declared),
            ipk,
            group_id,
            root_cert: None,
        })
    }

    fn with_root_cert(
        store: Arc<dyn SecureKeyStore>,
        private_key: KeyHandle,
        cert_der: &[u8],
        group_id: GroupId,
        ipk: Option<Ipk>,
    ) -> Result<Self> {
        let (cert_public, cert_info) = parse_root_certificate(cert_der)?;
        let store_public = store.public_key(&private_key)?;
        if store_public != cert_public {
            return Err(IdentityError::KeyMismatch {
                store: store_public.fingerprint(),
                expected: cert_public.fingerprint(),
            });
        }

        let ipk = Self::ipk_or_fresh(ipk)?;
        info!(
            group = %group_id,
            subject = %cert_info.subject,
            fingerprint = %cert_public.fingerprint(),
            "loaded fabric identity from root certificate"
        );
        Ok(Self {
            keypair: CaKeyPair::store_backed(store, private_key, cert_public),
            ipk,
            group_id,
            root_cert: Some(cert_info),
        })
    }

    fn ipk_or_fresh(ipk: Option<Ipk>) -> Result<Ipk> {
        match ipk {
            Some(ipk) => Ok(ipk),
            None => Ipk::generate(),
        }
    }

    /// ECDSA P-256 / SHA-256 signature over `message`, in the raw 64-byte
    /// `(r, s)` form the commissioning certificate format expects.
    ///
    /// Never mutates the identity. Byte-for-byte stability across calls
    /// is not guaranteed; verify signatures, do not compare them. Blocks
    /// for the duration of a hardware signing operation when the key is
    /// store-resident; there is no internal timeout or cancellation.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Signing` if the private key handle is no
    /// longer usable, e.g. the backing store entry was deleted.
    pub fn sign(&self, message: &[u8]) -> Result<Signature> {
        self.keypair.sign(message)
    }

    /// The identity's public key.
    #[must_use]
    pub fn public_key(&self) -> &PublicKey {
        self.keypair.public_key()
    }

    /// The uncompressed SEC1 encoding of the public key, for certificate
    /// embedding and verification by peers.
    #[must_use]
    pub fn export_public_key(&self) -> [u8; PUBLIC_KEY_LEN] {
        *self.keypair.public_key().as_bytes()
    }

    /// The fabric's Identity Protection Key.
    #[must_use]
    pub fn ipk(&self) -> &Ipk {
        &self.ipk
    }

    /// The group id this identity is bound to.
    #[must_use]
    pub fn group_id(&self) -> &GroupId {
        &self.group_id
    }

    /// Which representation backs the private key. Fixed at construction.
    #[must_use]
    pub fn backing(&self) -> KeyBacking {
        self.keypair.backing()
    }

    /// Metadata of the root certificate this identity was imported from,
    /// when one was involved.
    #[must_use]
    pub fn root_certificate(&self) -> Option<&CertificateInfo> {
        self.root_cert.as_ref()
    }
}

impl fmt::Debug for FabricIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FabricIdentity")
            .field("group_id", &self.group_id)
            .field("backing", &self.backing())
            .field("public_key", self.public_key())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::DEFAULT_GROUP_ID;
    use crate::ipk::IPK_LEN;
    use crate::store::SoftwareKeyStore;
    use ring::signature::{UnparsedPublicKey, ECDSA_P256_SHA256_FIXED};

    /// Uncompressed encoding of the P-256 base point.
    const GENERATOR_SEC1: &str = "046b17d1f2e12c4247f8bce6e563a440f277037d812deb33a0f4a13945d898c2964fe342e2fe1a7f9b8ee7eb4a7c0f9e162bce33576b315ececbb6406837bf51f5";

    fn verify(public: &[u8], message: &[u8], sig: &[u8]) -> bool {
        UnparsedPublicKey::new(&ECDSA_P256_SHA256_FIXED, public)
            .verify(message, sig)
            .is_ok()
    }

    /// Self-signed root cert + matching key installed in a fresh store.
    fn provisioned_fabric() -> (Arc<SoftwareKeyStore>, KeyHandle, Vec<u8>) {
        let key = rcgen::KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256).unwrap();
        let mut params = rcgen::CertificateParams::new(Vec::<String>::new()).unwrap();
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, "Weave Fabric Root");
        params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
        let cert = params.self_signed(&key).unwrap();
        let der: &[u8] = cert.der();

        let store = Arc::new(SoftwareKeyStore::new());
        let handle = store
            .import_pkcs8_der("fabric-root", &key.serialize_der())
            .unwrap();
        (store, handle, der.to_vec())
    }

    #[test]
    fn generated_identity_signs_verifiably() {
        let identity = FabricIdentity::generate().unwrap();
        let message = b"commission-request-1";
        let sig = identity.sign(message).unwrap();

        assert!(verify(&identity.export_public_key(), message, sig.as_bytes()));

        let mut tampered = *sig.as_bytes();
        tampered[10] ^= 0x01;
        assert!(!verify(&identity.export_public_key(), message, &tampered));
    }

    #[test]
    fn generated_identity_has_defaults() {
        let identity = FabricIdentity::generate().unwrap();
        assert_eq!(identity.group_id().as_str(), DEFAULT_GROUP_ID);
        assert_eq!(identity.backing(), KeyBacking::Raw);
        assert_eq!(identity.ipk().as_bytes().len(), IPK_LEN);
        assert!(identity.root_certificate().is_none());
        assert_eq!(identity.export_public_key()[0], 0x04);
    }

    #[test]
    fn exported_point_parses_as_p256() {
        let identity = FabricIdentity::generate().unwrap();
        assert!(p256::PublicKey::from_sec1_bytes(&identity.export_public_key()).is_ok());
    }

    #[test]
    fn repeated_signatures_all_verify() {
        let identity = FabricIdentity::generate().unwrap();
        let message = b"same input twice";
        let first = identity.sign(message).unwrap();
        let second = identity.sign(message).unwrap();
        assert!(verify(&identity.export_public_key(), message, first.as_bytes()));
        assert!(verify(&identity.export_public_key(), message, second.as_bytes()));
    }

    #[test]
    fn scalar_import_derives_generator_for_one() {
        let mut scalar = [0u8; 32];
        scalar[31] = 1;
        let identity = FabricIdentity::from_private_scalar(&scalar).unwrap();
        assert_eq!(hex::encode(identity.export_public_key()), GENERATOR_SEC1);
    }

    #[test]
    fn scalar_import_rejects_invalid_scalars() {
        assert!(matches!(
            FabricIdentity::from_private_scalar(&[0u8; 32]),
            Err(IdentityError::InvalidKeyEncoding(_))
        ));
        assert!(FabricIdentity::from_private_scalar(&[1u8; 16]).is_err());
    }

    #[test]
    fn scalar_imports_get_independent_ipks() {
        let scalar = [0x42u8; 32];
        let a = FabricIdentity::from_private_scalar(&scalar).unwrap();
        let b = FabricIdentity::from_private_scalar(&scalar).unwrap();
        assert_eq!(a.export_public_key(), b.export_public_key());
        assert_ne!(a.ipk(), b.ipk());
    }

    #[test]
    fn root_cert_import_succeeds_when_keys_match() {
        let (store, handle, der) = provisioned_fabric();
        let identity = FabricIdentity::from_root_cert(store, handle, &der, None).unwrap();

        assert_eq!(identity.backing(), KeyBacking::StoreReference);
        assert_eq!(identity.group_id().as_str(), DEFAULT_GROUP_ID);
        let info = identity.root_certificate().unwrap();
        assert!(info.subject.contains("Weave Fabric Root"));

        let message = b"issue operational certificate";
        let sig = identity.sign(message).unwrap();
        assert!(verify(&identity.export_public_key(), message, sig.as_bytes()));
    }

    #[test]
    fn root_cert_import_rejects_mismatched_store_key() {
        let (_, _, der) = provisioned_fabric();
        let other_store = Arc::new(SoftwareKeyStore::new());
        let other_handle = other_store.generate_key("unrelated").unwrap();

        assert!(matches!(
            FabricIdentity::from_root_cert(other_store, other_handle, &der, None),
            Err(IdentityError::KeyMismatch { .. })
        ));
    }

    #[test]
    fn root_cert_import_rejects_bad_der() {
        let store = Arc::new(SoftwareKeyStore::new());
        let handle = store.generate_key("fabric-root").unwrap();
        assert!(matches!(
            FabricIdentity::from_root_cert(store, handle, b"not a certificate", None),
            Err(IdentityError::CertificateParse(_))
        ));
    }

    #[test]
    fn explicit_group_mode_validates_group_id() {
        let (store, handle, der) = provisioned_fabric();
        assert!(matches!(
            FabricIdentity::from_root_cert_in_group(store, handle, &der, "", None),
            Err(IdentityError::GroupId(_))
        ));
    }

    #[test]
    fn explicit_group_mode_threads_group_id() {
        let (store, handle, der) = provisioned_fabric();
        let identity =
            FabricIdentity::from_root_cert_in_group(store, handle, &der, "home-fabric-2", None)
                .unwrap();
        assert_eq!(identity.group_id().as_str(), "home-fabric-2");
    }

    #[test]
    fn supplied_ipk_is_used_verbatim() {
        let (store, handle, der) = provisioned_fabric();
        let ipk = Ipk::from_bytes(&[0x5A; IPK_LEN]).unwrap();
        let identity =
            FabricIdentity::from_root_cert(store, handle, &der, Some(ipk.clone())).unwrap();
        assert_eq!(identity.ipk(), &ipk);
    }

    #[test]
    fn store_handle_mode_binds_explicit_group() {
        let store = Arc::new(SoftwareKeyStore::new());
        let handle = store.generate_key("fabric-2-ca").unwrap();
        let public = handle.clone();

        let identity =
            FabricIdentity::from_store_handles(store, &public, handle, "fabric-2", None).unwrap();
        assert_eq!(identity.group_id().as_str(), "fabric-2");
        assert_eq!(identity.backing(), KeyBacking::StoreReference);

        let sig = identity.sign(b"m").unwrap();
        assert!(verify(&identity.export_public_key(), b"m", sig.as_bytes()));
    }

    #[test]
    fn store_handle_mode_rejects_empty_group() {
        let store = Arc::new(SoftwareKeyStore::new());
        let handle = store.generate_key("fabric-ca").unwrap();
        let public = handle.clone();
        assert!(matches!(
            FabricIdentity::from_store_handles(store, &public, handle, "  ", None),
            Err(IdentityError::GroupId(_))
        ));
    }

    #[test]
    fn store_handle_mode_rejects_disagreeing_handles() {
        let store = Arc::new(SoftwareKeyStore::new());
        let public = store.generate_key("key-a").unwrap();
        let private = store.generate_key("key-b").unwrap();
        assert!(matches!(
            FabricIdentity::from_store_handles(store, &public, private, "fabric-3", None),
            Err(IdentityError::KeyMismatch { .. })
        ));
    }

    #[test]
    fn same_key_material_different_groups_have_independent_ipks() {
        let store = Arc::new(SoftwareKeyStore::new());
        let handle = store.generate_key("shared-ca").unwrap();

        let public = handle.clone();
        let a = FabricIdentity::from_store_handles(
            Arc::clone(&store) as Arc<dyn SecureKeyStore>,
            &public,
            handle.clone(),
            "fabric-a",
            None,
        )
        .unwrap();
        let b =
            FabricIdentity::from_store_handles(store, &public, handle, "fabric-b", None).unwrap();

        assert_eq!(a.export_public_key(), b.export_public_key());
        assert_ne!(a.group_id(), b.group_id());
        assert_ne!(a.ipk(), b.ipk());
    }

    #[test]
    fn deleted_store_entry_surfaces_as_signing_error() {
        let store = Arc::new(SoftwareKeyStore::new());
        let handle = store.generate_key("fabric-ca").unwrap();
        let public = handle.clone();
        let identity = FabricIdentity::from_store_handles(
            Arc::clone(&store) as Arc<dyn SecureKeyStore>,
            &public,
            handle.clone(),
            "fabric-x",
            None,
        )
        .unwrap();

        store.remove_key(&handle);
        assert!(matches!(
            identity.sign(b"m"),
            Err(IdentityError::Signing(_))
        ));
        // accessors are unaffected by the lost handle
        assert_eq!(identity.export_public_key()[0], 0x04);
        assert_eq!(identity.ipk().as_bytes().len(), IPK_LEN);
    }

    #[test]
    fn concurrent_signing_is_safe() {
        let identity = Arc::new(FabricIdentity::generate().unwrap());
        let mut handles = Vec::new();
        for i in 0..4u8 {
            let identity = Arc::clone(&identity);
            handles.push(std::thread::spawn(move || {
                let message = vec![i; 32];
                let sig = identity.sign(&message).unwrap();
                assert!(verify(&identity.export_public_key(), &message, sig.as_bytes()));
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn debug_output_redacts_secret_material() {
        let ipk = [0xA5u8; IPK_LEN];
        let scalar = [0x42u8; 32];
        let identity = FabricIdentity::from_private_scalar(&scalar).unwrap();
        let out = format!("{identity:?}");
        assert!(out.contains("FabricIdentity"));
        assert!(!out.contains("42424242"));
        assert!(!out.contains(&hex::encode(ipk)));
    }
}
