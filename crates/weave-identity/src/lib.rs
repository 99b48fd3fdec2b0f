//! # weave-identity
//!
//! Fabric-scoped cryptographic identity for the Weave commissioner.
//!
//! A commissioner admitting devices into a fabric needs exactly two
//! pieces of secret material, and this crate is the only place they are
//! generated, imported, and used:
//!
//! ```text
//! FabricIdentity (one per fabric, immutable after construction)
//!        │
//!        ├── CA keypair (NIST P-256)
//!        │     ├── raw-backed: scalar owned by this process
//!        │     └── store-backed: opaque reference, bytes stay in the store
//!        └── IPK (16-byte Identity Protection Key)
//! ```
//!
//! Signatures are ECDSA P-256 / SHA-256 in the raw 64-byte `(r, s)` form
//! the commissioning certificate format expects; public keys export as
//! uncompressed SEC1 points. The rest of the commissioning pipeline --
//! transport sessions, certificate chain assembly, pairing flows -- are
//! external collaborators that call into this crate.
//!
//! ## Example
//!
//! ```rust,ignore
//! use weave_identity::{FabricIdentity, SoftwareKeyStore};
//!
//! // Form a new fabric: fresh CA keypair, fresh IPK, default group.
//! let identity = FabricIdentity::generate()?;
//! let signature = identity.sign(b"to-be-signed certificate body")?;
//! let spki_point = identity.export_public_key();
//!
//! // Rejoin an existing fabric from its root certificate; the private
//! // key never leaves the secure store.
//! let store = std::sync::Arc::new(SoftwareKeyStore::new());
//! let handle = store.import_pkcs8_der("fabric-root", &saved_key_der)?;
//! let identity = FabricIdentity::from_root_cert(store, handle, &root_cert_der, saved_ipk)?;
//! ```

mod cert;
mod error;
mod group;
mod identity;
mod ipk;
mod keypair;
mod keys;
mod store;

pub use cert::{parse_root_certificate, CertificateInfo};
pub use error::{IdentityError, Result};
pub use group::{GroupId, DEFAULT_GROUP_ID};
pub use identity::FabricIdentity;
pub use ipk::{Ipk, IPK_LEN};
pub use keypair::KeyBacking;
pub use keys::{PublicKey, Signature, PUBLIC_KEY_LEN, SIGNATURE_LEN};
pub use store::{KeyHandle, SecureKeyStore, SoftwareKeyStore};
