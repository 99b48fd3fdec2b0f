//! Root certificate parsing for the certificate-backed import modes.
//!
//! Only the embedded public key and display metadata are extracted here.
//! Chain construction and validation belong to the commissioning
//! orchestration.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use x509_parser::prelude::*;

use crate::error::{IdentityError, Result};
use crate::keys::{sha256_hex, PublicKey};

/// Metadata extracted from an imported root certificate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateInfo {
    /// Subject distinguished name (human-readable)
    pub subject: String,
    /// Issuer distinguished name (human-readable)
    pub issuer: String,
    /// Serial number (hex)
    pub serial: String,
    /// Not valid before
    pub not_before: DateTime<Utc>,
    /// Not valid after
    pub not_after: DateTime<Utc>,
    /// Whether the certificate is currently expired
    pub expired: bool,
    /// SHA-256 fingerprint of the DER encoding (hex)
    pub fingerprint: String,
}

/// Parse a DER-encoded root certificate and extract its P-256 public key.
///
/// An expired certificate is accepted -- expiry policy is the caller's --
/// but flagged in the returned metadata and logged.
///
/// # Errors
///
/// Returns `IdentityError::CertificateParse` if the DER is not a valid
/// X.509 certificate or its subject key is not a point on P-256.
pub fn parse_root_certificate(der: &[u8]) -> Result<(PublicKey, CertificateInfo)> {
    let (_, cert) = parse_x509_certificate(der)
        .map_err(|e| IdentityError::CertificateParse(e.to_string()))?;

    let parsed = cert
        .public_key()
        .parsed()
        .map_err(|e| IdentityError::CertificateParse(e.to_string()))?;
    let point = match parsed {
        x509_parser::public_key::PublicKey::EC(ref ec) => ec.data(),
        _ => {
            return Err(IdentityError::CertificateParse(
                "certificate subject key is not an EC key".to_string(),
            ))
        }
    };
    let public = PublicKey::from_sec1_bytes(point).map_err(|_| {
        IdentityError::CertificateParse(
            "certificate subject key is not a point on P-256".to_string(),
        )
    })?;

    let not_before = asn1_to_utc(cert.validity().not_before);
    let not_after = asn1_to_utc(cert.validity().not_after);
    let expired = Utc::now() > not_after;

    let info = CertificateInfo {
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        serial: cert.raw_serial_as_string(),
        not_before,
        not_after,
        expired,
        fingerprint: sha256_hex(der),
    };

    if expired {
        warn!(
            subject = %info.subject,
            not_after = %info.not_after,
            "imported root certificate is expired"
        );
    }

    Ok((public, info))
}

/// Convert an ASN.1 `GeneralizedTime` / `UTCTime` to `DateTime<Utc>`.
fn asn1_to_utc(t: x509_parser::time::ASN1Time) -> DateTime<Utc> {
    let epoch = t.timestamp();
    Utc.timestamp_opt(epoch, 0)
        .single()
        .unwrap_or_else(Utc::now)
}
