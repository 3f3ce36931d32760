//! Identity certificate domain model.
//!
//! Parses the X.509 certificate stored in a PIV slot and derives the key
//! algorithm and public key that the slot's private key must match.

use std::fmt;

use der::asn1::{ObjectIdentifier, UintRef};
use der::{Decode, Encode};
use sha2::{Digest, Sha256};
use x509_cert::Certificate;

use crate::domain::constants;
use crate::infra::error::{LoginError, LoginResult};

/// Key algorithms a PIV slot can hold and this tool can drive over TLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    Rsa1024,
    Rsa2048,
    EccP256,
    EccP384,
}

impl KeyAlgorithm {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyAlgorithm::Rsa1024 => "RSA-1024",
            KeyAlgorithm::Rsa2048 => "RSA-2048",
            KeyAlgorithm::EccP256 => "ECC P-256",
            KeyAlgorithm::EccP384 => "ECC P-384",
        }
    }

    #[must_use]
    pub fn is_rsa(&self) -> bool {
        matches!(self, KeyAlgorithm::Rsa1024 | KeyAlgorithm::Rsa2048)
    }

    /// RSA modulus length in bits, `None` for ECC keys.
    #[must_use]
    pub fn modulus_bits(&self) -> Option<usize> {
        match self {
            KeyAlgorithm::Rsa1024 => Some(1024),
            KeyAlgorithm::Rsa2048 => Some(2048),
            KeyAlgorithm::EccP256 | KeyAlgorithm::EccP384 => None,
        }
    }

    #[cfg(feature = "pcsc-backend")]
    #[must_use]
    pub fn as_algorithm_id(&self) -> yubikey::piv::AlgorithmId {
        match self {
            KeyAlgorithm::Rsa1024 => yubikey::piv::AlgorithmId::Rsa1024,
            KeyAlgorithm::Rsa2048 => yubikey::piv::AlgorithmId::Rsa2048,
            KeyAlgorithm::EccP256 => yubikey::piv::AlgorithmId::EccP256,
            KeyAlgorithm::EccP384 => yubikey::piv::AlgorithmId::EccP384,
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// PKCS#1 `RSAPublicKey` (RFC 8017, appendix A.1.1).
#[derive(der::Sequence)]
struct RsaPublicKey<'a> {
    modulus: UintRef<'a>,
    #[allow(dead_code)]
    public_exponent: UintRef<'a>,
}

/// Public key derived from the certificate's SubjectPublicKeyInfo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyInfo {
    /// Key algorithm and size.
    pub algorithm: KeyAlgorithm,
    /// Raw subjectPublicKey bits: PKCS#1 `RSAPublicKey` DER or an uncompressed EC point.
    pub public_key: Vec<u8>,
}

impl PublicKeyInfo {
    fn from_certificate(cert: &Certificate) -> LoginResult<Self> {
        let spki = &cert.tbs_certificate.subject_public_key_info;
        let public_key = spki
            .subject_public_key
            .as_bytes()
            .ok_or_else(|| {
                LoginError::CertificateParseError(
                    "subjectPublicKey is not an octet-aligned bit string".to_string(),
                )
            })?
            .to_vec();
        let oid = spki.algorithm.oid.to_string();
        let algorithm = match oid.as_str() {
            constants::OID_RSA_ENCRYPTION => {
                let key = RsaPublicKey::from_der(&public_key).map_err(|e| {
                    LoginError::CertificateParseError(format!("RSA public key: {e}"))
                })?;
                match modulus_bit_len(key.modulus.as_bytes()) {
                    1024 => KeyAlgorithm::Rsa1024,
                    2048 => KeyAlgorithm::Rsa2048,
                    bits => {
                        return Err(LoginError::UnsupportedKeyAlgorithm(format!("RSA-{bits}")))
                    }
                }
            }
            constants::OID_EC_PUBLIC_KEY => {
                let curve = spki
                    .algorithm
                    .parameters
                    .as_ref()
                    .and_then(|params| params.to_der().ok())
                    .and_then(|der| ObjectIdentifier::from_der(&der).ok())
                    .map(|oid| oid.to_string())
                    .ok_or_else(|| {
                        LoginError::CertificateParseError(
                            "EC public key without a named curve".to_string(),
                        )
                    })?;
                match curve.as_str() {
                    constants::OID_SECP256R1 => KeyAlgorithm::EccP256,
                    constants::OID_SECP384R1 => KeyAlgorithm::EccP384,
                    other => {
                        return Err(LoginError::UnsupportedKeyAlgorithm(format!(
                            "EC curve {other}"
                        )))
                    }
                }
            }
            other => return Err(LoginError::UnsupportedKeyAlgorithm(other.to_string())),
        };

        Ok(PublicKeyInfo {
            algorithm,
            public_key,
        })
    }
}

fn modulus_bit_len(modulus: &[u8]) -> usize {
    match modulus.first() {
        Some(&first) => modulus.len() * 8 - first.leading_zeros() as usize,
        None => 0,
    }
}

/// X.509 certificate read from a PIV slot.
#[derive(Clone)]
pub struct IdentityCertificate {
    der: Vec<u8>,
    certificate: Certificate,
    public_key: PublicKeyInfo,
}

impl IdentityCertificate {
    /// Parse a DER certificate and derive its public key.
    pub fn from_der(der: &[u8]) -> LoginResult<Self> {
        let certificate = Certificate::from_der(der)
            .map_err(|e| LoginError::CertificateParseError(format!("invalid X.509 DER: {e}")))?;
        let public_key = PublicKeyInfo::from_certificate(&certificate)?;
        Ok(Self {
            der: der.to_vec(),
            certificate,
            public_key,
        })
    }

    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    #[must_use]
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    #[must_use]
    pub fn public_key(&self) -> &PublicKeyInfo {
        &self.public_key
    }

    #[must_use]
    pub fn key_algorithm(&self) -> KeyAlgorithm {
        self.public_key.algorithm
    }

    /// Subject distinguished name in RFC 4514 form.
    #[must_use]
    pub fn subject(&self) -> String {
        self.certificate.tbs_certificate.subject.to_string()
    }

    /// Issuer distinguished name in RFC 4514 form.
    #[must_use]
    pub fn issuer(&self) -> String {
        self.certificate.tbs_certificate.issuer.to_string()
    }

    /// Lowercase hex SHA-256 of the certificate DER.
    #[must_use]
    pub fn fingerprint_sha256(&self) -> String {
        hex::encode(Sha256::digest(&self.der))
    }

    /// Seconds until `notAfter`, negative once expired.
    #[must_use]
    pub fn seconds_until_expiry(&self) -> i64 {
        let not_after = self
            .certificate
            .tbs_certificate
            .validity
            .not_after
            .to_unix_duration()
            .as_secs();
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        not_after as i64 - now as i64
    }
}

impl fmt::Debug for IdentityCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityCertificate")
            .field("subject", &self.subject())
            .field("algorithm", &self.public_key.algorithm)
            .field("fingerprint", &self.fingerprint_sha256())
            .finish()
    }
}
