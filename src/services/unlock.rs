//! Signing capability unlock.
//!
//! Presents the PIN to the token and hands out a [`TokenSigningKey`] that
//! rustls uses for the client `CertificateVerify`. Hashing and RSA padding
//! happen on the host; the private key operation runs on the token.

use rand::RngCore;
use ring::signature::{self as ring_sig, UnparsedPublicKey, VerificationAlgorithm};
use rustls::sign::{Signer, SigningKey};
use rustls::{SignatureAlgorithm, SignatureScheme};

use crate::domain::crypto::padding;
use crate::domain::crypto::HashAlgorithm;
use crate::domain::identity::{IdentityCertificate, KeyAlgorithm};
use crate::domain::types::{PivPin, PivSlot};
use crate::infra::error::{LoginError, LoginResult};
use crate::services::token_session::{SessionHandle, TokenSession};

/// Challenge size for the proof-of-possession check.
const CHALLENGE_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Pkcs1,
    Pss,
    Ecdsa,
}

fn scheme_parameters(scheme: SignatureScheme) -> Option<(HashAlgorithm, Encoding)> {
    let params = match scheme {
        SignatureScheme::RSA_PSS_SHA256 => (HashAlgorithm::Sha256, Encoding::Pss),
        SignatureScheme::RSA_PSS_SHA384 => (HashAlgorithm::Sha384, Encoding::Pss),
        SignatureScheme::RSA_PSS_SHA512 => (HashAlgorithm::Sha512, Encoding::Pss),
        SignatureScheme::RSA_PKCS1_SHA256 => (HashAlgorithm::Sha256, Encoding::Pkcs1),
        SignatureScheme::RSA_PKCS1_SHA384 => (HashAlgorithm::Sha384, Encoding::Pkcs1),
        SignatureScheme::RSA_PKCS1_SHA512 => (HashAlgorithm::Sha512, Encoding::Pkcs1),
        SignatureScheme::ECDSA_NISTP256_SHA256 => (HashAlgorithm::Sha256, Encoding::Ecdsa),
        SignatureScheme::ECDSA_NISTP384_SHA384 => (HashAlgorithm::Sha384, Encoding::Ecdsa),
        _ => return None,
    };
    Some(params)
}

/// Private key in a PIV slot, usable only through the token.
#[derive(Debug, Clone)]
pub struct TokenSigningKey {
    handle: SessionHandle,
    slot: PivSlot,
    algorithm: KeyAlgorithm,
}

impl TokenSigningKey {
    pub(crate) fn new(handle: SessionHandle, slot: PivSlot, algorithm: KeyAlgorithm) -> Self {
        Self {
            handle,
            slot,
            algorithm,
        }
    }

    #[must_use]
    pub fn slot(&self) -> PivSlot {
        self.slot
    }

    #[must_use]
    pub fn key_algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    /// TLS signature schemes this key can produce, most preferred first.
    #[must_use]
    pub fn supported_schemes(&self) -> Vec<SignatureScheme> {
        match self.algorithm {
            KeyAlgorithm::EccP256 => vec![SignatureScheme::ECDSA_NISTP256_SHA256],
            KeyAlgorithm::EccP384 => vec![SignatureScheme::ECDSA_NISTP384_SHA384],
            KeyAlgorithm::Rsa2048 => vec![
                SignatureScheme::RSA_PSS_SHA256,
                SignatureScheme::RSA_PSS_SHA384,
                SignatureScheme::RSA_PSS_SHA512,
                SignatureScheme::RSA_PKCS1_SHA256,
                SignatureScheme::RSA_PKCS1_SHA384,
                SignatureScheme::RSA_PKCS1_SHA512,
            ],
            // PSS with SHA-512 needs 130 bytes of encoded message
            KeyAlgorithm::Rsa1024 => vec![
                SignatureScheme::RSA_PSS_SHA256,
                SignatureScheme::RSA_PSS_SHA384,
                SignatureScheme::RSA_PKCS1_SHA256,
                SignatureScheme::RSA_PKCS1_SHA384,
                SignatureScheme::RSA_PKCS1_SHA512,
            ],
        }
    }

    /// Sign `message` with `scheme` using the token.
    ///
    /// # Errors
    ///
    /// Fails for a scheme this key does not support, a closed session, or a
    /// token that refuses the operation.
    pub fn sign_message(&self, scheme: SignatureScheme, message: &[u8]) -> LoginResult<Vec<u8>> {
        if !self.supported_schemes().contains(&scheme) {
            return Err(LoginError::TlsError(format!(
                "signature scheme {scheme:?} not supported by {} key",
                self.algorithm
            )));
        }
        let (hash, encoding) = scheme_parameters(scheme).ok_or_else(|| {
            LoginError::TlsError(format!("signature scheme {scheme:?} not supported"))
        })?;

        let digest = hash.digest(message);
        let input = match (encoding, self.algorithm.modulus_bits()) {
            (Encoding::Ecdsa, None) => digest.into_vec(),
            (Encoding::Pkcs1, Some(bits)) => padding::pkcs1v15_encode(&digest, bits / 8)
                .map_err(|e| LoginError::TlsError(e.to_string()))?,
            (Encoding::Pss, Some(bits)) => padding::pss_encode(&digest, bits)
                .map_err(|e| LoginError::TlsError(e.to_string()))?,
            _ => {
                return Err(LoginError::TlsError(format!(
                    "signature scheme {scheme:?} does not match {} key",
                    self.algorithm
                )))
            }
        };

        log::debug!(
            "Signing {} bytes with slot {} ({scheme:?})",
            message.len(),
            self.slot
        );
        let (slot, algorithm) = (self.slot, self.algorithm);
        self.handle
            .with_backend(|backend| backend.sign_raw(slot, algorithm, &input))
    }
}

impl SigningKey for TokenSigningKey {
    fn choose_scheme(&self, offered: &[SignatureScheme]) -> Option<Box<dyn Signer>> {
        let scheme = self
            .supported_schemes()
            .into_iter()
            .find(|scheme| offered.contains(scheme));
        log::debug!("Server offered {offered:?}, chose {scheme:?}");
        scheme.map(|scheme| {
            Box::new(TokenSigner {
                key: self.clone(),
                scheme,
            }) as Box<dyn Signer>
        })
    }

    fn algorithm(&self) -> SignatureAlgorithm {
        if self.algorithm.is_rsa() {
            SignatureAlgorithm::RSA
        } else {
            SignatureAlgorithm::ECDSA
        }
    }
}

#[derive(Debug)]
struct TokenSigner {
    key: TokenSigningKey,
    scheme: SignatureScheme,
}

impl Signer for TokenSigner {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, rustls::Error> {
        self.key.sign_message(self.scheme, message).map_err(|e| {
            log::error!("Token signing failed: {e}");
            rustls::Error::General(e.to_string())
        })
    }

    fn scheme(&self) -> SignatureScheme {
        self.scheme
    }
}

/// Verify the PIN and obtain the slot's signing key.
///
/// With `verify_binding`, a random challenge is signed through the token and
/// checked against the certificate's public key.
///
/// # Errors
///
/// [`LoginError::AuthenticationFailed`] for a rejected PIN,
/// [`LoginError::KeyUnavailable`] when the slot cannot sign and
/// [`LoginError::KeyMismatch`] when the key does not belong to the certificate.
pub fn unlock(
    session: &TokenSession,
    identity: &IdentityCertificate,
    slot: PivSlot,
    pin: &PivPin,
    verify_binding: bool,
) -> LoginResult<TokenSigningKey> {
    session.with_backend(|backend| backend.verify_pin(pin))?;
    log::info!("PIN accepted");

    let key = TokenSigningKey::new(session.handle(), slot, identity.key_algorithm());
    if verify_binding {
        verify_key_binding(&key, identity)?;
        log::info!("Private key in slot {slot} matches the certificate");
    } else {
        log::debug!("Skipping key binding check");
    }
    Ok(key)
}

fn verify_key_binding(key: &TokenSigningKey, identity: &IdentityCertificate) -> LoginResult<()> {
    let mut challenge = [0u8; CHALLENGE_LEN];
    rand::rng().fill_bytes(&mut challenge);

    let scheme = match key.key_algorithm() {
        KeyAlgorithm::EccP256 => SignatureScheme::ECDSA_NISTP256_SHA256,
        KeyAlgorithm::EccP384 => SignatureScheme::ECDSA_NISTP384_SHA384,
        KeyAlgorithm::Rsa1024 | KeyAlgorithm::Rsa2048 => SignatureScheme::RSA_PKCS1_SHA256,
    };
    let verifier: &'static dyn VerificationAlgorithm = match key.key_algorithm() {
        KeyAlgorithm::EccP256 => &ring_sig::ECDSA_P256_SHA256_ASN1,
        KeyAlgorithm::EccP384 => &ring_sig::ECDSA_P384_SHA384_ASN1,
        KeyAlgorithm::Rsa2048 => &ring_sig::RSA_PKCS1_2048_8192_SHA256,
        KeyAlgorithm::Rsa1024 => &ring_sig::RSA_PKCS1_1024_8192_SHA256_FOR_LEGACY_USE_ONLY,
    };

    let slot = key.slot();
    let signature = key
        .sign_message(scheme, &challenge)
        .map_err(|e| match e {
            LoginError::KeyUnavailable { .. } => e,
            other => LoginError::KeyUnavailable {
                slot,
                reason: other.to_string(),
            },
        })?;

    UnparsedPublicKey::new(verifier, &identity.public_key().public_key)
        .verify(&challenge, &signature)
        .map_err(|_| LoginError::KeyMismatch { slot })
}
