//! Identity extraction from a PIV slot.

use crate::domain::identity::IdentityCertificate;
use crate::domain::types::PivSlot;
use crate::infra::error::{LoginError, LoginResult};
use crate::services::token_session::TokenSession;

/// Expiry horizon below which a warning is logged.
const EXPIRY_WARNING_SECS: i64 = 30 * 86_400;

/// Read and parse the certificate stored in `slot`.
///
/// # Errors
///
/// [`LoginError::CertificateNotFound`] for an empty slot,
/// [`LoginError::CertificateParseError`] or
/// [`LoginError::UnsupportedKeyAlgorithm`] for a certificate this tool
/// cannot use.
pub fn read_identity(session: &TokenSession, slot: PivSlot) -> LoginResult<IdentityCertificate> {
    log::debug!("Reading certificate from slot {slot} ({})", slot.description());
    let der = session
        .with_backend(|backend| backend.read_certificate(slot))?
        .ok_or(LoginError::CertificateNotFound { slot })?;

    let identity = IdentityCertificate::from_der(&der)?;
    log::info!("Certificate subject: {}", identity.subject());
    log::info!("Certificate issuer: {}", identity.issuer());
    log::info!(
        "Certificate key: {}, SHA-256 fingerprint: {}",
        identity.key_algorithm(),
        identity.fingerprint_sha256()
    );

    let remaining = identity.seconds_until_expiry();
    if remaining < 0 {
        log::warn!("Certificate in slot {slot} has expired");
    } else if remaining < EXPIRY_WARNING_SECS {
        log::warn!(
            "Certificate in slot {slot} expires in {} days",
            remaining / 86_400
        );
    }

    Ok(identity)
}
