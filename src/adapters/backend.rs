//! Token backend traits.
//!
//! This module defines the interface the login flow uses to talk to a PIV
//! token, independent of the transport:
//! - [`TokenProvider`] enumerates candidate tokens and opens one
//! - [`PivBackend`] is one opened token
//!
//! The PC/SC implementation lives in [`crate::adapters::yubikey`] (feature
//! `pcsc-backend`); tests substitute a software token.

use crate::domain::identity::KeyAlgorithm;
use crate::domain::types::{PivPin, PivSlot};
use crate::infra::error::LoginResult;

/// Backend implementation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// PC/SC backend using the `yubikey` crate (requires pcscd).
    Pcsc,
    /// In-memory token with a software key.
    Software,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pcsc => write!(f, "PC/SC"),
            Self::Software => write!(f, "software"),
        }
    }
}

/// One opened PIV token.
///
/// Implementations own the underlying connection; dropping the value
/// releases the token.
pub trait PivBackend: Send {
    /// Get the backend type.
    fn backend_type(&self) -> BackendType;

    /// Present the PIV PIN.
    ///
    /// # Errors
    ///
    /// Returns [`crate::LoginError::AuthenticationFailed`] with the retry
    /// counter when the token rejects the PIN.
    fn verify_pin(&mut self, pin: &PivPin) -> LoginResult<()>;

    /// Raw DER certificate stored in `slot`, or `None` when the slot is empty.
    ///
    /// # Errors
    ///
    /// Returns error if the certificate object cannot be read.
    fn read_certificate(&mut self, slot: PivSlot) -> LoginResult<Option<Vec<u8>>>;

    /// Run the private key operation of `slot`.
    ///
    /// For RSA keys `input` is the fully padded block (modulus length) and the
    /// result is the raw signature. For ECC keys `input` is the message digest
    /// and the result is a DER encoded ECDSA signature.
    ///
    /// # Errors
    ///
    /// Returns error if the token refuses or fails the operation.
    fn sign_raw(
        &mut self,
        slot: PivSlot,
        algorithm: KeyAlgorithm,
        input: &[u8],
    ) -> LoginResult<Vec<u8>>;

    /// Device serial number.
    fn serial(&self) -> u32;
}

/// Source of PIV tokens.
pub trait TokenProvider {
    /// Names of candidate tokens in enumeration order.
    ///
    /// # Errors
    ///
    /// Returns error if the transport itself is unavailable.
    fn list_readers(&mut self) -> LoginResult<Vec<String>>;

    /// Open the named candidate.
    ///
    /// # Errors
    ///
    /// Returns error if the candidate cannot be opened.
    fn open(&mut self, name: &str) -> LoginResult<Box<dyn PivBackend>>;
}
