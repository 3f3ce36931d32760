//! `YubiKey` hardware PIV operations adapter.
//!
//! Provides PC/SC reader enumeration and the PIV operations the login flow
//! needs: PIN verification, certificate retrieval and raw private key
//! operations.

use der::Encode;
use yubikey::{reader::Context, YubiKey};

use crate::{
    adapters::backend::{BackendType, PivBackend, TokenProvider},
    domain::identity::KeyAlgorithm,
    domain::types::{PivPin, PivSlot},
    infra::error::{LoginError, LoginResult},
};

/// Low-level `YubiKey` PIV operations on one opened device.
pub struct YubiKeyOperations {
    yubikey: YubiKey,
}

impl YubiKeyOperations {
    /// Wrap an opened device.
    #[must_use]
    pub fn new(yubikey: YubiKey) -> Self {
        Self { yubikey }
    }

    /// Device firmware version string.
    #[must_use]
    pub fn version(&self) -> String {
        let v = self.yubikey.version();
        format!("{}.{}.{}", v.major, v.minor, v.patch)
    }
}

impl PivBackend for YubiKeyOperations {
    fn backend_type(&self) -> BackendType {
        BackendType::Pcsc
    }

    fn verify_pin(&mut self, pin: &PivPin) -> LoginResult<()> {
        match self.yubikey.verify_pin(pin.as_bytes()) {
            Ok(()) => {
                log::debug!("PIN verified");
                Ok(())
            }
            // Over-long PINs are refused before reaching the card
            Err(yubikey::Error::SizeError) => Err(LoginError::AuthenticationFailed {
                retries_remaining: None,
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn read_certificate(&mut self, slot: PivSlot) -> LoginResult<Option<Vec<u8>>> {
        match yubikey::Certificate::read(&mut self.yubikey, slot.as_slot_id()) {
            Ok(cert) => cert.cert.to_der().map(Some).map_err(|e| {
                LoginError::CertificateParseError(format!(
                    "Failed to encode certificate to DER: {e}"
                ))
            }),
            Err(yubikey::Error::NotFound) => Ok(None),
            Err(yubikey::Error::InvalidObject) | Err(yubikey::Error::ParseError) => {
                Err(LoginError::CertificateParseError(format!(
                    "certificate object in slot {slot} is malformed"
                )))
            }
            Err(e) => Err(LoginError::TokenError(format!(
                "Failed to read certificate from slot {slot}: {e}"
            ))),
        }
    }

    fn sign_raw(
        &mut self,
        slot: PivSlot,
        algorithm: KeyAlgorithm,
        input: &[u8],
    ) -> LoginResult<Vec<u8>> {
        let signature = yubikey::piv::sign_data(
            &mut self.yubikey,
            input,
            algorithm.as_algorithm_id(),
            slot.as_slot_id(),
        )
        .map_err(|e| LoginError::KeyUnavailable {
            slot,
            reason: e.to_string(),
        })?;
        Ok(signature.to_vec())
    }

    fn serial(&self) -> u32 {
        self.yubikey.serial().into()
    }
}

/// Enumerates PC/SC readers and opens `YubiKey`s through them.
pub struct PcscTokenProvider {
    context: Option<Context>,
}

impl PcscTokenProvider {
    #[must_use]
    pub fn new() -> Self {
        Self { context: None }
    }

    fn context(&mut self) -> LoginResult<&mut Context> {
        if self.context.is_none() {
            let context = Context::open()
                .map_err(|e| LoginError::TokenError(format!("Failed to open PC/SC context: {e}")))?;
            self.context = Some(context);
        }
        self.context
            .as_mut()
            .ok_or_else(|| LoginError::TokenError("PC/SC context unavailable".to_string()))
    }
}

impl Default for PcscTokenProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenProvider for PcscTokenProvider {
    fn list_readers(&mut self) -> LoginResult<Vec<String>> {
        let context = self.context()?;
        match context.iter() {
            Ok(readers) => Ok(readers.map(|r| r.name().to_string()).collect()),
            Err(e) => {
                // pcsc reports "no readers" as an error
                log::debug!("Reader enumeration failed: {e}");
                Ok(Vec::new())
            }
        }
    }

    fn open(&mut self, name: &str) -> LoginResult<Box<dyn PivBackend>> {
        let context = self.context()?;
        let readers = context
            .iter()
            .map_err(|e| LoginError::TokenError(format!("Failed to enumerate readers: {e}")))?;
        for reader in readers {
            if reader.name() == name {
                let yubikey = reader.open().map_err(|e| {
                    LoginError::TokenError(format!("Failed to open reader '{name}': {e}"))
                })?;
                let ops = YubiKeyOperations::new(yubikey);
                log::debug!("Opened '{name}' (firmware {})", ops.version());
                return Ok(Box::new(ops));
            }
        }
        Err(LoginError::TokenError(format!("Reader '{name}' disappeared")))
    }
}
