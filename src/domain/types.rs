//! Type-safe wrappers using new-type pattern
//!
//! This module provides type-safe wrappers for the inputs of the login flow
//! to prevent common errors and keep secrets out of logs.

use std::fmt;
use std::str::FromStr;

use zeroize::Zeroizing;

use crate::domain::constants;
use crate::infra::error::{LoginError, LoginResult};

/// Type-safe wrapper for the Vault server base address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultAddr(String);

impl VaultAddr {
    /// Create a new `VaultAddr` after validation
    pub fn new(addr: impl AsRef<str>) -> LoginResult<Self> {
        let addr = addr.as_ref().trim();
        if addr.is_empty() {
            return Err(LoginError::MissingEndpoint);
        }
        Self::validate_addr(addr)?;
        Ok(VaultAddr(addr.trim_end_matches('/').to_string()))
    }

    /// Get the address as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Full URL of the certificate login endpoint.
    #[must_use]
    pub fn login_url(&self) -> String {
        format!("{}{}", self.0, constants::CERT_LOGIN_PATH)
    }

    fn validate_addr(addr: &str) -> LoginResult<()> {
        let Some(rest) = addr
            .strip_prefix("https://")
            .or_else(|| addr.strip_prefix("http://"))
        else {
            return Err(LoginError::InvalidEndpoint(format!(
                "address must start with http:// or https://, got: {addr}"
            )));
        };

        let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
        if host.is_empty() {
            return Err(LoginError::InvalidEndpoint(format!(
                "address has no host: {addr}"
            )));
        }
        if host.chars().any(char::is_whitespace) {
            return Err(LoginError::InvalidEndpoint(format!(
                "address contains whitespace: {addr}"
            )));
        }

        Ok(())
    }
}

impl FromStr for VaultAddr {
    type Err = LoginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for VaultAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type-safe wrapper for PIV PINs.
///
/// The value is wiped from memory on drop and never printed.
#[derive(Clone)]
pub struct PivPin(Zeroizing<String>);

impl PivPin {
    /// Create a new `PivPin` after validation
    pub fn new(pin: impl Into<String>) -> LoginResult<Self> {
        let pin = Zeroizing::new(pin.into());
        Self::validate_pin(&pin)?;
        Ok(PivPin(pin))
    }

    /// The manufacturer default PIN.
    #[must_use]
    pub fn default_pin() -> Self {
        PivPin(Zeroizing::new(constants::DEFAULT_PIN.to_string()))
    }

    /// Get the PIN as bytes for the token API
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Whether this is the manufacturer default PIN.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.0.as_str() == constants::DEFAULT_PIN
    }

    fn validate_pin(pin: &str) -> LoginResult<()> {
        // Length limits are the token's to enforce
        if pin.is_empty() {
            return Err(LoginError::InputError("PIN is empty".to_string()));
        }
        Ok(())
    }
}

impl fmt::Debug for PivPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PivPin([PIN REDACTED])")
    }
}

impl fmt::Display for PivPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[PIN REDACTED]")
    }
}

/// Type-safe wrapper for PIV slot IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PivSlot(u8);

impl PivSlot {
    /// The authentication slot (9a) used for TLS client certificates.
    pub const AUTHENTICATION: PivSlot = PivSlot(constants::PIV_SLOT_AUTHENTICATION);

    /// Create a new `PivSlot` after validation
    pub fn new(slot: u8) -> LoginResult<Self> {
        Self::validate_slot(slot)?;
        Ok(PivSlot(slot))
    }

    /// Get the slot ID as u8
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    /// Get the slot as a `YubiKey` `SlotId` enum
    #[cfg(feature = "pcsc-backend")]
    #[must_use]
    pub fn as_slot_id(&self) -> yubikey::piv::SlotId {
        match self.0 {
            constants::PIV_SLOT_SIGNATURE => yubikey::piv::SlotId::Signature,
            constants::PIV_SLOT_KEY_MANAGEMENT => yubikey::piv::SlotId::KeyManagement,
            constants::PIV_SLOT_CARD_AUTHENTICATION => yubikey::piv::SlotId::CardAuthentication,
            _ => yubikey::piv::SlotId::Authentication,
        }
    }

    /// Get a human-readable description of the slot
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self.0 {
            constants::PIV_SLOT_AUTHENTICATION => "PIV Authentication",
            constants::PIV_SLOT_SIGNATURE => "Digital Signature",
            constants::PIV_SLOT_KEY_MANAGEMENT => "Key Management",
            constants::PIV_SLOT_CARD_AUTHENTICATION => "Card Authentication",
            _ => "Unknown slot",
        }
    }

    fn validate_slot(slot: u8) -> LoginResult<()> {
        match slot {
            constants::PIV_SLOT_AUTHENTICATION
            | constants::PIV_SLOT_SIGNATURE
            | constants::PIV_SLOT_KEY_MANAGEMENT
            | constants::PIV_SLOT_CARD_AUTHENTICATION => Ok(()),
            _ => Err(LoginError::ConfigurationError(format!(
                "Invalid PIV slot 0x{slot:02x}. Valid slots: 9a (Auth), 9c (Sign), 9d (KeyMgmt), 9e (CardAuth)"
            ))),
        }
    }
}

impl Default for PivSlot {
    fn default() -> Self {
        PivSlot::AUTHENTICATION
    }
}

impl FromStr for PivSlot {
    type Err = LoginError;

    /// Accepts `9a`, `0x9a` and `0X9A`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let hex = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let slot = u8::from_str_radix(hex, 16).map_err(|_| {
            LoginError::ConfigurationError(format!(
                "Invalid slot format '{s}'. Expected hex value (9a, 9c, 9d, or 9e)"
            ))
        })?;
        Self::new(slot)
    }
}

impl fmt::Display for PivSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vault_addr_builds_login_url() {
        let addr = VaultAddr::new("https://vault.example.com:8200").unwrap();
        assert_eq!(
            addr.login_url(),
            "https://vault.example.com:8200/v1/auth/cert/login"
        );

        let addr = VaultAddr::new("https://vault.example.com:8200/").unwrap();
        assert_eq!(addr.as_str(), "https://vault.example.com:8200");
    }

    #[test]
    fn vault_addr_rejects_bad_input() {
        assert!(matches!(
            VaultAddr::new(""),
            Err(LoginError::MissingEndpoint)
        ));
        assert!(matches!(
            VaultAddr::new("vault.example.com"),
            Err(LoginError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            VaultAddr::new("https://"),
            Err(LoginError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn pin_is_redacted() {
        let pin = PivPin::new("654321").unwrap();
        assert_eq!(format!("{pin}"), "[PIN REDACTED]");
        assert!(!format!("{pin:?}").contains("654321"));
        assert_eq!(pin.as_bytes(), b"654321");
    }

    #[test]
    fn pin_length_limits() {
        assert!(PivPin::new("").is_err());
        assert_eq!(PivPin::new("123456789").unwrap().as_bytes(), b"123456789");
        assert!(PivPin::new("12345678").is_ok());
        assert!(PivPin::default_pin().is_default());
    }

    #[test]
    fn slot_parsing() {
        assert_eq!("9a".parse::<PivSlot>().unwrap(), PivSlot::AUTHENTICATION);
        assert_eq!("0x9c".parse::<PivSlot>().unwrap().as_u8(), 0x9c);
        assert!("9b".parse::<PivSlot>().is_err());
        assert!("zz".parse::<PivSlot>().is_err());
        assert_eq!(PivSlot::default().to_string(), "9a");
    }
}
