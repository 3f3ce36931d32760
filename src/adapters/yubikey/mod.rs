//! `YubiKey` hardware adapter modules.
//!
//! Provides the PC/SC token provider and PIV operations used by the login
//! flow: PIN verification, certificate retrieval and private key operations.
//!
//! This module requires the `pcsc-backend` feature (enabled by default).

#[cfg(feature = "pcsc-backend")]
pub mod ops;

#[cfg(feature = "pcsc-backend")]
pub use ops::{PcscTokenProvider, YubiKeyOperations};
