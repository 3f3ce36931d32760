//! Vault YubiKey Login Library
//!
//! Logs in to a HashiCorp Vault compatible server with the X.509 certificate
//! held in a YubiKey PIV slot. The private key never leaves the token: the
//! TLS client signs its handshake through the token, Vault's certificate auth
//! method returns a client token, and the token is written to
//! `~/.vault-token` for the Vault CLI.
//!
//! Layers:
//! - [`domain`]: value types, certificate model, wire types, RSA encodings
//! - [`adapters`]: PIV token access and the Vault HTTP exchange
//! - [`services`]: the individual login steps
//! - [`pipelines`]: the end-to-end login flow
//! - [`infra`]: errors and configuration

pub mod adapters;
pub mod domain;
pub mod infra;
pub mod pipelines;
pub mod services;

pub use adapters::backend::{BackendType, PivBackend, TokenProvider};
#[cfg(feature = "pcsc-backend")]
pub use adapters::yubikey::PcscTokenProvider;
pub use domain::identity::{IdentityCertificate, KeyAlgorithm};
pub use domain::login::{ClientToken, LoginOutcome};
pub use domain::types::{PivPin, PivSlot, VaultAddr};
pub use infra::config::{ConfigManager, LoginConfiguration, LoginSettings, SettingsOverrides};
pub use infra::error::{ErrorCategory, LoginError, LoginResult};
pub use pipelines::{CertLoginPipeline, CertLoginReport, LoginStage};
