//! Adapter layer modules for external system integration.
//!
//! Provides adapters for:
//! - PIV token access (backend traits, PC/SC `YubiKey` implementation)
//! - The Vault certificate login HTTP exchange

pub mod backend;
#[cfg(test)]
pub mod soft_token;
pub mod vault_http_client;
pub mod yubikey;
