//! Service layer module root.
//! Contains the steps of the certificate login flow.

pub mod identity;
pub mod pin_prompt;
pub mod tls_client;
pub mod token_session;
pub mod token_store;
pub mod unlock;

pub use identity::read_identity;
pub use pin_prompt::{prompt_pin, PinAcquisition, PinSource, TerminalPinSource};
pub use tls_client::{build_client, build_tls_config, TokenCertResolver, TrustAnchors};
pub use token_session::{SessionHandle, TokenSession};
pub use token_store::TokenStore;
pub use unlock::{unlock, TokenSigningKey};
