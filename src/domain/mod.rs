//! Domain layer: value types, the certificate model, Vault wire types and
//! host-side signature encodings. No I/O happens here.

pub mod constants;
pub mod crypto;
pub mod identity;
pub mod login;
pub mod types;
