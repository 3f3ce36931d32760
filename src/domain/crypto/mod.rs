//! Foundational cryptographic domain types.
//!
//! Provides strongly-typed wrappers and host-side encodings used when the
//! private key lives on the token:
//! - Hash algorithms and the digests they produce
//! - PKCS#1 v1.5 and PSS message encodings for raw RSA operations
//!
//! No private key material is ever handled here; the token performs the
//! private key operation on the encoded block.

mod hash;
pub mod padding;

pub use hash::{DigestBytes, HashAlgorithm};
