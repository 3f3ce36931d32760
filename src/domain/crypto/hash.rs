//! Hash algorithm domain type.
//!
//! SHA-2 family used by the TLS signature schemes a PIV key can serve.

use std::fmt;

use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::domain::constants;

/// Supported hash algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    #[must_use]
    pub fn digest_size(&self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }

    /// DER `DigestInfo` prefix for PKCS#1 v1.5 signatures.
    #[must_use]
    pub fn digest_info_prefix(&self) -> &'static [u8] {
        match self {
            HashAlgorithm::Sha256 => constants::DIGEST_INFO_SHA256,
            HashAlgorithm::Sha384 => constants::DIGEST_INFO_SHA384,
            HashAlgorithm::Sha512 => constants::DIGEST_INFO_SHA512,
        }
    }

    /// Hash `data` in one shot.
    #[must_use]
    pub fn digest(&self, data: &[u8]) -> DigestBytes {
        self.digest_parts(&[data])
    }

    /// Hash the concatenation of `parts` without copying them together.
    #[must_use]
    pub fn digest_parts(&self, parts: &[&[u8]]) -> DigestBytes {
        let bytes = match self {
            HashAlgorithm::Sha256 => hash_parts::<Sha256>(parts),
            HashAlgorithm::Sha384 => hash_parts::<Sha384>(parts),
            HashAlgorithm::Sha512 => hash_parts::<Sha512>(parts),
        };
        DigestBytes {
            algo: *self,
            bytes: bytes.into_boxed_slice(),
        }
    }
}

/// Hash output tagged with the algorithm that produced it.
///
/// Only [`HashAlgorithm`] creates these, so the length always matches.
#[derive(Clone, PartialEq, Eq)]
pub struct DigestBytes {
    algo: HashAlgorithm,
    bytes: Box<[u8]>,
}

impl DigestBytes {
    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algo
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.bytes.into()
    }
}

impl fmt::Debug for DigestBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DigestBytes({:?}, {})", self.algo, hex::encode(&self.bytes))
    }
}

fn hash_parts<D: Digest>(parts: &[&[u8]]) -> Vec<u8> {
    let mut hasher = D::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().to_vec()
}
