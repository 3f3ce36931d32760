//! Host-side RSA message encodings (RFC 8017).
//!
//! PIV cards expose RSA as a raw private-key operation on a block exactly as
//! long as the modulus, so the encoded message is built here and the card
//! only exponentiates it.

use rand::RngCore;

use super::{DigestBytes, HashAlgorithm};

/// Minimum padding string length for EMSA-PKCS1-v1_5.
const PKCS1_MIN_PS_LEN: usize = 8;

/// EMSA-PSS trailer field.
const PSS_TRAILER: u8 = 0xbc;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PaddingError {
    #[error("RSA modulus too short: encoding needs {required} bytes, key provides {available}")]
    ModulusTooShort { required: usize, available: usize },
    #[error("salt length {actual} does not match digest length {expected}")]
    SaltLength { expected: usize, actual: usize },
}

/// EMSA-PKCS1-v1_5: `00 01 FF..FF 00 || DigestInfo || digest`.
pub fn pkcs1v15_encode(digest: &DigestBytes, modulus_len: usize) -> Result<Vec<u8>, PaddingError> {
    let prefix = digest.algorithm().digest_info_prefix();
    let t_len = prefix.len() + digest.as_slice().len();
    let required = t_len + PKCS1_MIN_PS_LEN + 3;
    if modulus_len < required {
        return Err(PaddingError::ModulusTooShort {
            required,
            available: modulus_len,
        });
    }

    let mut em = Vec::with_capacity(modulus_len);
    em.push(0x00);
    em.push(0x01);
    em.resize(modulus_len - t_len - 1, 0xff);
    em.push(0x00);
    em.extend_from_slice(prefix);
    em.extend_from_slice(digest.as_slice());
    debug_assert_eq!(em.len(), modulus_len);
    Ok(em)
}

/// EMSA-PSS with MGF1 over the same hash and a fresh random salt as long as the digest.
pub fn pss_encode(digest: &DigestBytes, modulus_bits: usize) -> Result<Vec<u8>, PaddingError> {
    let mut salt = vec![0u8; digest.algorithm().digest_size()];
    rand::rng().fill_bytes(&mut salt);
    pss_encode_with_salt(digest, modulus_bits, &salt)
}

/// EMSA-PSS with a caller supplied salt.
///
/// The output is left-padded to the full modulus length so it can be fed
/// straight to the card.
pub fn pss_encode_with_salt(
    digest: &DigestBytes,
    modulus_bits: usize,
    salt: &[u8],
) -> Result<Vec<u8>, PaddingError> {
    let algo = digest.algorithm();
    let h_len = algo.digest_size();
    if salt.len() != h_len {
        return Err(PaddingError::SaltLength {
            expected: h_len,
            actual: salt.len(),
        });
    }

    let modulus_len = modulus_bits.div_ceil(8);
    let em_bits = modulus_bits.saturating_sub(1);
    let em_len = em_bits.div_ceil(8);
    let required = h_len + salt.len() + 2;
    if em_len < required {
        return Err(PaddingError::ModulusTooShort {
            required,
            available: em_len,
        });
    }

    let h = algo.digest_parts(&[&[0u8; 8], digest.as_slice(), salt]);

    let db_len = em_len - h_len - 1;
    let mut db = vec![0u8; db_len];
    db[db_len - salt.len() - 1] = 0x01;
    db[db_len - salt.len()..].copy_from_slice(salt);

    let mask = mgf1(algo, h.as_slice(), db_len);
    for (byte, m) in db.iter_mut().zip(mask) {
        *byte ^= m;
    }
    let unused_bits = 8 * em_len - em_bits;
    db[0] &= 0xff >> unused_bits;

    let mut out = Vec::with_capacity(modulus_len);
    out.resize(modulus_len - em_len, 0x00);
    out.extend_from_slice(&db);
    out.extend_from_slice(h.as_slice());
    out.push(PSS_TRAILER);
    Ok(out)
}

/// MGF1 mask generation (RFC 8017, appendix B.2.1).
fn mgf1(algo: HashAlgorithm, seed: &[u8], len: usize) -> Vec<u8> {
    let mut mask = Vec::with_capacity(len + algo.digest_size());
    let mut counter: u32 = 0;
    while mask.len() < len {
        let block = algo.digest_parts(&[seed, &counter.to_be_bytes()]);
        mask.extend_from_slice(block.as_slice());
        counter += 1;
    }
    mask.truncate(len);
    mask
}
