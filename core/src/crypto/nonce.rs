// ## 📂 File: `src/crypto/nonce.rs`

//! Deterministic per-frame nonce derivation from a stream IV and frame index.
//!
//! Design:
//! - TLS-like scheme: the random per-stream IV is the base nonce, then the
//!   last 8 bytes are XORed with the little-endian frame_index.
//!
//! Security notes:
//! - Never reuse the same (iv, frame_index) pair with different plaintext.
//!   The IV must be random per stream.
//! - Do not use all-zero IVs. Validate before deriving.

use crate::constants::ALLOWED_IV_LENGTHS;
use crate::crypto::types::CryptoError;

/// Derive the nonce for `frame_index` from the stream IV.
///
/// Contract and invariants:
/// - `iv` length must be one of `ALLOWED_IV_LENGTHS` (12 or the legacy 16).
/// - Output length equals the IV length.
/// - Deterministic mapping: same `(iv, frame_index)` -> same nonce.
#[inline]
pub fn derive_frame_nonce(iv: &[u8], frame_index: u64) -> Result<Vec<u8>, CryptoError> {
    validate_iv(iv)?;

    let mut nonce = iv.to_vec();
    let tail = nonce.len() - 8;
    let ctr: [u8; 8] = frame_index.to_le_bytes();
    for j in 0..8 {
        nonce[tail + j] ^= ctr[j];
    }
    Ok(nonce)
}

/// Reject unsupported lengths and all-zero IVs.
#[inline]
pub fn validate_iv(iv: &[u8]) -> Result<(), CryptoError> {
    if !ALLOWED_IV_LENGTHS.contains(&iv.len()) {
        return Err(CryptoError::InvalidNonceLen {
            expected: ALLOWED_IV_LENGTHS[0],
            actual: iv.len(),
        });
    }
    if iv.iter().all(|&b| b == 0) {
        return Err(CryptoError::Failure("IV must not be all-zero".into()));
    }
    Ok(())
}

/// Fresh random IV of the requested length.
pub fn random_iv(len: usize) -> Result<Vec<u8>, CryptoError> {
    use rand::RngCore;

    if !ALLOWED_IV_LENGTHS.contains(&len) {
        return Err(CryptoError::InvalidNonceLen { expected: ALLOWED_IV_LENGTHS[0], actual: len });
    }
    let mut iv = vec![0u8; len];
    loop {
        rand::rngs::OsRng.fill_bytes(&mut iv);
        if iv.iter().any(|&b| b != 0) {
            return Ok(iv);
        }
    }
}
