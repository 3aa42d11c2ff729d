// ## src/crypto/kdf.rs

//! crypto/kdf.rs
//! HKDF-based key-encryption-key derivation for key transport.
//!
//! Design:
//! - HKDF-Extract(shared_secret, salt = ephemeral public key) -> PRK
//! - HKDF-Expand(PRK, info) -> KEK (32 bytes)
//!
//! Notes:
//! - Info binds both public keys so a wrapped key cannot be replayed to a
//!   different recipient.
//! - The all-zero shared secret (low-order peer point) is rejected.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::crypto::types::{CryptoError, KEY_LEN_32, X25519_LEN};

const KEK_LABEL: &[u8] = b"OSCI|KEK|X25519|v1";

#[inline]
fn build_info(ephemeral_pub: &[u8; X25519_LEN], recipient_pub: &[u8; X25519_LEN]) -> Vec<u8> {
    let mut info = Vec::with_capacity(KEK_LABEL.len() + 2 * X25519_LEN);
    info.extend_from_slice(KEK_LABEL);
    info.extend_from_slice(ephemeral_pub);
    info.extend_from_slice(recipient_pub);
    info
}

/// Derive a 32-byte KEK from an X25519 shared secret.
///
/// Errors:
/// - All-zero shared secret returns `CryptoError::Failure`.
pub fn derive_kek_32(
    shared_secret: &[u8; X25519_LEN],
    ephemeral_pub: &[u8; X25519_LEN],
    recipient_pub: &[u8; X25519_LEN],
) -> Result<Zeroizing<[u8; KEY_LEN_32]>, CryptoError> {
    if shared_secret.iter().all(|&b| b == 0) {
        return Err(CryptoError::Failure("shared secret must not be all-zero".into()));
    }

    let info = build_info(ephemeral_pub, recipient_pub);
    let hk = Hkdf::<Sha256>::new(Some(ephemeral_pub), shared_secret);
    let mut key = Zeroizing::new([0u8; KEY_LEN_32]);
    hk.expand(&info, key.as_mut())
        .map_err(|_| CryptoError::Failure("HKDF expand failed (SHA-256)".into()))?;
    Ok(key)
}
