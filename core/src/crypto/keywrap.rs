// ## src/crypto/keywrap.rs

//! Content-encryption key transport to a recipient certificate.
//!
//! Ephemeral-static X25519 agreement, HKDF-SHA256 KEK, AES-256-GCM wrap.
//! Wire form of a wrapped key: `ephemeral_pub (32) || nonce (12) || wrapped`.

use rand::rngs::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::constants::DEFAULT_IV_LENGTH;
use crate::crypto::aead::{AeadImpl, SymmetricCipher};
use crate::crypto::kdf::derive_kek_32;
use crate::crypto::nonce::random_iv;
use crate::crypto::types::{CryptoError, TAG_LEN, X25519_LEN};

/// A content-encryption key wrapped for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedKey {
    pub ephemeral_pub: [u8; X25519_LEN],
    pub nonce: [u8; DEFAULT_IV_LENGTH],
    pub wrapped: Vec<u8>,
}

impl WrappedKey {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(X25519_LEN + DEFAULT_IV_LENGTH + self.wrapped.len());
        out.extend_from_slice(&self.ephemeral_pub);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.wrapped);
        out
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Self, CryptoError> {
        let head = X25519_LEN + DEFAULT_IV_LENGTH;
        if raw.len() < head + TAG_LEN {
            return Err(CryptoError::Failure(format!("wrapped key too short: {} bytes", raw.len())));
        }
        let mut ephemeral_pub = [0u8; X25519_LEN];
        ephemeral_pub.copy_from_slice(&raw[..X25519_LEN]);
        let mut nonce = [0u8; DEFAULT_IV_LENGTH];
        nonce.copy_from_slice(&raw[X25519_LEN..head]);
        Ok(Self { ephemeral_pub, nonce, wrapped: raw[head..].to_vec() })
    }
}

fn kek_cipher(
    shared: &[u8; X25519_LEN],
    ephemeral_pub: &[u8; X25519_LEN],
    recipient_pub: &[u8; X25519_LEN],
) -> Result<AeadImpl, CryptoError> {
    let kek = derive_kek_32(shared, ephemeral_pub, recipient_pub)?;
    AeadImpl::new(SymmetricCipher::Aes256Gcm, kek.as_ref(), DEFAULT_IV_LENGTH)
}

/// Wrap `cek` for the holder of `recipient_pub`.
pub fn wrap_key(cek: &[u8], recipient_pub: &[u8; X25519_LEN]) -> Result<WrappedKey, CryptoError> {
    let ephemeral = StaticSecret::random_from_rng(OsRng);
    let ephemeral_pub = PublicKey::from(&ephemeral).to_bytes();
    let shared = Zeroizing::new(ephemeral.diffie_hellman(&PublicKey::from(*recipient_pub)).to_bytes());

    let aead = kek_cipher(&shared, &ephemeral_pub, recipient_pub)?;
    let iv = random_iv(DEFAULT_IV_LENGTH)?;
    let mut nonce = [0u8; DEFAULT_IV_LENGTH];
    nonce.copy_from_slice(&iv);
    let wrapped = aead.seal(&nonce, recipient_pub, cek)?;

    Ok(WrappedKey { ephemeral_pub, nonce, wrapped })
}

/// Unwrap with the recipient's static secret. A key wrapped for someone
/// else fails with `TagMismatch`.
pub fn unwrap_key(wrapped: &WrappedKey, secret: &StaticSecret) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let recipient_pub = PublicKey::from(secret).to_bytes();
    let shared = Zeroizing::new(secret.diffie_hellman(&PublicKey::from(wrapped.ephemeral_pub)).to_bytes());

    let aead = kek_cipher(&shared, &wrapped.ephemeral_pub, &recipient_pub)?;
    let cek = aead.open(&wrapped.nonce, &recipient_pub, &wrapped.wrapped)?;
    Ok(Zeroizing::new(cek))
}
