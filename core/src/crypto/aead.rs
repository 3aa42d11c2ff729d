// ## 📂 File: `src/crypto/aead.rs`

//! src/crypto/aead.rs
//! AEAD interface for AES-GCM with 12-byte and legacy 16-byte nonces.
//!
//! Design notes:
//! - AES-128-GCM and AES-256-GCM, selected by the algorithm URI of the
//!   encryption block.
//! - Nonce length follows the declared IV length; 16 is kept for peers that
//!   predate the IV length declaration.
//! - Tag verification must fail closed (no partial plaintext).

use serde::{Deserialize, Serialize};

use aes_gcm::aead::consts::{U12, U16};
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::aes::{Aes128, Aes256};
use aes_gcm::{AesGcm, Nonce};

use crate::constants::{alg_uris, AES128_KEY_LEN, AES256_KEY_LEN, DEFAULT_IV_LENGTH, LEGACY_IV_LENGTH};
use crate::crypto::types::{CryptoError, TAG_LEN};

/// Symmetric ciphers (registry).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymmetricCipher {
    Aes128Gcm,
    Aes256Gcm,
}

impl SymmetricCipher {
    pub fn uri(&self) -> &'static str {
        match self {
            SymmetricCipher::Aes128Gcm => alg_uris::AES128_GCM,
            SymmetricCipher::Aes256Gcm => alg_uris::AES256_GCM,
        }
    }

    pub fn from_uri(uri: &str) -> Result<Self, CryptoError> {
        match uri {
            alg_uris::AES128_GCM => Ok(SymmetricCipher::Aes128Gcm),
            alg_uris::AES256_GCM => Ok(SymmetricCipher::Aes256Gcm),
            other => Err(CryptoError::UnsupportedCipher { uri: other.to_string() }),
        }
    }

    pub fn key_len(&self) -> usize {
        match self {
            SymmetricCipher::Aes128Gcm => AES128_KEY_LEN,
            SymmetricCipher::Aes256Gcm => AES256_KEY_LEN,
        }
    }
}

impl Default for SymmetricCipher {
    fn default() -> Self {
        SymmetricCipher::Aes256Gcm
    }
}

type Aes128Gcm12 = AesGcm<Aes128, U12>;
type Aes256Gcm12 = AesGcm<Aes256, U12>;
type Aes128Gcm16 = AesGcm<Aes128, U16>;
type Aes256Gcm16 = AesGcm<Aes256, U16>;

/// Unified AEAD implementation selected by cipher and nonce length.
#[derive(Clone)]
pub enum AeadImpl {
    Aes128N12(Aes128Gcm12),
    Aes256N12(Aes256Gcm12),
    Aes128N16(Aes128Gcm16),
    Aes256N16(Aes256Gcm16),
}

impl AeadImpl {
    /// Construct from cipher choice, key, and nonce length.
    pub fn new(cipher: SymmetricCipher, key: &[u8], nonce_len: usize) -> Result<Self, CryptoError> {
        if key.len() != cipher.key_len() {
            return Err(CryptoError::InvalidKeyLen { expected: cipher.key_len(), actual: key.len() });
        }
        let bad_key = |_| CryptoError::InvalidKeyLen { expected: cipher.key_len(), actual: key.len() };

        match (cipher, nonce_len) {
            (SymmetricCipher::Aes128Gcm, DEFAULT_IV_LENGTH) =>
                Ok(Self::Aes128N12(Aes128Gcm12::new_from_slice(key).map_err(bad_key)?)),
            (SymmetricCipher::Aes256Gcm, DEFAULT_IV_LENGTH) =>
                Ok(Self::Aes256N12(Aes256Gcm12::new_from_slice(key).map_err(bad_key)?)),
            (SymmetricCipher::Aes128Gcm, LEGACY_IV_LENGTH) =>
                Ok(Self::Aes128N16(Aes128Gcm16::new_from_slice(key).map_err(bad_key)?)),
            (SymmetricCipher::Aes256Gcm, LEGACY_IV_LENGTH) =>
                Ok(Self::Aes256N16(Aes256Gcm16::new_from_slice(key).map_err(bad_key)?)),
            (_, other) => Err(CryptoError::InvalidNonceLen { expected: DEFAULT_IV_LENGTH, actual: other }),
        }
    }

    pub fn nonce_len(&self) -> usize {
        match self {
            AeadImpl::Aes128N12(_) | AeadImpl::Aes256N12(_) => DEFAULT_IV_LENGTH,
            AeadImpl::Aes128N16(_) | AeadImpl::Aes256N16(_) => LEGACY_IV_LENGTH,
        }
    }

    fn check_nonce(&self, nonce: &[u8]) -> Result<(), CryptoError> {
        if nonce.len() != self.nonce_len() {
            return Err(CryptoError::InvalidNonceLen { expected: self.nonce_len(), actual: nonce.len() });
        }
        Ok(())
    }

    /// AEAD seal (encrypt) plaintext with nonce and AAD. Empty plaintext is
    /// allowed (terminator frames).
    pub fn seal(&self, nonce: &[u8], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.check_nonce(nonce)?;
        let payload = Payload { msg: plaintext, aad };
        let res = match self {
            AeadImpl::Aes128N12(c) => c.encrypt(Nonce::<U12>::from_slice(nonce), payload),
            AeadImpl::Aes256N12(c) => c.encrypt(Nonce::<U12>::from_slice(nonce), payload),
            AeadImpl::Aes128N16(c) => c.encrypt(Nonce::<U16>::from_slice(nonce), payload),
            AeadImpl::Aes256N16(c) => c.encrypt(Nonce::<U16>::from_slice(nonce), payload),
        };
        res.map_err(|_| CryptoError::Failure("AES-GCM seal failed".into()))
    }

    /// AEAD open (decrypt) ciphertext with nonce and AAD.
    pub fn open(&self, nonce: &[u8], aad: &[u8], ciphertext_and_tag: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.check_nonce(nonce)?;
        if ciphertext_and_tag.len() < TAG_LEN {
            return Err(CryptoError::Failure("ciphertext too short".into()));
        }
        let payload = Payload { msg: ciphertext_and_tag, aad };
        let res = match self {
            AeadImpl::Aes128N12(c) => c.decrypt(Nonce::<U12>::from_slice(nonce), payload),
            AeadImpl::Aes256N12(c) => c.decrypt(Nonce::<U12>::from_slice(nonce), payload),
            AeadImpl::Aes128N16(c) => c.decrypt(Nonce::<U16>::from_slice(nonce), payload),
            AeadImpl::Aes256N16(c) => c.decrypt(Nonce::<U16>::from_slice(nonce), payload),
        };
        res.map_err(|_| CryptoError::TagMismatch)
    }
}

/// Fresh random content-encryption key for `cipher`.
pub fn generate_content_key(cipher: SymmetricCipher) -> zeroize::Zeroizing<Vec<u8>> {
    use rand::RngCore;
    let mut key = zeroize::Zeroizing::new(vec![0u8; cipher.key_len()]);
    rand::rngs::OsRng.fill_bytes(&mut key);
    key
}
