//! Role certificates.
//!
//! A certificate binds a subject to an Ed25519 verifying key (signature
//! certificate) or an X25519 public key (cipher certificate). It travels
//! base64-encoded inside `ds:X509Certificate`; the binary form is bincode.
//! Trust evaluation is left to the application.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bincode::{Decode, Encode};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use crate::crypto::fingerprint;
use crate::crypto::types::{CryptoError, ED25519_SIG_LEN, X25519_LEN};

bitflags::bitflags! {
    /// Permitted key usages.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct KeyUsage: u8 {
        const DIGITAL_SIGNATURE = 0b0000_0001;
        const NON_REPUDIATION   = 0b0000_0010;
        const KEY_ENCIPHERMENT  = 0b0000_0100;
        const DATA_ENCIPHERMENT = 0b0000_1000;
        const KEY_AGREEMENT     = 0b0001_0000;
    }
}

impl KeyUsage {
    /// Usages that allow verifying message signatures.
    pub fn permits_signing(&self) -> bool {
        self.intersects(KeyUsage::DIGITAL_SIGNATURE | KeyUsage::NON_REPUDIATION)
    }

    /// Usages that allow wrapping content keys.
    pub fn permits_key_transport(&self) -> bool {
        self.intersects(KeyUsage::KEY_ENCIPHERMENT | KeyUsage::KEY_AGREEMENT)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Certificate {
    subject: String,
    serial: u64,
    signing_key: Option<[u8; 32]>,
    cipher_key: Option<[u8; X25519_LEN]>,
    key_usage: u8,
}

impl Certificate {
    pub fn for_signing(subject: impl Into<String>, serial: u64, key: [u8; 32]) -> Self {
        Self {
            subject: subject.into(),
            serial,
            signing_key: Some(key),
            cipher_key: None,
            key_usage: (KeyUsage::DIGITAL_SIGNATURE | KeyUsage::NON_REPUDIATION).bits(),
        }
    }

    pub fn for_cipher(subject: impl Into<String>, serial: u64, key: [u8; X25519_LEN]) -> Self {
        Self {
            subject: subject.into(),
            serial,
            signing_key: None,
            cipher_key: Some(key),
            key_usage: (KeyUsage::KEY_AGREEMENT | KeyUsage::KEY_ENCIPHERMENT).bits(),
        }
    }

    /// Replace the usage flags.
    pub fn with_key_usage(mut self, usage: KeyUsage) -> Self {
        self.key_usage = usage.bits();
        self
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn key_usage(&self) -> KeyUsage {
        KeyUsage::from_bits_truncate(self.key_usage)
    }

    pub fn cipher_public_key(&self) -> Result<&[u8; X25519_LEN], CryptoError> {
        self.cipher_key.as_ref().ok_or(CryptoError::MissingPublicKey("cipher"))
    }

    pub fn verifying_key(&self) -> Result<VerifyingKey, CryptoError> {
        let raw = self.signing_key.as_ref().ok_or(CryptoError::MissingPublicKey("signature"))?;
        VerifyingKey::from_bytes(raw).map_err(|_| CryptoError::BadSignature)
    }

    /// Verify an Ed25519 signature over `data`.
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
        if signature.len() != ED25519_SIG_LEN {
            return Err(CryptoError::BadSignature);
        }
        let sig = Signature::from_slice(signature).map_err(|_| CryptoError::BadSignature)?;
        self.verifying_key()?
            .verify(data, &sig)
            .map_err(|_| CryptoError::BadSignature)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| CryptoError::Failure(format!("certificate encode: {}", e)))
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Self, CryptoError> {
        let (cert, used): (Certificate, usize) =
            bincode::decode_from_slice(raw, bincode::config::standard())
                .map_err(|e| CryptoError::Failure(format!("certificate decode: {}", e)))?;
        if used != raw.len() {
            return Err(CryptoError::Failure("trailing bytes after certificate".into()));
        }
        Ok(cert)
    }

    pub fn to_base64(&self) -> Result<String, CryptoError> {
        Ok(STANDARD.encode(self.to_bytes()?))
    }

    pub fn from_base64(text: &str) -> Result<Self, CryptoError> {
        let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let raw = STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| CryptoError::Failure(format!("certificate base64: {}", e)))?;
        Self::from_bytes(&raw)
    }

    /// SHA-256 fingerprint of the encoded certificate.
    pub fn fingerprint(&self) -> Result<String, CryptoError> {
        Ok(fingerprint(&self.to_bytes()?))
    }
}
