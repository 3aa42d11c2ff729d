//! Key selection for inbound encrypted data.
//!
//! Candidates are tried in order: explicit dialog partners first, then the
//! default recipients configured for server-side receipt. A decrypter
//! matches when its cipher certificate fingerprint equals the certificate
//! an encrypted key was wrapped for.

use std::sync::Arc;

use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::crypto::SymmetricCipher;
use crate::fault::FaultCode;
use crate::message::{EncryptedData, EncryptedKey};
use crate::roles::Decrypter;
use crate::types::{OsciError, Result};

#[derive(Clone, Default)]
pub struct DecryptContext {
    candidates: Vec<Arc<dyn Decrypter>>,
    default_recipients: Vec<Arc<dyn Decrypter>>,
}

impl std::fmt::Debug for DecryptContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptContext")
            .field("candidates", &self.candidates.len())
            .field("default_recipients", &self.default_recipients.len())
            .finish()
    }
}

impl DecryptContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dialog partner expected to be the recipient.
    pub fn with_candidate(mut self, decrypter: Arc<dyn Decrypter>) -> Self {
        self.candidates.push(decrypter);
        self
    }

    /// Fallback recipient for messages that arrive without a prior dialog.
    pub fn with_default_recipient(mut self, decrypter: Arc<dyn Decrypter>) -> Self {
        self.default_recipients.push(decrypter);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty() && self.default_recipients.is_empty()
    }

    /// First decrypter holding the key one of `keys` was wrapped for.
    pub fn select<'k>(&self, keys: &'k [EncryptedKey]) -> Result<(Arc<dyn Decrypter>, &'k EncryptedKey)> {
        for decrypter in self.candidates.iter().chain(&self.default_recipients) {
            let own = decrypter.cipher_certificate().fingerprint()?;
            for key in keys {
                if key.recipient.fingerprint()? == own {
                    debug!(recipient = key.recipient.subject(), "decryption key selected");
                    return Ok((Arc::clone(decrypter), key));
                }
            }
        }
        warn!(keys = keys.len(), candidates = self.candidates.len() + self.default_recipients.len(),
            "no private key matches any recipient");
        Err(OsciError::confidentiality(
            FaultCode::NoMatchingPrivateKey,
            "no local private key matches the encrypted key recipients",
        ))
    }

    /// Content key of `enc`.
    pub fn content_key(&self, enc: &EncryptedData) -> Result<Zeroizing<Vec<u8>>> {
        let (decrypter, key) = self.select(&enc.keys)?;
        let cek = decrypter
            .unwrap_key(&key.wrapped)
            .map_err(|e| OsciError::confidentiality(FaultCode::DecryptionFailed, e.to_string()))?;
        if cek.len() != enc.cipher.key_len() {
            return Err(OsciError::confidentiality(
                FaultCode::DecryptionFailed,
                format!("content key has {} bytes, {:?} needs {}", cek.len(), enc.cipher, enc.cipher.key_len()),
            ));
        }
        Ok(cek)
    }
}

/// Resolve a cipher URI, reporting unknown ones as unsupported.
pub fn cipher_from_uri(uri: &str) -> Result<SymmetricCipher> {
    SymmetricCipher::from_uri(uri).map_err(|e| OsciError::confidentiality(FaultCode::UnsupportedAlgorithm, e.to_string()))
}
