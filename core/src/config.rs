//! Codec configuration.
//!
//! Read-only after construction and passed explicitly to every entry point.
//! Loadable from JSON; unknown fields are rejected so typos surface early.

use serde::{Deserialize, Serialize};

use crate::constants::{ALLOWED_IV_LENGTHS, DEFAULT_CHUNK_SIZE, DEFAULT_IV_LENGTH, MAX_CHUNK_SIZE};
use crate::crypto::{DigestAlg, SymmetricCipher};
use crate::types::{OsciError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OsciConfig {
    /// Sign outbound messages.
    pub sign: bool,
    /// Wrap outbound messages in the transport encryption envelope.
    pub encrypt: bool,
    /// Verify signatures of inbound messages.
    pub verify_signatures: bool,
    pub digest: DigestAlg,
    pub cipher: SymmetricCipher,
    pub iv_length: usize,
    /// Language tags sent in the DesiredLanguages header.
    pub desired_languages: Vec<String>,
    /// Plaintext bytes per streaming cipher frame.
    pub chunk_size: usize,
    /// Max bytes of an inbound attachment kept in memory; `None` keeps all.
    pub attachment_retention: Option<usize>,
    /// base64 transfer encoding for attachment and ciphertext parts.
    pub base64_attachments: bool,
}

impl Default for OsciConfig {
    fn default() -> Self {
        Self {
            sign: true,
            encrypt: true,
            verify_signatures: true,
            digest: DigestAlg::Sha256,
            cipher: SymmetricCipher::Aes256Gcm,
            iv_length: DEFAULT_IV_LENGTH,
            desired_languages: vec!["de".to_string()],
            chunk_size: DEFAULT_CHUNK_SIZE,
            attachment_retention: None,
            base64_attachments: false,
        }
    }
}

impl OsciConfig {
    pub fn from_json(raw: &str) -> Result<Self> {
        let cfg: OsciConfig = serde_json::from_str(raw)
            .map_err(|e| OsciError::precondition(format!("invalid configuration: {}", e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| OsciError::precondition(format!("configuration not serializable: {}", e)))
    }

    /// Reject settings the codec cannot honor.
    pub fn validate(&self) -> Result<()> {
        if !ALLOWED_IV_LENGTHS.contains(&self.iv_length) {
            return Err(OsciError::precondition(format!(
                "iv_length {} not in {:?}",
                self.iv_length, ALLOWED_IV_LENGTHS
            )));
        }
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(OsciError::precondition(format!(
                "chunk_size {} outside 1..={}",
                self.chunk_size, MAX_CHUNK_SIZE
            )));
        }
        if self.desired_languages.iter().any(|l| l.is_empty() || l.contains(char::is_whitespace)) {
            return Err(OsciError::precondition("desired languages must be single non-empty tags"));
        }
        Ok(())
    }
}
