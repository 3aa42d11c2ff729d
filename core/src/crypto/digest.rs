//! Digest algorithms referenced from signatures.
//!
//! `DigestBuilder` is fed incrementally (canonical XML as it streams out of
//! the canonicalizer, attachment bytes as they leave the MIME reader) so no
//! part has to be buffered just to be hashed.

use std::io;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256, Sha512};
use sha3::{Sha3_256, Sha3_512};

use crate::constants::alg_uris;
use crate::crypto::types::DigestError;

/// Supported digest algorithms.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DigestAlg {
    Sha256,
    Sha512,
    Sha3_256,
    Sha3_512,
}

impl DigestAlg {
    pub fn uri(&self) -> &'static str {
        match self {
            DigestAlg::Sha256 => alg_uris::SHA256,
            DigestAlg::Sha512 => alg_uris::SHA512,
            DigestAlg::Sha3_256 => alg_uris::SHA3_256,
            DigestAlg::Sha3_512 => alg_uris::SHA3_512,
        }
    }

    pub fn from_uri(uri: &str) -> Result<Self, DigestError> {
        match uri {
            alg_uris::SHA256 => Ok(DigestAlg::Sha256),
            alg_uris::SHA512 => Ok(DigestAlg::Sha512),
            alg_uris::SHA3_256 => Ok(DigestAlg::Sha3_256),
            alg_uris::SHA3_512 => Ok(DigestAlg::Sha3_512),
            other => Err(DigestError::UnknownAlgorithm(other.to_string())),
        }
    }

    pub fn output_len(&self) -> usize {
        match self {
            DigestAlg::Sha256 | DigestAlg::Sha3_256 => 32,
            DigestAlg::Sha512 | DigestAlg::Sha3_512 => 64,
        }
    }
}

impl Default for DigestAlg {
    fn default() -> Self {
        DigestAlg::Sha256
    }
}

/// Internal hashing state.
enum DigestState {
    Sha256(Sha256),
    Sha512(Sha512),
    Sha3_256(Sha3_256),
    Sha3_512(Sha3_512),
}

impl DigestState {
    fn new(alg: DigestAlg) -> Self {
        match alg {
            DigestAlg::Sha256 => DigestState::Sha256(Sha256::new()),
            DigestAlg::Sha512 => DigestState::Sha512(Sha512::new()),
            DigestAlg::Sha3_256 => DigestState::Sha3_256(Sha3_256::new()),
            DigestAlg::Sha3_512 => DigestState::Sha3_512(Sha3_512::new()),
        }
    }

    #[inline]
    fn update(&mut self, data: &[u8]) {
        match self {
            DigestState::Sha256(h) => h.update(data),
            DigestState::Sha512(h) => h.update(data),
            DigestState::Sha3_256(h) => h.update(data),
            DigestState::Sha3_512(h) => h.update(data),
        }
    }

    #[inline]
    fn finalize(self) -> Vec<u8> {
        match self {
            DigestState::Sha256(h) => h.finalize().to_vec(),
            DigestState::Sha512(h) => h.finalize().to_vec(),
            DigestState::Sha3_256(h) => h.finalize().to_vec(),
            DigestState::Sha3_512(h) => h.finalize().to_vec(),
        }
    }
}

/// Incremental digest builder.
pub struct DigestBuilder {
    alg: DigestAlg,
    state: DigestState,
    len: u64,
}

impl DigestBuilder {
    #[inline]
    pub fn new(alg: DigestAlg) -> Self {
        Self { alg, state: DigestState::new(alg), len: 0 }
    }

    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        self.len += data.len() as u64;
        self.state.update(data);
    }

    pub fn alg(&self) -> DigestAlg {
        self.alg
    }

    /// Bytes consumed so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Finalize and return digest bytes. Can be called only once.
    #[inline]
    pub fn finalize(self) -> Vec<u8> {
        self.state.finalize()
    }
}

impl io::Write for DigestBuilder {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// One-shot digest.
pub fn digest(alg: DigestAlg, data: &[u8]) -> Vec<u8> {
    let mut b = DigestBuilder::new(alg);
    b.update(data);
    b.finalize()
}

/// SHA-256 hex fingerprint, used to identify certificates.
pub fn fingerprint(data: &[u8]) -> String {
    hex::encode(digest(DigestAlg::Sha256, data))
}
