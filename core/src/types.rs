use std::io;

use thiserror::Error;

use crate::crypto::{CryptoError, DigestError};
use crate::fault::{FaultCode, ProtocolFault};
use crate::mime::MimeError;
use crate::xml::XmlError;

/// Unified codec error.
/// - One variant per failure class so callers can tell a lying peer from a
///   dead network.
/// - `From<T>` impls let `?` cross layer boundaries.
#[derive(Debug, Error)]
pub enum OsciError {
    /// Malformed or unexpected wire structure. Never retried.
    #[error("parse error [{code}]: {detail}")]
    Parse { code: FaultCode, detail: String },

    /// Digest mismatch, reference-set mismatch, bad signature value or a
    /// certificate that may not sign.
    #[error("signature invalid: {0}")]
    SignatureInvalid(String),

    /// Unsupported algorithm, no matching private key, or plaintext where
    /// ciphertext was required.
    #[error("confidentiality error [{code}]: {detail}")]
    Confidentiality { code: FaultCode, detail: String },

    /// Caller misuse: the message is missing something its kind mandates or
    /// is in the wrong lifecycle state.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Structurally valid fault returned by the peer.
    #[error("protocol fault: {0}")]
    Fault(ProtocolFault),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Write-side I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, OsciError>;

impl OsciError {
    pub fn parse(code: FaultCode, detail: impl Into<String>) -> Self {
        OsciError::Parse { code, detail: detail.into() }
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        OsciError::Parse { code: FaultCode::MessageMalformed, detail: detail.into() }
    }

    pub fn confidentiality(code: FaultCode, detail: impl Into<String>) -> Self {
        OsciError::Confidentiality { code, detail: detail.into() }
    }

    pub fn precondition(detail: impl Into<String>) -> Self {
        OsciError::Precondition(detail.into())
    }

    /// Re-raise an I/O failure seen while reading inbound bytes. Failures that
    /// originate in the symmetric decipher surface as confidentiality errors.
    pub fn from_read(err: io::Error) -> Self {
        let crypto = err
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<CryptoError>())
            .map(|c| c.to_string());
        match crypto {
            Some(detail) => OsciError::confidentiality(FaultCode::DecryptionFailed, detail),
            None => OsciError::malformed(format!("read failed: {}", err)),
        }
    }

    /// Fault code to report for this error.
    pub fn fault_code(&self) -> FaultCode {
        match self {
            OsciError::Parse { code, .. } | OsciError::Confidentiality { code, .. } => *code,
            OsciError::SignatureInvalid(_) => FaultCode::SignatureInvalid,
            OsciError::Fault(f) => FaultCode::parse(&f.code).unwrap_or(FaultCode::Unspecified),
            OsciError::Crypto(CryptoError::UnsupportedCipher { .. })
            | OsciError::Crypto(CryptoError::UnsupportedKeyTransport { .. }) => FaultCode::UnsupportedAlgorithm,
            OsciError::Crypto(_) => FaultCode::DecryptionFailed,
            OsciError::Precondition(_) | OsciError::Io(_) => FaultCode::Unspecified,
        }
    }
}

impl From<MimeError> for OsciError {
    fn from(e: MimeError) -> Self {
        match e {
            MimeError::Io(io) => OsciError::from_read(io),
            other => OsciError::malformed(other.to_string()),
        }
    }
}

impl From<XmlError> for OsciError {
    fn from(e: XmlError) -> Self {
        match e {
            XmlError::Io(io) => OsciError::from_read(io),
            other => OsciError::malformed(other.to_string()),
        }
    }
}

impl From<DigestError> for OsciError {
    fn from(e: DigestError) -> Self {
        match e {
            DigestError::UnknownAlgorithm(_) => OsciError::parse(FaultCode::UnsupportedAlgorithm, e.to_string()),
            DigestError::InvalidEncoding(_) => OsciError::malformed(e.to_string()),
        }
    }
}

impl From<ProtocolFault> for OsciError {
    fn from(f: ProtocolFault) -> Self {
        OsciError::Fault(f)
    }
}
