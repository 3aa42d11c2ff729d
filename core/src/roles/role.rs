//! Roles taking part in an exchange and the signer/decrypter seam.
//!
//! Private keys never leave a `Signer`/`Decrypter` implementation; the codec
//! only sees certificates and calls `sign`/`unwrap_key`.

use std::fmt;

use zeroize::Zeroizing;

use crate::constants::alg_uris;
use crate::crypto::types::CryptoError;
use crate::crypto::WrappedKey;
use crate::roles::certificate::Certificate;

/// Position of a role relative to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleKind {
    Originator,
    Addressee,
    Intermediary,
    Author,
    Reader,
}

impl RoleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleKind::Originator => "Originator",
            RoleKind::Addressee => "Addressee",
            RoleKind::Intermediary => "Intermediary",
            RoleKind::Author => "OtherAuthor",
            RoleKind::Reader => "OtherReader",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Originator" => Some(RoleKind::Originator),
            "Addressee" => Some(RoleKind::Addressee),
            "Intermediary" => Some(RoleKind::Intermediary),
            "OtherAuthor" => Some(RoleKind::Author),
            "OtherReader" => Some(RoleKind::Reader),
            _ => None,
        }
    }
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A party referenced by a message, known through its certificates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub kind: RoleKind,
    pub cipher_certificate: Option<Certificate>,
    pub signature_certificate: Option<Certificate>,
}

impl Role {
    pub fn new(kind: RoleKind) -> Self {
        Self { kind, cipher_certificate: None, signature_certificate: None }
    }

    pub fn with_cipher_certificate(mut self, cert: Certificate) -> Self {
        self.cipher_certificate = Some(cert);
        self
    }

    pub fn with_signature_certificate(mut self, cert: Certificate) -> Self {
        self.signature_certificate = Some(cert);
        self
    }

    pub fn has_certificates(&self) -> bool {
        self.cipher_certificate.is_some() || self.signature_certificate.is_some()
    }
}

/// Produces enveloped signatures.
pub trait Signer: Send + Sync {
    fn signing_certificate(&self) -> &Certificate;

    /// Sign the canonical SignedInfo bytes.
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError>;

    fn signature_algorithm(&self) -> &'static str {
        alg_uris::ED25519
    }
}

/// Recovers content-encryption keys wrapped for its cipher certificate.
pub trait Decrypter: Send + Sync {
    fn cipher_certificate(&self) -> &Certificate;

    fn unwrap_key(&self, wrapped: &WrappedKey) -> Result<Zeroizing<Vec<u8>>, CryptoError>;
}
