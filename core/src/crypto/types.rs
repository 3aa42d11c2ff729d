// ## 📂 File: `src/crypto/types.rs`

use std::fmt;

/// Content-encryption key lengths.
pub const KEY_LEN_16: usize = 16;
pub const KEY_LEN_32: usize = 32;

/// Fixed AEAD tag length (bytes).
pub const TAG_LEN: usize = 16;

/// X25519 public key / shared secret length.
pub const X25519_LEN: usize = 32;

/// Ed25519 signature length.
pub const ED25519_SIG_LEN: usize = 64;

#[derive(Debug)]
pub enum CryptoError {
    /// Unsupported symmetric cipher identifier.
    UnsupportedCipher { uri: String },

    /// Unsupported key transport identifier.
    UnsupportedKeyTransport { uri: String },

    /// Invalid key length provided to cipher.
    InvalidKeyLen { expected: usize, actual: usize },

    /// Nonce length not accepted by the selected cipher.
    InvalidNonceLen { expected: usize, actual: usize },

    /// AEAD tag mismatch (authentication failure).
    TagMismatch,

    /// Certificate lacks the public key needed for the operation.
    MissingPublicKey(&'static str),

    /// Signature bytes malformed or not valid for the key.
    BadSignature,

    /// Ciphertext stream ended before its terminator frame.
    Truncated,

    /// General runtime error with context.
    Failure(String),
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use CryptoError::*;
        match self {
            UnsupportedCipher { uri } =>
                write!(f, "unsupported cipher: {}", uri),
            UnsupportedKeyTransport { uri } =>
                write!(f, "unsupported key transport: {}", uri),
            InvalidKeyLen { expected, actual } =>
                write!(f, "invalid key length: expected={}, actual={}", expected, actual),
            InvalidNonceLen { expected, actual } =>
                write!(f, "invalid nonce length: expected={}, actual={}", expected, actual),
            TagMismatch =>
                write!(f, "AEAD tag mismatch"),
            MissingPublicKey(which) =>
                write!(f, "certificate has no {} key", which),
            BadSignature =>
                write!(f, "signature value rejected"),
            Truncated =>
                write!(f, "ciphertext stream truncated"),
            Failure(msg) =>
                write!(f, "crypto failure: {}", msg),
        }
    }
}

impl std::error::Error for CryptoError {}

/// Digest-related errors.
#[derive(Debug)]
pub enum DigestError {
    UnknownAlgorithm(String),
    InvalidEncoding(String),
}

impl fmt::Display for DigestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DigestError::UnknownAlgorithm(uri) => write!(f, "unknown digest algorithm: {}", uri),
            DigestError::InvalidEncoding(msg) => write!(f, "invalid digest value: {}", msg),
        }
    }
}

impl std::error::Error for DigestError {}
