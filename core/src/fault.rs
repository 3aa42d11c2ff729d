//! Protocol fault codes and the text lookup used to render them.
//!
//! Codes travel on the wire (feedback entries, SOAP fault detail) as plain
//! decimal strings; the human-readable text is resolved locally through a
//! [`TextResources`] implementation so deployments can localize it.

use std::collections::HashMap;
use std::fmt;

use num_enum::TryFromPrimitive;

/// 9000-series fault codes.
#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, TryFromPrimitive)]
pub enum FaultCode {
    Unspecified           = 9000,
    DecryptionFailed      = 9100,
    NoMatchingPrivateKey  = 9101,
    UnsupportedAlgorithm  = 9102,
    UnencryptedResponse   = 9103,
    SignatureInvalid      = 9200,
    MessageMalformed      = 9400,
    DuplicateHeader       = 9401,
    MissingId             = 9402,
    DuplicateId           = 9403,
    AttachmentUnmatched   = 9404,
    AttachmentMissing     = 9405,
    UnknownMessageType    = 9406,
    DialogMismatch        = 9500,
    ConversationUnknown   = 9501,
    SequenceNumberInvalid = 9502,
}

impl FaultCode {
    pub fn as_str(&self) -> String {
        (*self as u16).to_string()
    }

    /// Parse a wire code; unknown numeric codes map to `Unspecified`.
    pub fn parse(raw: &str) -> Option<Self> {
        let n: u16 = raw.trim().parse().ok()?;
        Some(FaultCode::try_from(n).unwrap_or(FaultCode::Unspecified))
    }
}

impl fmt::Display for FaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u16)
    }
}

/// Lookup of human-readable fault strings keyed by code.
pub trait TextResources: Send + Sync {
    fn lookup(&self, code: &str) -> Option<&str>;

    fn describe(&self, code: &str) -> String {
        match self.lookup(code) {
            Some(text) => text.to_string(),
            None => format!("unknown fault code {}", code),
        }
    }
}

/// English default table.
#[derive(Debug, Clone)]
pub struct DefaultTextResources {
    texts: HashMap<String, String>,
}

impl Default for DefaultTextResources {
    fn default() -> Self {
        use FaultCode::*;
        let table: &[(FaultCode, &str)] = &[
            (Unspecified, "unspecified processing error"),
            (DecryptionFailed, "message could not be decrypted"),
            (NoMatchingPrivateKey, "no private key matches the recipient certificate"),
            (UnsupportedAlgorithm, "unsupported cryptographic algorithm"),
            (UnencryptedResponse, "response to an encrypted request arrived unencrypted"),
            (SignatureInvalid, "signature verification failed"),
            (MessageMalformed, "message is not well formed"),
            (DuplicateHeader, "header element occurs more than once"),
            (MissingId, "mandatory Id attribute missing"),
            (DuplicateId, "Id attribute value is not unique"),
            (AttachmentUnmatched, "MIME part does not match any declared attachment"),
            (AttachmentMissing, "declared attachment not present"),
            (UnknownMessageType, "unknown message type"),
            (DialogMismatch, "challenge/response mismatch"),
            (ConversationUnknown, "conversation id missing or unknown"),
            (SequenceNumberInvalid, "sequence number out of order"),
        ];
        let texts = table
            .iter()
            .map(|(code, text)| (code.as_str(), text.to_string()))
            .collect();
        Self { texts }
    }
}

impl DefaultTextResources {
    /// Override or add a text.
    pub fn insert(&mut self, code: impl Into<String>, text: impl Into<String>) {
        self.texts.insert(code.into(), text.into());
    }
}

impl TextResources for DefaultTextResources {
    fn lookup(&self, code: &str) -> Option<&str> {
        self.texts.get(code).map(String::as_str)
    }
}

/// A structurally valid fault returned by a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolFault {
    /// SOAP fault code (`soap:Client`, `soap:Server`).
    pub fault_code: String,
    /// OSCI code from the fault detail.
    pub code: String,
    pub message: String,
}

impl fmt::Display for ProtocolFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.fault_code, self.code, self.message)
    }
}

impl std::error::Error for ProtocolFault {}
