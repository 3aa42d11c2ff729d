//! osci-core
//!
//! OSCI message codec: compose, sign, serialize, parse, verify, and the
//! transport encryption envelope.
//! Blocking, single pass per message, no global state.

#![forbid(unsafe_code)]

// Shared and top level
pub mod config;
pub mod constants;
pub mod fault;
pub mod types;

// Primitives
pub mod crypto;
pub mod roles;
pub mod telemetry;

// Wire layers
pub mod mime;
pub mod xml;

// Messages
pub mod compose;
pub mod envelope;
pub mod message;
pub mod parser;
pub mod signature;

pub use config::OsciConfig;
pub use types::{OsciError, Result};

// -----------------------------------------------------------------------------
// Prelude (Rust users)
// -----------------------------------------------------------------------------
pub mod prelude {
    pub use crate::compose::{compose, serialize, to_bytes, write_message};
    pub use crate::config::OsciConfig;
    pub use crate::envelope::{encrypt_message, encrypt_to_bytes, DecryptContext};
    pub use crate::fault::{DefaultTextResources, FaultCode, ProtocolFault, TextResources};
    pub use crate::message::{
        Attachment, ContentContainer, DialogState, EncryptedData, MessageBuilder, MessageKind, MessageState,
        OsciMessage,
    };
    pub use crate::parser::{from_bytes, parse_message, ParseOptions};
    pub use crate::roles::{Certificate, Decrypter, LocalIdentity, Role, RoleKind, Signer};
    pub use crate::signature::sign;
    pub use crate::types::{OsciError, Result};
}
