//! Enveloped signatures over composed parts and attachments.

pub mod signed_info;
pub mod signer;
pub mod verifier;

pub use signed_info::*;
pub use signer::sign;
pub use verifier::verify_signature;
