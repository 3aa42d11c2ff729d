//! Transport confidentiality: the two-part encrypted envelope and the
//! streaming cipher underneath it.

pub mod decrypt;
pub mod encrypt;
pub mod stream;

pub use decrypt::{cipher_from_uri, DecryptContext};
pub use encrypt::{encrypt_message, encrypt_to_bytes};
pub use stream::{decrypt_to_vec, encrypt_to_vec, DecryptingReader, EncryptingWriter};
