pub mod types;
pub mod aead;
pub mod kdf;
pub mod keywrap;
pub mod nonce;
pub mod digest;

pub use types::*;
pub use aead::*;
pub use kdf::*;
pub use keywrap::*;
pub use nonce::*;
pub use digest::*;
