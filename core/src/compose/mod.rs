//! Outbound direction: part composition and MIME serialization.

pub mod composer;
pub mod serializer;

pub use composer::compose;
pub use serializer::{serialize, to_bytes, write_message, OCTET_STREAM, XML_CONTENT_TYPE};
