pub mod headers;
pub mod reader;
pub mod transfer;
pub mod writer;

pub use headers::*;
pub use reader::*;
pub use transfer::*;
pub use writer::*;
