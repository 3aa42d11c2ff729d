pub mod builder;
pub mod content;
pub mod dialog;
pub mod encrypted;
pub mod headers;
pub mod kind;
#[allow(clippy::module_inception)]
pub mod message;
pub mod parts;
pub mod process_card;

pub use builder::MessageBuilder;
pub use content::*;
pub use dialog::*;
pub use encrypted::*;
pub use headers::*;
pub use kind::MessageKind;
pub use message::{MessageState, OsciMessage};
pub use parts::*;
pub use process_card::*;
