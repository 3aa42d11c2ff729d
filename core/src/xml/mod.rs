pub mod canon;
pub mod element;
pub mod events;

pub use canon::*;
pub use element::*;
pub use events::*;
