pub mod certificate;
pub mod identity;
pub mod role;

pub use certificate::*;
pub use identity::*;
pub use role::*;
