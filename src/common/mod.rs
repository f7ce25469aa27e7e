pub mod anchor;
pub mod spl;
pub mod types;

pub use types::*;
