//! chwire core - error types and the protocol revision type shared by all crates

mod error;
mod types;

pub use error::*;
pub use types::*;
