//! Common types for the fill simulator workspace

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod events;
pub mod market;
pub mod types;

pub use events::*;
pub use market::*;
pub use types::*;
