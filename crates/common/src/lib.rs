//! Shared types for the dispatch client workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
