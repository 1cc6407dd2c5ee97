//! Shared types for the fleet session services

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
