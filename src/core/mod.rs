//! Core types and errors for the training core

pub mod error;
pub mod types;

pub use self::error::*;
pub use self::types::*;
