//! Common Utilities and Types Library
//!
//! This crate provides shared LTE types and bit utilities used across the eNodeB uplink implementation.

pub mod types;
pub mod utils;

// Re-export commonly used items
pub use types::*;
pub use utils::*;
