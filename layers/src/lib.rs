//! Protocol Stack Layers Library
//!
//! This crate implements the LTE uplink physical layer processing according to 3GPP TS 36.211/36.212.

pub mod phy;

use thiserror::Error;

/// Common errors for protocol layers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayerError {
    /// Argument out of range, capacity exceeded or RNTI not bound
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Context or sub-engine could not be built
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Resource mapping produced a different symbol count than the allocation implies
    #[error("Size mismatch: expected {expected} symbols, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Transport block failed its integrity check
    #[error("Transport block decoding failed: {0}")]
    TransportDecodeFailure(String),
}

impl LayerError {
    /// Whether a retransmission with another redundancy version may succeed
    pub fn is_retransmittable(&self) -> bool {
        matches!(self, LayerError::TransportDecodeFailure(_))
    }
}
