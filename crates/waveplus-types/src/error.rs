//! Error types for data parsing in waveplus-types.

use thiserror::Error;

/// Errors that can occur when decoding Wave Plus wire data.
///
/// This error type is platform-agnostic and does not include
/// BLE-specific errors (those belong in waveplus-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// A fixed-size payload had the wrong length.
    #[error("Invalid payload length: expected exactly {expected} bytes, got {actual}")]
    InvalidLength {
        /// Required payload size.
        expected: usize,
        /// Actual payload size received.
        actual: usize,
    },

    /// A payload was too short to contain the required fields.
    #[error("Insufficient bytes: requires {expected} bytes, got {actual}")]
    InsufficientBytes {
        /// Minimum payload size.
        expected: usize,
        /// Actual payload size received.
        actual: usize,
    },
}

/// Result type alias using waveplus-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
