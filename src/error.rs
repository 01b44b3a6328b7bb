//! Error taxonomy shared by every decoder in the crate.
//!
//! Tile and frame decoders report "unavailable" as `None`; parsers that
//! produce whole documents return `Result<_, DecodeError>`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    /// The buffer is shorter than a size the format fixes up front.
    #[error("{what}: expected at least {expected} bytes, got {actual}")]
    TruncatedInput {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A codec, block type or layout the decoder recognises but cannot handle.
    #[error("unsupported variant: {0}")]
    UnsupportedVariant(String),

    /// A computed read would land past the end of the buffer.
    #[error("{what}: read at offset {offset} exceeds buffer length {len}")]
    BoundsViolation {
        what: &'static str,
        offset: usize,
        len: usize,
    },

    /// Well-sized data whose contents make no sense (bad magic, zero width).
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl DecodeError {
    pub fn truncated(what: &'static str, expected: usize, actual: usize) -> Self {
        DecodeError::TruncatedInput {
            what,
            expected,
            actual,
        }
    }

    /// Truncation and bounds violations are handled the same way by callers.
    pub fn is_truncation(&self) -> bool {
        matches!(
            self,
            DecodeError::TruncatedInput { .. } | DecodeError::BoundsViolation { .. }
        )
    }
}
