//! Error types for data parsing in robotooth-types.

use thiserror::Error;

/// Errors that can occur when parsing caller-supplied data.
///
/// This error type is platform-agnostic and does not include
/// BLE-specific errors (those belong in robotooth-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// Payload contained no bytes.
    #[error("Payload is empty")]
    EmptyPayload,

    /// Hex payload had an odd number of digits.
    #[error("Hex payload has an odd number of digits ({0})")]
    OddLength(usize),

    /// A character that is not a hex digit was found.
    #[error("Invalid hex digit '{character}' at position {position}")]
    InvalidHexDigit {
        /// The offending character.
        character: char,
        /// Position within the cleaned-up input.
        position: usize,
    },

    /// Peripheral identifier was blank.
    #[error("Peripheral identifier must not be empty")]
    EmptyIdentifier,
}

/// Result type alias using robotooth-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
