//! Error types for channel identifier parsing.

use thiserror::Error;

/// Errors returned when parsing channel identifiers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelIdError {
    /// Input has the wrong length for the canonical fixed-width form.
    #[error("malformed channel id: expected {expected} characters, got {got}")]
    Length { expected: usize, got: usize },

    /// Input has the right length but an unparsable device id or index.
    #[error("malformed channel id: unparsable segment '{0}'")]
    Format(String),
}
