use thiserror::Error;

/// A type alias for handling `Result`s with `Error`
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in MRCP protocol handling
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed start line
    #[error("Invalid start line: {0}")]
    InvalidStartLine(String),

    /// Unsupported MRCP version token
    #[error("Invalid MRCP version: {0}")]
    InvalidVersion(String),

    /// Malformed or missing channel identifier
    #[error("Invalid channel identifier: {0}")]
    InvalidChannelId(String),

    /// Malformed header field
    #[error("Invalid header field: {0}")]
    InvalidHeader(String),

    /// Header id outside the table bounds or already present
    #[error("Header id {0} rejected by header section")]
    HeaderIdRejected(usize),

    /// Unknown resource name or identifier
    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    /// Method or event name not found in the resource tables
    #[error("Unknown method or event: {0}")]
    UnknownMethod(String),

    /// Message body exceeds the configured limit
    #[error("Body too large: {0} bytes")]
    BodyTooLarge(usize),

    /// Generation output buffer cannot hold the message head
    #[error("Generation buffer too small: need {needed}, have {available}")]
    BufferTooSmall {
        /// Bytes required for the message head
        needed: usize,
        /// Bytes the caller provided
        available: usize,
    },

    /// Message is not in a state the operation expects
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Generic parse error
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<std::num::ParseIntError> for Error {
    fn from(err: std::num::ParseIntError) -> Self {
        Error::ParseError(format!("Failed to parse integer: {}", err))
    }
}

impl<'a> From<nom::Err<nom::error::Error<&'a [u8]>>> for Error {
    fn from(err: nom::Err<nom::error::Error<&'a [u8]>>) -> Self {
        Error::ParseError(format!("Parser error: {:?}", err))
    }
}

impl<'a> From<nom::Err<nom::error::Error<&'a str>>> for Error {
    fn from(err: nom::Err<nom::error::Error<&'a str>>) -> Self {
        Error::ParseError(format!("Parser error: {:?}", err))
    }
}
