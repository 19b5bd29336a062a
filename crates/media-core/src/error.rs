use thiserror::Error;

/// A type alias for handling `Result`s with `Error`
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the media plane
#[derive(Error, Debug)]
pub enum Error {
    /// No codec in the manager matches the descriptor
    #[error("No codec for descriptor {0}")]
    NoCodec(String),

    /// The capability intersection with an offer is empty
    #[error("Capability mismatch: {0}")]
    CapabilityMismatch(String),

    /// The context has no free termination slot
    #[error("Context {0} is full")]
    ContextFull(String),

    /// The referenced context does not exist
    #[error("Unknown context {0}")]
    UnknownContext(u64),

    /// The referenced termination does not exist
    #[error("Unknown termination {0}")]
    UnknownTermination(u64),

    /// Stream open/close or frame processing failure
    #[error("Stream error: {0}")]
    Stream(String),

    /// File termination I/O failure
    #[error("I/O error: {0}")]
    Io(String),

    /// Engine request could not be queued or answered
    #[error("Engine error: {0}")]
    Engine(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}
