use thiserror::Error;

/// A type alias for handling `Result`s with `Error`
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the MRCPv2 connection agent
#[derive(Error, Debug)]
pub enum Error {
    /// Agent command channel is full or closed
    #[error("Failed to signal agent command: {0}")]
    SignalFailed(String),

    /// TCP connect, bind or socket option failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// Message could not be generated for the wire
    #[error("Codec error: {0}")]
    Codec(#[from] rspeech_mrcp_core::Error),

    /// Socket send failure
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Input/output error
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}
