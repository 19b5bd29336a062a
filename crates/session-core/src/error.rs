use thiserror::Error;

/// A type alias for handling `Result`s with `Error`
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in session coordination
#[derive(Error, Debug)]
pub enum Error {
    /// Session inbox is full or the task is gone
    #[error("Failed to signal session: {0}")]
    SignalFailed(String),

    /// Operation is not legal in the session's current state
    #[error("Invalid session state for {0}")]
    InvalidState(String),

    /// The session has no channel for the resource
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    /// Offer/answer negotiation failed
    #[error("Negotiation failed: {0}")]
    Negotiation(String),

    /// The signalling agent reported a failure
    #[error("Signaling error: {0}")]
    Signaling(String),

    /// Media engine error
    #[error("Media error: {0}")]
    Media(#[from] rspeech_media_core::Error),

    /// Connection agent error
    #[error("Transport error: {0}")]
    Transport(#[from] rspeech_mrcp_transport::Error),

    /// Protocol codec error
    #[error("Protocol error: {0}")]
    Protocol(#[from] rspeech_mrcp_core::Error),
}
