use thiserror::Error;

/// A type alias for handling `Result`s with `Error`
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the shared infrastructure
#[derive(Error, Debug)]
pub enum Error {
    /// Task has already been started
    #[error("Task already started: {0}")]
    AlreadyStarted(String),

    /// Task has not been started yet
    #[error("Task not started: {0}")]
    NotStarted(String),

    /// Task inbox is full or closed
    #[error("Failed to signal task message: {0}")]
    SignalFailed(String),

    /// Worker task panicked or was aborted before joining
    #[error("Task join error: {0}")]
    JoinError(String),

    /// Logging subsystem initialization failed
    #[error("Logging setup error: {0}")]
    LoggingSetup(String),
}
