//! Error types for pipe operations.

use std::fmt;

/// Category of a pipe error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The peer can no longer receive what is written.
    BrokenPipe,
    /// The operation targets a shut direction or a closed channel.
    Closed,
    /// The worker no longer accepts pipes or tasks.
    WorkerShutdown,
    /// A listener or task panicked.
    ListenerPanic,
    /// The worker threads could not be created.
    Io,
}

/// Error returned by pipe, channel and worker operations.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    context: Option<String>,
}

impl Error {
    /// Creates an error without context.
    pub fn new(kind: ErrorKind) -> Self {
        Error {
            kind,
            context: None,
        }
    }

    /// Creates an error with a context message.
    pub fn with_context(kind: ErrorKind, context: impl Into<String>) -> Self {
        Error {
            kind,
            context: Some(context.into()),
        }
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the context message, if any.
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// True for failures that a socket-backed channel would report as an I/O error.
    pub fn is_io(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::BrokenPipe | ErrorKind::Closed | ErrorKind::WorkerShutdown | ErrorKind::Io
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ErrorKind::BrokenPipe => write!(f, "Broken pipe")?,
            ErrorKind::Closed => write!(f, "Channel closed")?,
            ErrorKind::WorkerShutdown => write!(f, "Worker is shut down")?,
            ErrorKind::ListenerPanic => write!(f, "Listener panicked")?,
            ErrorKind::Io => write!(f, "I/O error")?,
        }
        if let Some(context) = &self.context {
            write!(f, ": {}", context)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::with_context(ErrorKind::Io, err.to_string())
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> std::io::Error {
        let kind = match err.kind {
            ErrorKind::BrokenPipe => std::io::ErrorKind::BrokenPipe,
            ErrorKind::Closed => std::io::ErrorKind::NotConnected,
            _ => std::io::ErrorKind::Other,
        };
        std::io::Error::new(kind, err)
    }
}

/// Result type for pipe operations.
pub type Result<T> = core::result::Result<T, Error>;
