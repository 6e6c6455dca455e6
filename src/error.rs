use std::io;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a single line transform.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("invalid escape sequence {sequence:?} at offset {position}")]
    InvalidEscape { position: usize, sequence: String },

    #[error("transform failed: {0}")]
    Failed(String),
}

impl TransformError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Errors surfaced to the consumer of a [`StreamingPipe`](crate::StreamingPipe).
///
/// The type is `Clone` because a failed pipe hands the same error back on
/// every subsequent read.
#[derive(Error, Debug, Clone)]
pub enum PipeError {
    #[error("source read failed: {0}")]
    SourceRead(#[source] Arc<io::Error>),

    #[error("transform failed on line {line}: {source}")]
    Transform {
        line: usize,
        #[source]
        source: TransformError,
    },

    #[error("timed out after {0:?} waiting for the next line")]
    Timeout(Duration),

    #[error("producer stopped without signalling end of stream: {0}")]
    ProducerAborted(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl PipeError {
    pub fn source_read(err: io::Error) -> Self {
        Self::SourceRead(Arc::new(err))
    }

    /// Whether this error leaves the pipe usable for another read.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PipeError::Timeout(_))
    }
}

impl From<io::Error> for PipeError {
    fn from(err: io::Error) -> Self {
        Self::source_read(err)
    }
}

impl From<PipeError> for io::Error {
    fn from(err: PipeError) -> Self {
        match err {
            PipeError::SourceRead(inner) => io::Error::new(inner.kind(), PipeError::SourceRead(inner)),
            PipeError::Timeout(_) => io::Error::new(io::ErrorKind::TimedOut, err),
            PipeError::Config(_) => io::Error::new(io::ErrorKind::InvalidInput, err),
            other => io::Error::other(other),
        }
    }
}

pub type TransformResult<T> = std::result::Result<T, TransformError>;
pub type Result<T> = std::result::Result<T, PipeError>;
