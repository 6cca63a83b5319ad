//! Shared error type across naimlink crates.

use thiserror::Error;

/// Stable error category codes (used in logs and tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid configuration (address, ranges, yaml).
    Config,
    /// Socket-level failure or end-of-stream.
    Transport,
    /// Malformed outer element.
    Frame,
    /// Typed value could not be decoded (base64, int, utf-8).
    Decode,
    /// Inner line carries fewer tokens than its handler needs.
    Arity,
    /// Inner token present but not acceptable (range, number).
    InvalidValue,
    /// No open connection to write to.
    NotConnected,
    /// Client already started / already stopped.
    Lifecycle,
    /// Internal error.
    Internal,
}

impl ErrorKind {
    /// String representation used in logs and test vectors.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Config => "CONFIG",
            ErrorKind::Transport => "TRANSPORT",
            ErrorKind::Frame => "FRAME",
            ErrorKind::Decode => "DECODE",
            ErrorKind::Arity => "ARITY",
            ErrorKind::InvalidValue => "INVALID_VALUE",
            ErrorKind::NotConnected => "NOT_CONNECTED",
            ErrorKind::Lifecycle => "LIFECYCLE",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, NaimError>;

/// Unified error type used by core and client.
#[derive(Debug, Error)]
pub enum NaimError {
    #[error("config: {0}")]
    Config(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("frame: {0}")]
    Frame(String),
    #[error("decode: {0}")]
    Decode(String),
    #[error("{command}: expected at least {expected} tokens, got {got}")]
    Arity {
        command: String,
        expected: usize,
        got: usize,
    },
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("not connected")]
    NotConnected,
    #[error("lifecycle: {0}")]
    Lifecycle(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl NaimError {
    /// Map error to its stable category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            NaimError::Config(_) => ErrorKind::Config,
            NaimError::Transport(_) => ErrorKind::Transport,
            NaimError::Frame(_) => ErrorKind::Frame,
            NaimError::Decode(_) => ErrorKind::Decode,
            NaimError::Arity { .. } => ErrorKind::Arity,
            NaimError::InvalidValue(_) => ErrorKind::InvalidValue,
            NaimError::NotConnected => ErrorKind::NotConnected,
            NaimError::Lifecycle(_) => ErrorKind::Lifecycle,
            NaimError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<std::io::Error> for NaimError {
    fn from(e: std::io::Error) -> Self {
        NaimError::Transport(e.to_string())
    }
}
