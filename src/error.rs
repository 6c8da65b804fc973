use std::io;

use thiserror::Error;

use crate::types::CompletionCode;

/// Result type used across this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (socket, OS, etc.).
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// No response arrived within the per-attempt timeout, across all attempts.
    #[error("timeout waiting for response")]
    Timeout,

    /// Invalid caller-supplied argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// A received message is truncated, malformed, or not the one expected.
    #[error("message error: {0}")]
    Message(&'static str),

    /// A received message is truncated, malformed, or not the one expected.
    #[error("message error: {0}")]
    MessageOwned(String),

    /// Authentication or integrity verification failed.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(&'static str),

    /// Cryptographic failure (invalid key sizes, decrypt failure, etc.).
    #[error("crypto error: {0}")]
    Crypto(&'static str),

    /// Unsupported configuration or protocol feature.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    /// An IPMI command completed with a non-zero completion code.
    #[error("command {name}({code:#04x}) failed: {completion}")]
    Command {
        /// Display name of the originating command.
        name: String,
        /// Command number of the originating command.
        code: u8,
        /// Completion code returned by the BMC.
        completion: CompletionCode,
    },
}

impl Error {
    pub(crate) fn message_owned(msg: impl Into<String>) -> Self {
        Self::MessageOwned(msg.into())
    }

    /// The completion code of a failed command, if this is a command error.
    pub fn completion_code(&self) -> Option<CompletionCode> {
        match self {
            Self::Command { completion, .. } => Some(*completion),
            _ => None,
        }
    }
}
