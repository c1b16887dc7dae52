//! Fault taxonomy for the drive channel and keyword dispatch.

use thiserror::Error;

/// Errors surfaced by the drive client and the keyword library.
///
/// Only two cases are ever recovered locally: a busy session on open (closed
/// and retried once) and a missing session on close (logged). Everything
/// else propagates to the caller.
#[derive(Debug, Error)]
pub enum DriveError {
    /// The engine endpoint could not be reached at all.
    #[error("failed connecting to the engine at {endpoint} - check it's running in drive mode")]
    Unreachable { endpoint: String },

    /// A structured fault response from the engine.
    #[error("engine fault {code}: {message}")]
    Fault { code: i32, message: String },

    /// A script ran and reported a non-Success status.
    #[error("{0}")]
    Execution(String),

    /// A script keyword failed; carries the keyword name with the engine message.
    #[error("{0}")]
    Keyword(String),

    /// The response could not be decoded as a wire envelope.
    #[error("malformed response: {0}")]
    Envelope(String),

    /// A keyword was called with arguments it cannot accept.
    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DriveError {
    /// True for engine faults whose message contains `needle`.
    ///
    /// The engine reports conditions like a busy session only through the
    /// fault message text, so call sites match on substrings.
    pub fn fault_contains(&self, needle: &str) -> bool {
        matches!(self, DriveError::Fault { message, .. } if message.contains(needle))
    }
}

pub type Result<T> = std::result::Result<T, DriveError>;
