//! Error types for the media-relay library.

use thiserror::Error;

/// Errors raised by the metadata extraction service.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The origin demanded a login or presented an anti-automation challenge.
    #[error(
        "the origin refused to serve this item without a login.\n\
         It is protected by a sign-in / anti-bot check; try a normal public \
         link, or configure cookies for the relay."
    )]
    AuthRequired,

    /// Configured credential material (cookies) could not be used.
    #[error("the configured cookies were rejected as malformed; fix or remove them")]
    MalformedCredentials,

    /// Any other extraction failure; the message is passed through verbatim.
    #[error("{0}")]
    Other(String),
}

/// Errors raised when resolving a pending tier selection.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// The key belongs to a different user.
    #[error("this selection belongs to another user")]
    Forbidden,

    /// The key is unknown: expired, already closed, or never issued.
    #[error("session expired, send the link again")]
    NotFound,
}

/// Errors raised by either hop of the streaming relay.
#[derive(Error, Debug)]
pub enum TransferError {
    /// The origin answered HTTP 403. Both plausible causes are surfaced as
    /// guidance; the relay cannot tell them apart.
    #[error(
        "the origin blocked the transfer (HTTP 403).\n\
         This usually means one of:\n\
         \u{2022} an anti-bot / login-required source\n\
         \u{2022} a geo/IP restriction on this server"
    )]
    Forbidden,

    /// The origin answered with a status other than 200.
    #[error("unexpected HTTP status {code} from the origin")]
    UnexpectedStatus {
        /// The status code received.
        code: u16,
    },

    /// The destination rejected the staged file or the push failed mid-way.
    #[error("upload to the destination failed: {0}")]
    UploadFailed(String),

    /// No byte made progress for the configured idle window.
    #[error("transfer stalled: no data received for {idle_secs}s")]
    Timeout {
        /// Length of the idle window that expired, in seconds.
        idle_secs: u64,
    },

    /// The transfer was cancelled before completion.
    #[error("transfer cancelled")]
    Cancelled,

    /// I/O error while writing or reading the staged file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network-level error from the HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Top-level error type covering every stage of a relay operation.
///
/// All variants are recovered at the orchestrator boundary and rendered as a
/// user-facing status message; none should take the serving process down.
#[derive(Error, Debug)]
pub enum Error {
    /// Metadata extraction failed.
    #[error("could not read media info: {0}")]
    Extraction(#[from] ExtractionError),

    /// Selection produced an empty rendition map.
    #[error("no usable quality found for this item")]
    NoUsableRendition,

    /// Session resolution failed.
    #[error("{0}")]
    Session(#[from] SessionError),

    /// A transfer hop failed.
    #[error("{0}")]
    Transfer(#[from] TransferError),

    /// I/O error outside of a transfer (working dir setup, cleanup).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),
}

/// A specialized `Result` type for media-relay operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_message_names_both_causes() {
        let msg = TransferError::Forbidden.to_string();
        assert!(msg.contains("anti-bot"));
        assert!(msg.contains("geo/IP"));
    }

    #[test]
    fn unexpected_status_carries_code() {
        let msg = TransferError::UnexpectedStatus { code: 503 }.to_string();
        assert!(msg.contains("503"));
    }

    #[test]
    fn session_errors_are_distinct() {
        assert_ne!(SessionError::Forbidden, SessionError::NotFound);
    }

    #[test]
    fn not_found_reads_as_expired_session() {
        assert!(SessionError::NotFound.to_string().contains("expired"));
    }
}
