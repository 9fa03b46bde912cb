// system-tests/src/error.rs
// ============================================================================
// Module: Reference SDK Errors
// Description: Error type shared by the reference SDK components.
// Purpose: Surface transport and protocol failures to scenario code.
// Dependencies: thiserror
// ============================================================================

//! Error type shared by the reference SDK components.

use thiserror::Error;

/// Reference SDK errors.
#[derive(Debug, Error)]
pub enum SdkError {
    /// HTTP transport failed.
    #[error("http error: {0}")]
    Http(String),
    /// The service answered with a non-success status.
    #[error("unexpected status {status} from {url}")]
    Status {
        /// Requested URL.
        url: String,
        /// Response status code.
        status: u16,
    },
    /// A payload did not match the protocol.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// A request body could not be encoded.
    #[error("encode error: {0}")]
    Encode(String),
}

impl From<reqwest::Error> for SdkError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}
