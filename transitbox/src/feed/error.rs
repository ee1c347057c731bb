//! Error types for feed fetching and decoding.

use thiserror::Error;

/// Failure to retrieve the raw feed payload.
///
/// Fetch failures are never retried immediately: the ingestion loop simply
/// tries again on its next tick.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// The HTTP client could not be constructed.
    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    /// The request could not be sent or timed out.
    #[error("Request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// The response body could not be read.
    #[error("Failed to read response from {url}: {reason}")]
    Body { url: String, reason: String },
}

/// Failure to turn a payload into a [`FeedSnapshot`](super::FeedSnapshot).
///
/// A decode error discards the whole cycle; the registry is left untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    /// The bytes are not a valid encoding of the feed schema.
    #[error("Malformed feed payload: {0}")]
    Malformed(String),

    /// A field the schema requires is absent.
    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },
}

impl From<prost::DecodeError> for DecodeError {
    fn from(e: prost::DecodeError) -> Self {
        DecodeError::Malformed(e.to_string())
    }
}
