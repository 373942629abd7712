//! Core error types.

use thiserror::Error;

/// Errors raised by a [`Store`](crate::store::Store) collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store has no object type with this name.
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// The query string could not be parsed or references unknown fields.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The store answered with an error of its own.
    #[error("remote error {code}: {message}")]
    Remote {
        /// Error code reported by the store.
        code: String,
        /// Human-readable message.
        message: String,
    },

    /// The request never produced a usable answer (transport, timeout, auth).
    #[error("request failed: {0}")]
    Request(String),

    /// The response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}
