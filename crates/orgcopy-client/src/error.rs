//! Client error types.

use orgcopy_core::store::RemoteError;
use orgcopy_core::StoreError;
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The HTTP request failed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Login was refused or the login response was unusable.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The API answered with an error status.
    #[error("api error ({status}): {}", describe_errors(.errors))]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error entries from the response body.
        errors: Vec<RemoteError>,
    },

    /// The response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

pub(crate) fn describe_errors(errors: &[RemoteError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.status_code, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<Error> for StoreError {
    fn from(err: Error) -> Self {
        match err {
            Error::Http(e) => StoreError::Request(e.to_string()),
            Error::Auth(message) => StoreError::Request(message),
            Error::Api { status: 404, errors } => StoreError::ObjectNotFound(describe_errors(&errors)),
            Error::Api { errors, status } => match errors.into_iter().next() {
                Some(first) => StoreError::Remote {
                    code: first.status_code,
                    message: first.message,
                },
                None => StoreError::Remote {
                    code: status.to_string(),
                    message: "request failed without error details".to_string(),
                },
            },
            Error::Decode(e) => StoreError::Decode(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_converts_to_remote() {
        let err = Error::Api {
            status: 400,
            errors: vec![RemoteError::new("MALFORMED_QUERY", "unexpected token")],
        };
        assert!(err.to_string().contains("MALFORMED_QUERY: unexpected token"));

        match StoreError::from(err) {
            StoreError::Remote { code, .. } => assert_eq!(code, "MALFORMED_QUERY"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_not_found_converts_to_object_not_found() {
        let err = Error::Api {
            status: 404,
            errors: vec![RemoteError::new("NOT_FOUND", "The requested resource does not exist")],
        };
        assert!(matches!(StoreError::from(err), StoreError::ObjectNotFound(_)));
    }

    #[test]
    fn test_auth_error_is_request_failure() {
        let err = Error::Auth("INVALID_LOGIN: bad password".into());
        assert!(matches!(StoreError::from(err), StoreError::Request(_)));
    }
}
