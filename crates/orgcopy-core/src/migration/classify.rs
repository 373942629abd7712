//! Classification of rejected create calls by status code.

use std::collections::BTreeSet;

use crate::store::RemoteError;

/// Status codes meaning the caller lacks access to the record or a record it references.
pub const PERMISSION_CODES: &[&str] = &[
    "INSUFFICIENT_ACCESS_ON_CROSS_REFERENCE_ENTITY",
    "INSUFFICIENT_ACCESS_OR_READONLY",
    "INSUFFICIENT_ACCESS",
];

/// Status codes meaning a record with the same unique key already exists.
pub const DUPLICATE_CODES: &[&str] = &[
    "DUPLICATE_VALUE",
    "DUPLICATES_DETECTED",
    "DUPLICATE_EXTERNAL_ID",
];

/// What a rejected create means for the retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Named fields were refused; drop them and retry.
    Validation {
        /// Offending fields.
        fields: BTreeSet<String>,
    },
    /// Access was denied; stop retrying this record.
    PermissionDenied {
        /// Status code.
        code: String,
        /// Message.
        message: String,
    },
    /// The record already exists; resolve it by natural key.
    Duplicate {
        /// Message.
        message: String,
    },
    /// Anything else; counts as a failed attempt.
    Unclassified {
        /// Status code.
        code: String,
        /// Message.
        message: String,
    },
}

/// Map the error entries of a rejected create to a [`Rejection`].
///
/// Permission errors take precedence over duplicates, which take precedence
/// over field-level errors.
pub fn classify(errors: &[RemoteError]) -> Rejection {
    if let Some(err) = errors
        .iter()
        .find(|e| PERMISSION_CODES.contains(&e.status_code.as_str()))
    {
        return Rejection::PermissionDenied {
            code: err.status_code.clone(),
            message: err.message.clone(),
        };
    }

    if let Some(err) = errors
        .iter()
        .find(|e| DUPLICATE_CODES.contains(&e.status_code.as_str()))
    {
        return Rejection::Duplicate {
            message: err.message.clone(),
        };
    }

    let fields: BTreeSet<String> = errors
        .iter()
        .flat_map(|e| e.fields.iter().cloned())
        .collect();
    if !fields.is_empty() {
        return Rejection::Validation { fields };
    }

    match errors.first() {
        Some(err) => Rejection::Unclassified {
            code: err.status_code.clone(),
            message: err.message.clone(),
        },
        None => Rejection::Unclassified {
            code: "UNKNOWN".to_string(),
            message: "create failed without error details".to_string(),
        },
    }
}
