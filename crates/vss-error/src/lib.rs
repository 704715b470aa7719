// SPDX-License-Identifier: MIT OR Apache-2.0
//! Unified error taxonomy for the VSS signal broker.
//!
//! Every fallible operation in `vss-tree`, `vss-auth`, `vss-subscriptions`,
//! and `vss-protocol` returns `Result<T, BrokerError>`. The Request Processor
//! (`vss-broker`) is the only place that translates a `BrokerError` into the
//! wire error envelope; library crates never format HTTP-style responses
//! themselves.

#![deny(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A classified broker failure.
///
/// Each variant maps to exactly one `(number, reason)` pair in the wire
/// error envelope via [`BrokerError::code`] and [`BrokerError::reason`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// A path string could not be parsed (empty segment, unbalanced separators).
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The query resolved to no nodes at all.
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// The query resolved to a node that cannot be read (branch, or wrong kind).
    #[error("not readable: {0}")]
    NotReadable(String),

    /// The query resolved to a node that cannot be written (branch, sensor, attribute).
    #[error("forbidden: only sensor or actuator leaves can be set ({0})")]
    NotWritable(String),

    /// `targetValue` was requested on a leaf kind that does not support it.
    #[error("forbidden: only actuator leaves carry a targetValue ({path})")]
    NotAttributable {
        /// The offending path.
        path: String,
    },

    /// A value failed the leaf's numeric range, width, or `allowed`-set check.
    #[error("out of bound: {0}")]
    OutOfBounds(String),

    /// A value could not be coerced to the leaf's declared datatype.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// A leaf declared a datatype tag the checker does not recognise.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// The session's permission map does not grant the requested access.
    #[error("no permission: {0}")]
    NoPermission(String),

    /// The leaf is readable but was never written and has no default.
    #[error("unavailable data: {0}")]
    UnavailableData(String),

    /// Token signature, expiry, or decoding failed.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The request failed JSON-Schema validation or was otherwise malformed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An unclassified internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BrokerError {
    /// HTTP-style status code string carried in the wire error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidPath(_) | Self::BadRequest(_) | Self::OutOfBounds(_) | Self::TypeMismatch(_) => "400",
            Self::InvalidToken(_) => "401",
            Self::NotWritable(_) | Self::NotAttributable { .. } | Self::NoPermission(_) => "403",
            Self::PathNotFound(_) | Self::NotReadable(_) | Self::UnavailableData(_) => "404",
            Self::UnsupportedType(_) | Self::Internal(_) => "500",
        }
    }

    /// Short slug describing the error family, as echoed in the envelope's `reason`.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidPath(_) | Self::BadRequest(_) => "Bad Request",
            Self::InvalidToken(_) => "Invalid Token",
            Self::NotWritable(_) | Self::NotAttributable { .. } | Self::NoPermission(_) => "Forbidden",
            Self::PathNotFound(_) | Self::NotReadable(_) => "Path not found",
            Self::UnavailableData(_) => "unavailable_data",
            Self::OutOfBounds(_) => "out_of_bounds",
            Self::TypeMismatch(_) => "type_mismatch",
            Self::UnsupportedType(_) | Self::Internal(_) => "Internal Server Error",
        }
    }
}

/// Serializable snapshot of a [`BrokerError`]'s wire-relevant fields.
///
/// Kept separate from `BrokerError` itself so that library crates are free
/// to add variants without breaking the wire contract; `vss-protocol`
/// constructs this explicitly at the response boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorParts {
    /// HTTP-style status code, e.g. `"404"`.
    pub number: String,
    /// Short slug, e.g. `"Path not found"`.
    pub reason: String,
    /// Human-readable explanation.
    pub message: String,
}

impl From<&BrokerError> for ErrorParts {
    fn from(err: &BrokerError) -> Self {
        Self {
            number: err.code().to_string(),
            reason: err.reason().to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_data_maps_to_404() {
        let err = BrokerError::UnavailableData("Vehicle/Speed".into());
        assert_eq!(err.code(), "404");
        assert_eq!(err.reason(), "unavailable_data");
        assert!(err.to_string().contains("Vehicle/Speed"));
    }

    #[test]
    fn forbidden_variants_map_to_403() {
        assert_eq!(BrokerError::NotWritable("x".into()).code(), "403");
        assert_eq!(
            BrokerError::NotAttributable { path: "x".into() }.code(),
            "403"
        );
        assert_eq!(BrokerError::NoPermission("x".into()).code(), "403");
    }

    #[test]
    fn error_parts_round_trip_into_json_shape() {
        let err = BrokerError::PathNotFound("Vehicle/Unknown".into());
        let parts = ErrorParts::from(&err);
        assert_eq!(parts.number, "404");
        assert_eq!(parts.reason, "Path not found");
        let v = serde_json::to_value(&parts).unwrap();
        assert_eq!(v["number"], "404");
    }
}
