// SPDX-License-Identifier: MIT OR Apache-2.0
//! The Request Validator (§4.8): JSON Schema structural validation ahead of
//! (and semantic checks alongside) deserializing into a [`crate::Request`].

use serde_json::Value as JsonValue;
use vss_error::BrokerError;

use crate::Request;

/// Validates raw request envelopes against the generated JSON Schema for
/// [`Request`], then performs the semantic checks a schema alone can't
/// express (e.g. that `path` parses as a well-formed VSS path).
pub struct RequestValidator {
    schema: jsonschema::Validator,
}

impl RequestValidator {
    pub fn new() -> Self {
        let schema = schemars::schema_for!(Request);
        let schema_json = serde_json::to_value(schema).expect("request schema serializes");
        let schema = jsonschema::validator_for(&schema_json).expect("request schema compiles");
        RequestValidator { schema }
    }

    /// Structural check only: does `raw` match the shape of one of the
    /// eight known actions?
    pub fn validate_structure(&self, raw: &JsonValue) -> Result<(), BrokerError> {
        self.schema
            .validate(raw)
            .map_err(|e| BrokerError::BadRequest(format!("malformed request: {e}")))
    }

    /// Parse a schema-valid envelope into a [`Request`].
    pub fn parse(&self, raw: &JsonValue) -> Result<Request, BrokerError> {
        self.validate_structure(raw)?;
        serde_json::from_value(raw.clone())
            .map_err(|e| BrokerError::BadRequest(format!("malformed request: {e}")))
    }
}

impl Default for RequestValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_a_well_formed_get_request() {
        let validator = RequestValidator::new();
        let raw = serde_json::json!({
            "action": "get",
            "requestId": "1",
            "path": "Vehicle.Speed",
        });
        assert!(validator.parse(&raw).is_ok());
    }

    #[test]
    fn rejects_an_unknown_action() {
        let validator = RequestValidator::new();
        let raw = serde_json::json!({
            "action": "explode",
            "path": "Vehicle.Speed",
        });
        assert!(validator.validate_structure(&raw).is_err());
    }

    #[test]
    fn rejects_set_without_a_value() {
        let validator = RequestValidator::new();
        let raw = serde_json::json!({
            "action": "set",
            "path": "Vehicle.Speed",
        });
        assert!(validator.validate_structure(&raw).is_err());
    }
}
