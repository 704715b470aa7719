// SPDX-License-Identifier: MIT OR Apache-2.0
//! The JSON request envelope (§6 action catalog).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// One of the eight actions a client may request.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    #[serde(rename = "get")]
    Get {
        request_id: Option<JsonValue>,
        path: String,
        attribute: Option<String>,
    },
    #[serde(rename = "set")]
    Set {
        request_id: Option<JsonValue>,
        path: String,
        value: JsonValue,
        attribute: Option<String>,
    },
    #[serde(rename = "subscribe")]
    Subscribe {
        request_id: Option<JsonValue>,
        path: String,
        attribute: Option<String>,
        filters: Option<JsonValue>,
    },
    #[serde(rename = "unsubscribe")]
    Unsubscribe {
        request_id: Option<JsonValue>,
        subscription_id: String,
    },
    #[serde(rename = "getMetaData")]
    GetMetaData {
        request_id: Option<JsonValue>,
        path: String,
    },
    #[serde(rename = "updateMetaData")]
    UpdateMetaData {
        request_id: Option<JsonValue>,
        path: String,
        metadata: JsonValue,
    },
    #[serde(rename = "updateVSSTree")]
    UpdateVssTree {
        request_id: Option<JsonValue>,
        #[serde(rename = "metadata")]
        tree: JsonValue,
    },
    #[serde(rename = "authorize")]
    Authorize {
        request_id: Option<JsonValue>,
        #[serde(rename = "tokens")]
        token: String,
    },
}

impl Request {
    pub fn request_id(&self) -> Option<&JsonValue> {
        match self {
            Request::Get { request_id, .. }
            | Request::Set { request_id, .. }
            | Request::Subscribe { request_id, .. }
            | Request::Unsubscribe { request_id, .. }
            | Request::GetMetaData { request_id, .. }
            | Request::UpdateMetaData { request_id, .. }
            | Request::UpdateVssTree { request_id, .. }
            | Request::Authorize { request_id, .. } => request_id.as_ref(),
        }
    }

    pub fn action_name(&self) -> &'static str {
        match self {
            Request::Get { .. } => "get",
            Request::Set { .. } => "set",
            Request::Subscribe { .. } => "subscribe",
            Request::Unsubscribe { .. } => "unsubscribe",
            Request::GetMetaData { .. } => "getMetaData",
            Request::UpdateMetaData { .. } => "updateMetaData",
            Request::UpdateVssTree { .. } => "updateVSSTree",
            Request::Authorize { .. } => "authorize",
        }
    }
}

/// Best-effort extraction of the `requestId` field from a raw envelope,
/// for use when schema validation rejects the envelope before it can be
/// deserialized into a [`Request`].
pub fn extract_request_id(raw: &JsonValue) -> Option<JsonValue> {
    raw.get("requestId").cloned()
}

/// Coerce a `requestId` to its wire string form (§ open question: integer
/// request ids are coerced to strings everywhere they are echoed).
pub fn request_id_to_string(raw: &JsonValue) -> Option<String> {
    match raw {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}


#[cfg(test)]
mod boundary_properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Any integer `requestId`, signed or not, coerces to the same
        /// digit string `i128::to_string()` would produce.
        #[test]
        fn integer_request_id_coercion_matches_its_decimal_string(n in any::<i64>()) {
            let coerced = request_id_to_string(&serde_json::json!(n));
            prop_assert_eq!(coerced, Some(n.to_string()));
        }

        /// A string `requestId` always coerces to itself, verbatim.
        #[test]
        fn string_request_id_coercion_is_the_identity(s in "\\PC*") {
            let coerced = request_id_to_string(&serde_json::json!(s));
            prop_assert_eq!(coerced, Some(s));
        }
    }
}
