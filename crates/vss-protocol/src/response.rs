// SPDX-License-Identifier: MIT OR Apache-2.0
//! The JSON response envelope, including the error envelope (§6, §7).

use serde::Serialize;
use serde_json::Value as JsonValue;
use vss_error::{BrokerError, ErrorParts};
use vss_types::{Datapoint, Timestamp};

/// A single value+timestamp pair as it appears on the wire. When `asString`
/// was requested, both fields render as strings (§4.3 design note).
#[derive(Debug, Clone, Serialize)]
pub struct DatapointWire {
    pub value: JsonValue,
    pub ts: String,
}

impl DatapointWire {
    pub fn from_datapoint(dp: &Datapoint, as_string: bool) -> Self {
        let value = if as_string {
            JsonValue::String(dp.value.to_canonical_string())
        } else {
            serde_json::to_value(&dp.value).unwrap_or(JsonValue::Null)
        };
        DatapointWire {
            value,
            ts: dp.ts.to_iso8601(),
        }
    }
}

/// A single signal's reading within a `get`/subscription response.
#[derive(Debug, Clone, Serialize)]
pub struct SignalData {
    pub path: String,
    pub dp: DatapointWire,
}

/// A successful action response, or the out-of-band push sent to a
/// subscriber when a subscribed signal changes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Response {
    #[serde(rename = "get")]
    Get {
        request_id: Option<JsonValue>,
        ts: String,
        /// A single `{path, dp}` object for one match, or an array of them
        /// for a wildcard query with multiple matches (§4.9 `get` dispatch).
        data: JsonValue,
    },
    #[serde(rename = "set")]
    Set {
        request_id: Option<JsonValue>,
        ts: String,
    },
    #[serde(rename = "subscribe")]
    Subscribe {
        request_id: Option<JsonValue>,
        ts: String,
        subscription_id: String,
    },
    #[serde(rename = "unsubscribe")]
    Unsubscribe {
        request_id: Option<JsonValue>,
        ts: String,
        subscription_id: String,
    },
    #[serde(rename = "getMetaData")]
    GetMetaData {
        request_id: Option<JsonValue>,
        ts: String,
        metadata: JsonValue,
    },
    #[serde(rename = "updateMetaData")]
    UpdateMetaData {
        request_id: Option<JsonValue>,
        ts: String,
    },
    #[serde(rename = "updateVSSTree")]
    UpdateVssTree {
        request_id: Option<JsonValue>,
        ts: String,
    },
    #[serde(rename = "authorize")]
    Authorize {
        request_id: Option<JsonValue>,
        ts: String,
        #[serde(rename = "TTL")]
        ttl: Option<i64>,
    },
    #[serde(rename = "subscription")]
    SubscriptionUpdate {
        subscription_id: String,
        ts: String,
        data: Vec<SignalData>,
    },
}

/// The uniform error envelope (§7): every rejected request gets one of
/// these instead of a `Response`, regardless of which action it named.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub action: String,
    pub request_id: Option<JsonValue>,
    pub ts: String,
    pub error: ErrorParts,
}

impl ErrorResponse {
    pub fn new(action: &str, request_id: Option<JsonValue>, error: &BrokerError) -> Self {
        ErrorResponse {
            action: action.to_string(),
            request_id,
            ts: Timestamp::now().to_iso8601(),
            error: ErrorParts::from(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_serializes_with_error_envelope_shape() {
        let err = BrokerError::PathNotFound("Vehicle.Bogus".into());
        let resp = ErrorResponse::new("get", Some(serde_json::json!("7")), &err);
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["action"], "get");
        assert_eq!(value["error"]["number"], "404");
    }

    #[test]
    fn authorize_response_carries_ttl_under_the_uppercase_field() {
        let resp = Response::Authorize {
            request_id: Some(serde_json::json!("1")),
            ts: "1970-01-01T00:00:00.0Z".to_string(),
            ttl: Some(3600),
        };
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["TTL"], 3600);
        assert!(value.get("ttl").is_none());
    }
}
