// SPDX-License-Identifier: MIT OR Apache-2.0
//! The JSON request/response protocol: envelopes, schema validation, and
//! the uniform error envelope (§6, §4.8).

pub mod request;
pub mod response;
pub mod validate;

pub use request::{extract_request_id, request_id_to_string, Request};
pub use response::{DatapointWire, ErrorResponse, Response, SignalData};
pub use validate::RequestValidator;
