// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `Value` tagged variant, aligned with [`crate::Datatype`] (§9 design note).

use crate::Datatype;
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use std::fmt;

/// A concrete, typed signal value.
///
/// Every `Value` was produced by the type checker against a specific
/// [`Datatype`]; there is no untyped constructor in the public API.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Unsigned 8-bit integer.
    Uint8(u8),
    /// Unsigned 16-bit integer.
    Uint16(u16),
    /// Unsigned 32-bit integer.
    Uint32(u32),
    /// Unsigned 64-bit integer.
    Uint64(u64),
    /// Signed 8-bit integer.
    Int8(i8),
    /// Signed 16-bit integer.
    Int16(i16),
    /// Signed 32-bit integer.
    Int32(i32),
    /// Signed 64-bit integer.
    Int64(i64),
    /// Single-precision float.
    Float(f32),
    /// Double-precision float.
    Double(f64),
    /// Boolean.
    Boolean(bool),
    /// UTF-8 string.
    String(String),
    /// Homogeneous array of scalar values.
    Array(Vec<Value>),
}

impl Value {
    /// The datatype this value was checked against.
    pub fn datatype(&self) -> Datatype {
        match self {
            Value::Uint8(_) => Datatype::Uint8,
            Value::Uint16(_) => Datatype::Uint16,
            Value::Uint32(_) => Datatype::Uint32,
            Value::Uint64(_) => Datatype::Uint64,
            Value::Int8(_) => Datatype::Int8,
            Value::Int16(_) => Datatype::Int16,
            Value::Int32(_) => Datatype::Int32,
            Value::Int64(_) => Datatype::Int64,
            Value::Float(_) => Datatype::Float,
            Value::Double(_) => Datatype::Double,
            Value::Boolean(_) => Datatype::Boolean,
            Value::String(_) => Datatype::String,
            Value::Array(items) => Datatype::Array(Box::new(
                items.first().map(Value::datatype).unwrap_or(Datatype::String),
            )),
        }
    }

    /// Numeric projection used for min/max/allowed comparisons. `None` for
    /// non-numeric variants.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Uint8(v) => Some(*v as f64),
            Value::Uint16(v) => Some(*v as f64),
            Value::Uint32(v) => Some(*v as f64),
            Value::Uint64(v) => Some(*v as f64),
            Value::Int8(v) => Some(*v as f64),
            Value::Int16(v) => Some(*v as f64),
            Value::Int32(v) => Some(*v as f64),
            Value::Int64(v) => Some(*v as f64),
            Value::Float(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// The client-facing string rendering used when a response's datapoint
    /// requests `asString` (§4.3): floats always keep a fractional part,
    /// matching the original's `value.as<string>()` coercion.
    pub fn to_canonical_string(&self) -> String {
        match self {
            Value::Uint8(v) => v.to_string(),
            Value::Uint16(v) => v.to_string(),
            Value::Uint32(v) => v.to_string(),
            Value::Uint64(v) => v.to_string(),
            Value::Int8(v) => v.to_string(),
            Value::Int16(v) => v.to_string(),
            Value::Int32(v) => v.to_string(),
            Value::Int64(v) => v.to_string(),
            Value::Float(v) => format_float(*v as f64),
            Value::Double(v) => format_float(*v),
            Value::Boolean(v) => v.to_string(),
            Value::String(v) => v.clone(),
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().map(Value::to_canonical_string).collect();
                format!("[{}]", parts.join(","))
            }
        }
    }
}

fn format_float(v: f64) -> String {
    let s = v.to_string();
    if s.contains('.') || s.contains('e') || s.contains("inf") || s.contains("NaN") {
        s
    } else {
        format!("{s}.0")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical_string())
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Uint8(v) => serializer.serialize_u8(*v),
            Value::Uint16(v) => serializer.serialize_u16(*v),
            Value::Uint32(v) => serializer.serialize_u32(*v),
            Value::Uint64(v) => serializer.serialize_u64(*v),
            Value::Int8(v) => serializer.serialize_i8(*v),
            Value::Int16(v) => serializer.serialize_i16(*v),
            Value::Int32(v) => serializer.serialize_i32(*v),
            Value::Int64(v) => serializer.serialize_i64(*v),
            Value::Float(v) => serializer.serialize_f32(*v),
            Value::Double(v) => serializer.serialize_f64(*v),
            Value::Boolean(v) => serializer.serialize_bool(*v),
            Value::String(v) => serializer.serialize_str(v),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}
