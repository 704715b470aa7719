// SPDX-License-Identifier: MIT OR Apache-2.0
//! The Metadata/Type Checker (§4.2).
//!
//! Pure: given a leaf's [`Metadata`] and a candidate JSON value, either
//! returns a normalized [`Value`] or fails with `out_of_bounds`,
//! `type_mismatch`, or `unsupported_type`.

use crate::{Datatype, Metadata, Value};
use serde_json::Value as JsonValue;
use vss_error::BrokerError;

fn type_mismatch(datatype: &Datatype, raw: &JsonValue) -> BrokerError {
    BrokerError::TypeMismatch(format!(
        "the input value '{raw}' is not valid for datatype {datatype}"
    ))
}

fn out_of_bounds(datatype: &Datatype, raw: &JsonValue) -> BrokerError {
    BrokerError::OutOfBounds(format!("the type {datatype} with value {raw} is out of bound"))
}

/// Extract an arbitrary-precision integer literal from a JSON scalar,
/// accepting hex (`0x`/`0X`) strings. Unsigned widths only (§4.2: "Hex
/// literals are accepted for unsigned types").
fn unsigned_integer_literal(raw: &JsonValue) -> Option<i128> {
    if let JsonValue::String(s) = raw {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            return i128::from_str_radix(hex, 16).ok();
        }
    }
    decimal_integer_literal(raw)
}

/// Extract an arbitrary-precision integer literal from a JSON scalar,
/// rejecting fractional values and hex-string literals (signed widths only).
fn decimal_integer_literal(raw: &JsonValue) -> Option<i128> {
    match raw {
        JsonValue::Number(n) => {
            if let Some(v) = n.as_i64() {
                Some(v as i128)
            } else if let Some(v) = n.as_u64() {
                Some(v as i128)
            } else {
                let f = n.as_f64()?;
                (f.fract() == 0.0).then_some(f as i128)
            }
        }
        JsonValue::String(s) => {
            let s = s.trim();
            if let Ok(v) = s.parse::<i128>() {
                return Some(v);
            }
            let f: f64 = s.parse().ok()?;
            (f.fract() == 0.0).then_some(f as i128)
        }
        _ => None,
    }
}

fn float_literal(raw: &JsonValue) -> Option<f64> {
    match raw {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

macro_rules! uint_coercer {
    ($name:ident, $ty:ty, $variant:ident) => {
        fn $name(datatype: &Datatype, raw: &JsonValue) -> Result<Value, BrokerError> {
            let v = unsigned_integer_literal(raw).ok_or_else(|| type_mismatch(datatype, raw))?;
            if v < 0 || v > <$ty>::MAX as i128 {
                return Err(out_of_bounds(datatype, raw));
            }
            Ok(Value::$variant(v as $ty))
        }
    };
}

macro_rules! int_coercer {
    ($name:ident, $ty:ty, $variant:ident) => {
        fn $name(datatype: &Datatype, raw: &JsonValue) -> Result<Value, BrokerError> {
            let v = decimal_integer_literal(raw).ok_or_else(|| type_mismatch(datatype, raw))?;
            if v < <$ty>::MIN as i128 || v > <$ty>::MAX as i128 {
                return Err(out_of_bounds(datatype, raw));
            }
            Ok(Value::$variant(v as $ty))
        }
    };
}

uint_coercer!(coerce_uint8, u8, Uint8);
uint_coercer!(coerce_uint16, u16, Uint16);
uint_coercer!(coerce_uint32, u32, Uint32);
uint_coercer!(coerce_uint64, u64, Uint64);
int_coercer!(coerce_int8, i8, Int8);
int_coercer!(coerce_int16, i16, Int16);
int_coercer!(coerce_int32, i32, Int32);
int_coercer!(coerce_int64, i64, Int64);

fn coerce_float(datatype: &Datatype, raw: &JsonValue) -> Result<Value, BrokerError> {
    let v = float_literal(raw).ok_or_else(|| type_mismatch(datatype, raw))?;
    if v.is_nan() || v.abs() > f32::MAX as f64 {
        return Err(out_of_bounds(datatype, raw));
    }
    Ok(Value::Float(v as f32))
}

fn coerce_double(datatype: &Datatype, raw: &JsonValue) -> Result<Value, BrokerError> {
    let v = float_literal(raw).ok_or_else(|| type_mismatch(datatype, raw))?;
    if v.is_nan() || v.abs() > f64::MAX {
        return Err(out_of_bounds(datatype, raw));
    }
    Ok(Value::Double(v))
}

fn coerce_boolean(datatype: &Datatype, raw: &JsonValue) -> Result<Value, BrokerError> {
    match raw {
        JsonValue::Bool(b) => Ok(Value::Boolean(*b)),
        JsonValue::String(s) if s == "true" => Ok(Value::Boolean(true)),
        JsonValue::String(s) if s == "false" => Ok(Value::Boolean(false)),
        _ => Err(type_mismatch(datatype, raw)),
    }
}

fn coerce_string(datatype: &Datatype, raw: &JsonValue) -> Result<Value, BrokerError> {
    match raw {
        JsonValue::String(s) => Ok(Value::String(s.clone())),
        JsonValue::Number(n) => Ok(Value::String(n.to_string())),
        JsonValue::Bool(b) => Ok(Value::String(b.to_string())),
        _ => Err(type_mismatch(datatype, raw)),
    }
}

fn coerce_array(
    datatype: &Datatype,
    elem: &Datatype,
    raw: &JsonValue,
) -> Result<Value, BrokerError> {
    let items = match raw {
        JsonValue::Array(items) => items.clone(),
        JsonValue::String(s) => match serde_json::from_str::<JsonValue>(s) {
            Ok(JsonValue::Array(items)) => items,
            _ => return Err(type_mismatch(datatype, raw)),
        },
        _ => return Err(type_mismatch(datatype, raw)),
    };
    let mut out = Vec::with_capacity(items.len());
    for item in &items {
        out.push(coerce_scalar(elem, item)?);
    }
    Ok(Value::Array(out))
}

fn coerce_scalar(datatype: &Datatype, raw: &JsonValue) -> Result<Value, BrokerError> {
    match datatype {
        Datatype::Uint8 => coerce_uint8(datatype, raw),
        Datatype::Uint16 => coerce_uint16(datatype, raw),
        Datatype::Uint32 => coerce_uint32(datatype, raw),
        Datatype::Uint64 => coerce_uint64(datatype, raw),
        Datatype::Int8 => coerce_int8(datatype, raw),
        Datatype::Int16 => coerce_int16(datatype, raw),
        Datatype::Int32 => coerce_int32(datatype, raw),
        Datatype::Int64 => coerce_int64(datatype, raw),
        Datatype::Float => coerce_float(datatype, raw),
        Datatype::Double => coerce_double(datatype, raw),
        Datatype::Boolean => coerce_boolean(datatype, raw),
        Datatype::String => coerce_string(datatype, raw),
        Datatype::Array(_) => Err(BrokerError::UnsupportedType(
            "nested arrays are not supported".into(),
        )),
    }
}

/// Coerce `raw` into a [`Value`] of the given `datatype`, without consulting
/// `min`/`max`/`allowed`. Used for loading `min`/`max`/`default`/`allowed`
/// themselves, which have no bounds of their own.
pub fn coerce_value(datatype: &Datatype, raw: &JsonValue) -> Result<Value, BrokerError> {
    match datatype {
        Datatype::Array(elem) => coerce_array(datatype, elem, raw),
        other => coerce_scalar(other, raw),
    }
}

/// Validate and normalize `raw` against a leaf's full [`Metadata`]: type,
/// width/range, and `min`/`max`/`allowed` constraints.
pub fn check(metadata: &Metadata, raw: &JsonValue) -> Result<Value, BrokerError> {
    let value = coerce_value(&metadata.datatype, raw)?;

    if let (Some(min), Some(v)) = (&metadata.min, value.as_f64()) {
        if let Some(m) = min.as_f64() {
            if v < m {
                return Err(out_of_bounds(&metadata.datatype, raw));
            }
        }
    }
    if let (Some(max), Some(v)) = (&metadata.max, value.as_f64()) {
        if let Some(m) = max.as_f64() {
            if v > m {
                return Err(out_of_bounds(&metadata.datatype, raw));
            }
        }
    }
    if let Some(allowed) = &metadata.allowed {
        if !allowed.iter().any(|a| *a == value) {
            return Err(out_of_bounds(&metadata.datatype, raw));
        }
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Metadata;

    fn meta(dt: Datatype) -> Metadata {
        Metadata {
            datatype: dt,
            description: None,
            uuid: "u".into(),
            unit: None,
            min: None,
            max: None,
            allowed: None,
            default: None,
        }
    }

    #[test]
    fn uint8_accepts_boundary_values() {
        let m = meta(Datatype::Uint8);
        assert_eq!(check(&m, &serde_json::json!(0)).unwrap(), Value::Uint8(0));
        assert_eq!(check(&m, &serde_json::json!(255)).unwrap(), Value::Uint8(255));
    }

    #[test]
    fn uint8_rejects_out_of_range() {
        let m = meta(Datatype::Uint8);
        assert!(check(&m, &serde_json::json!(-1)).is_err());
        assert!(check(&m, &serde_json::json!(256)).is_err());
    }

    #[test]
    fn uint8_accepts_hex_literal() {
        let m = meta(Datatype::Uint8);
        assert_eq!(
            check(&m, &serde_json::json!("0xFF")).unwrap(),
            Value::Uint8(255)
        );
    }

    #[test]
    fn float_rejects_beyond_f32_max() {
        let m = meta(Datatype::Float);
        assert!(check(&m, &serde_json::json!(3.4e38)).is_ok());
        assert!(check(&m, &serde_json::json!(4e38)).is_err());
    }

    #[test]
    fn boolean_is_case_sensitive_and_rejects_numeric_strings() {
        let m = meta(Datatype::Boolean);
        assert!(check(&m, &serde_json::json!(true)).is_ok());
        assert!(check(&m, &serde_json::json!("true")).is_ok());
        assert!(check(&m, &serde_json::json!("True")).is_err());
        assert!(check(&m, &serde_json::json!("0")).is_err());
        assert!(check(&m, &serde_json::json!("1")).is_err());
    }

    #[test]
    fn string_accepts_empty_value() {
        let m = meta(Datatype::String);
        assert_eq!(
            check(&m, &serde_json::json!("")).unwrap(),
            Value::String(String::new())
        );
    }

    #[test]
    fn array_validates_element_wise() {
        let m = meta(Datatype::Array(Box::new(Datatype::Int32)));
        let v = check(&m, &serde_json::json!([1, 2, 3])).unwrap();
        assert_eq!(
            v,
            Value::Array(vec![Value::Int32(1), Value::Int32(2), Value::Int32(3)])
        );
        assert!(check(&m, &serde_json::json!("not an array")).is_err());
    }

    #[test]
    fn array_as_json_encoded_string_is_parsed() {
        let m = meta(Datatype::Array(Box::new(Datatype::Int32)));
        let v = check(&m, &serde_json::json!("[1,2,3]")).unwrap();
        assert_eq!(
            v,
            Value::Array(vec![Value::Int32(1), Value::Int32(2), Value::Int32(3)])
        );
    }

    #[test]
    fn min_max_bounds_are_enforced() {
        let mut m = meta(Datatype::Int32);
        m.min = Some(Value::Int32(0));
        m.max = Some(Value::Int32(100));
        assert!(check(&m, &serde_json::json!(50)).is_ok());
        assert!(check(&m, &serde_json::json!(-1)).is_err());
        assert!(check(&m, &serde_json::json!(101)).is_err());
    }

    #[test]
    fn allowed_set_rejects_values_outside_it() {
        let mut m = meta(Datatype::String);
        m.allowed = Some(vec![Value::String("a".into()), Value::String("b".into())]);
        assert!(check(&m, &serde_json::json!("a")).is_ok());
        assert!(check(&m, &serde_json::json!("z")).is_err());
    }

    #[test]
    fn rejects_non_numeric_string_for_integer_type() {
        let m = meta(Datatype::Int32);
        assert!(check(&m, &serde_json::json!("abc")).is_err());
    }

    #[test]
    fn rejects_fractional_value_for_integer_type() {
        let m = meta(Datatype::Int32);
        assert!(check(&m, &serde_json::json!(3.5)).is_err());
    }

    #[test]
    fn signed_integer_types_reject_hex_literals() {
        let m = meta(Datatype::Int32);
        assert!(check(&m, &serde_json::json!("0xFF")).is_err());
    }
}

#[cfg(test)]
mod boundary_properties {
    use super::*;
    use crate::Metadata;
    use proptest::prelude::*;

    fn meta(dt: Datatype) -> Metadata {
        Metadata {
            datatype: dt,
            description: None,
            uuid: "u".into(),
            unit: None,
            min: None,
            max: None,
            allowed: None,
            default: None,
        }
    }

    proptest! {
        #[test]
        fn uint8_in_range_always_accepted(v in 0u32..=255) {
            let m = meta(Datatype::Uint8);
            prop_assert_eq!(check(&m, &serde_json::json!(v)).unwrap(), Value::Uint8(v as u8));
        }

        #[test]
        fn uint8_above_range_always_rejected(v in 256u32..100_000) {
            let m = meta(Datatype::Uint8);
            prop_assert!(check(&m, &serde_json::json!(v)).is_err());
        }

        #[test]
        fn int32_in_range_round_trips(v in i32::MIN..=i32::MAX) {
            let m = meta(Datatype::Int32);
            prop_assert_eq!(check(&m, &serde_json::json!(v)).unwrap(), Value::Int32(v));
        }

        #[test]
        fn float_within_f32_bounds_is_always_accepted(v in -3.0e38f64..3.0e38f64) {
            let m = meta(Datatype::Float);
            prop_assert!(check(&m, &serde_json::json!(v)).is_ok());
        }

        #[test]
        fn min_max_window_is_always_respected(lo in -1000i64..1000, hi in 1000i64..2000, v in -2000i64..3000) {
            let mut m = meta(Datatype::Int64);
            m.min = Some(Value::Int64(lo));
            m.max = Some(Value::Int64(hi));
            let result = check(&m, &serde_json::json!(v));
            if v >= lo && v <= hi {
                prop_assert_eq!(result.unwrap(), Value::Int64(v));
            } else {
                prop_assert!(result.is_err());
            }
        }

        #[test]
        fn hex_and_decimal_literals_agree_for_any_uint16(v in 0u32..=65535) {
            let m = meta(Datatype::Uint16);
            let hex = format!("0x{v:X}");
            let decimal = check(&m, &serde_json::json!(v)).unwrap();
            let from_hex = check(&m, &serde_json::json!(hex)).unwrap();
            prop_assert_eq!(decimal, from_hex);
        }
    }
}
