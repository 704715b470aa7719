// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `Datatype` tagged variant (§3).

use serde::{Deserialize, Serialize};
use std::fmt;

/// A leaf's declared datatype.
///
/// There are no nested compound types: [`Datatype::Array`] wraps a scalar
/// element type only, never another array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Datatype {
    /// 8-bit unsigned integer.
    Uint8,
    /// 16-bit unsigned integer.
    Uint16,
    /// 32-bit unsigned integer.
    Uint32,
    /// 64-bit unsigned integer.
    Uint64,
    /// 8-bit signed integer.
    Int8,
    /// 16-bit signed integer.
    Int16,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// Single-precision floating point.
    Float,
    /// Double-precision floating point.
    Double,
    /// Boolean.
    Boolean,
    /// UTF-8 string.
    String,
    /// One-dimensional array of a scalar element type.
    Array(Box<Datatype>),
}

impl Datatype {
    /// Parse a datatype tag as it appears in a tree-definition document
    /// (case-insensitive, `"<elem>[]"` suffix for arrays).
    pub fn parse(tag: &str) -> Option<Self> {
        let tag = tag.trim();
        if let Some(elem) = tag.strip_suffix("[]") {
            if elem.ends_with("[]") {
                return None;
            }
            return Datatype::parse_scalar(elem).map(|d| Datatype::Array(Box::new(d)));
        }
        Datatype::parse_scalar(tag)
    }

    fn parse_scalar(tag: &str) -> Option<Self> {
        Some(match tag.to_ascii_lowercase().as_str() {
            "uint8" => Datatype::Uint8,
            "uint16" => Datatype::Uint16,
            "uint32" => Datatype::Uint32,
            "uint64" => Datatype::Uint64,
            "int8" => Datatype::Int8,
            "int16" => Datatype::Int16,
            "int32" => Datatype::Int32,
            "int64" => Datatype::Int64,
            "float" => Datatype::Float,
            "double" => Datatype::Double,
            "boolean" => Datatype::Boolean,
            "string" => Datatype::String,
            _ => return None,
        })
    }

    /// `true` if this datatype is an array variant.
    pub fn is_array(&self) -> bool {
        matches!(self, Datatype::Array(_))
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datatype::Uint8 => write!(f, "uint8"),
            Datatype::Uint16 => write!(f, "uint16"),
            Datatype::Uint32 => write!(f, "uint32"),
            Datatype::Uint64 => write!(f, "uint64"),
            Datatype::Int8 => write!(f, "int8"),
            Datatype::Int16 => write!(f, "int16"),
            Datatype::Int32 => write!(f, "int32"),
            Datatype::Int64 => write!(f, "int64"),
            Datatype::Float => write!(f, "float"),
            Datatype::Double => write!(f, "double"),
            Datatype::Boolean => write!(f, "boolean"),
            Datatype::String => write!(f, "string"),
            Datatype::Array(elem) => write!(f, "{elem}[]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scalar_tags_case_insensitively() {
        assert_eq!(Datatype::parse("UInt8"), Some(Datatype::Uint8));
        assert_eq!(Datatype::parse("boolean"), Some(Datatype::Boolean));
    }

    #[test]
    fn parses_array_suffix() {
        assert_eq!(
            Datatype::parse("float[]"),
            Some(Datatype::Array(Box::new(Datatype::Float)))
        );
    }

    #[test]
    fn rejects_unknown_tag() {
        assert_eq!(Datatype::parse("bignum"), None);
    }

    #[test]
    fn rejects_doubly_nested_array_suffix() {
        assert_eq!(Datatype::parse("float[][]"), None);
    }
}
