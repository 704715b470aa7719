// SPDX-License-Identifier: MIT OR Apache-2.0
//! The signal tree's node shapes (§3, §9 design note): `Node`, `Metadata`,
//! `DataSlot`, `Datapoint`, and `Timestamp`.

use crate::{checker, Datatype, Value};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use vss_error::BrokerError;

/// A leaf's role in the vehicle model (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafKind {
    Sensor,
    Actuator,
    Attribute,
}

impl LeafKind {
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "sensor" => Some(LeafKind::Sensor),
            "actuator" => Some(LeafKind::Actuator),
            "attribute" => Some(LeafKind::Attribute),
            _ => None,
        }
    }

    /// `true` for kinds that accept a client-issued `set` (§4.3: "writable:
    /// sensor|actuator"). Attribute leaves are static configuration and are
    /// only ever changed through `updateMetaData`/`updateVSSTree`.
    pub fn is_writable_kind(&self) -> bool {
        !matches!(self, LeafKind::Attribute)
    }
}

/// Which half of a leaf's data slot an operation targets (§3 Node).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    /// The current sampled/commanded value, held by every leaf kind.
    Value,
    /// The commanded target, held only by actuator leaves.
    Target,
}

impl Attribute {
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "value" => Some(Attribute::Value),
            "targetValue" => Some(Attribute::Target),
            _ => None,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Value => f.write_str("value"),
            Attribute::Target => f.write_str("targetValue"),
        }
    }
}

impl fmt::Display for LeafKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LeafKind::Sensor => "sensor",
            LeafKind::Actuator => "actuator",
            LeafKind::Attribute => "attribute",
        };
        f.write_str(s)
    }
}

/// Nanosecond-resolution timestamp, internal representation per §9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(i64);

impl Timestamp {
    /// The sentinel "never set" timestamp, rendered as
    /// `"1970-01-01T00:00:00.0Z"`.
    pub fn epoch_zero() -> Self {
        Timestamp(0)
    }

    pub fn from_nanos(nanos: i64) -> Self {
        Timestamp(nanos)
    }

    pub fn nanos(&self) -> i64 {
        self.0
    }

    pub fn is_epoch_zero(&self) -> bool {
        self.0 == 0
    }

    /// The current wall-clock time, measured against the Unix epoch.
    pub fn now() -> Self {
        let dur = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(dur.as_nanos() as i64)
    }

    /// Render as a W3C-profile ISO-8601 string with one-decimal-place
    /// sub-second precision, matching the epoch-zero sentinel exactly.
    pub fn to_iso8601(&self) -> String {
        if self.is_epoch_zero() {
            return "1970-01-01T00:00:00.0Z".to_string();
        }
        let secs = self.0.div_euclid(1_000_000_000);
        let nanos = self.0.rem_euclid(1_000_000_000) as u32;
        let dt = DateTime::<Utc>::from_timestamp(secs, nanos).unwrap_or_default();
        let tenths = nanos / 100_000_000;
        format!("{}.{}Z", dt.format("%Y-%m-%dT%H:%M:%S"), tenths)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

/// A value paired with the time it was recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct Datapoint {
    pub value: Value,
    pub ts: Timestamp,
}

impl Datapoint {
    pub fn new(value: Value, ts: Timestamp) -> Self {
        Datapoint { value, ts }
    }
}

/// The mutable half of a leaf: its current value and, for actuators, the
/// last requested target.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSlot {
    pub value: Option<Datapoint>,
    pub target: Option<Datapoint>,
}

impl DataSlot {
    pub fn get(&self, attribute: Attribute) -> Option<&Datapoint> {
        match attribute {
            Attribute::Value => self.value.as_ref(),
            Attribute::Target => self.target.as_ref(),
        }
    }

    pub fn set(&mut self, attribute: Attribute, dp: Datapoint) {
        match attribute {
            Attribute::Value => self.value = Some(dp),
            Attribute::Target => self.target = Some(dp),
        }
    }
}

/// A leaf's static description (§4.2). Built by [`Metadata::from_json`]
/// rather than derived `Deserialize`, since `min`/`max`/`allowed`/`default`
/// must be coerced against `datatype` while parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub datatype: Datatype,
    pub description: Option<String>,
    pub uuid: String,
    pub unit: Option<String>,
    pub min: Option<Value>,
    pub max: Option<Value>,
    pub allowed: Option<Vec<Value>>,
    pub default: Option<Value>,
}

impl Metadata {
    /// Parse a leaf's metadata fields out of its tree-definition JSON
    /// object. `enum` is accepted as a legacy alias for `allowed`; if both
    /// are present, `allowed` wins.
    pub fn from_json(
        datatype: Datatype,
        uuid: String,
        obj: &serde_json::Map<String, JsonValue>,
    ) -> Result<Metadata, BrokerError> {
        let description = obj
            .get("description")
            .and_then(JsonValue::as_str)
            .map(str::to_string);
        let unit = obj.get("unit").and_then(JsonValue::as_str).map(str::to_string);

        let min = obj
            .get("min")
            .map(|raw| checker::coerce_value(&datatype, raw))
            .transpose()?;
        let max = obj
            .get("max")
            .map(|raw| checker::coerce_value(&datatype, raw))
            .transpose()?;

        let allowed_raw = obj.get("allowed").or_else(|| obj.get("enum"));
        let allowed = match allowed_raw {
            Some(JsonValue::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(checker::coerce_value(&datatype, item)?);
                }
                Some(out)
            }
            Some(other) => return Err(BrokerError::BadRequest(format!(
                "allowed/enum must be an array, got {other}"
            ))),
            None => None,
        };

        let default = obj
            .get("default")
            .map(|raw| checker::coerce_value(&datatype, raw))
            .transpose()?;

        Ok(Metadata {
            datatype,
            description,
            uuid,
            unit,
            min,
            max,
            allowed,
            default,
        })
    }
}

/// A node in the signal tree: either a branch with ordered named children,
/// or a leaf carrying its own metadata and mutable data slot.
///
/// Children use [`IndexMap`] so that `children()` iteration preserves the
/// tree-definition document's declaration order (§3: "no cyclic refs";
/// ordering is an observable property of `getMetaData`/`get` wildcard
/// results, not an incidental `HashMap` artifact).
#[derive(Debug, Clone)]
pub enum Node {
    Branch {
        children: IndexMap<String, Node>,
        description: Option<String>,
        uuid: String,
    },
    Leaf {
        kind: LeafKind,
        meta: Metadata,
        data: DataSlot,
    },
}

impl Metadata {
    /// Render as the JSON object shape used in `getMetaData` responses.
    pub fn to_json(&self) -> JsonValue {
        let mut obj = serde_json::Map::new();
        obj.insert("datatype".into(), JsonValue::String(self.datatype.to_string()));
        obj.insert("uuid".into(), JsonValue::String(self.uuid.clone()));
        if let Some(d) = &self.description {
            obj.insert("description".into(), JsonValue::String(d.clone()));
        }
        if let Some(u) = &self.unit {
            obj.insert("unit".into(), JsonValue::String(u.clone()));
        }
        if let Some(v) = &self.min {
            obj.insert("min".into(), serde_json::to_value(v).unwrap_or(JsonValue::Null));
        }
        if let Some(v) = &self.max {
            obj.insert("max".into(), serde_json::to_value(v).unwrap_or(JsonValue::Null));
        }
        if let Some(v) = &self.allowed {
            obj.insert(
                "allowed".into(),
                JsonValue::Array(
                    v.iter()
                        .map(|x| serde_json::to_value(x).unwrap_or(JsonValue::Null))
                        .collect(),
                ),
            );
        }
        if let Some(v) = &self.default {
            obj.insert("default".into(), serde_json::to_value(v).unwrap_or(JsonValue::Null));
        }
        JsonValue::Object(obj)
    }
}

impl Node {
    pub fn is_branch(&self) -> bool {
        matches!(self, Node::Branch { .. })
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    pub fn children(&self) -> Option<&IndexMap<String, Node>> {
        match self {
            Node::Branch { children, .. } => Some(children),
            Node::Leaf { .. } => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut IndexMap<String, Node>> {
        match self {
            Node::Branch { children, .. } => Some(children),
            Node::Leaf { .. } => None,
        }
    }

    pub fn leaf_kind(&self) -> Option<LeafKind> {
        match self {
            Node::Leaf { kind, .. } => Some(*kind),
            Node::Branch { .. } => None,
        }
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        match self {
            Node::Leaf { meta, .. } => Some(meta),
            Node::Branch { .. } => None,
        }
    }

    pub fn data(&self) -> Option<&DataSlot> {
        match self {
            Node::Leaf { data, .. } => Some(data),
            Node::Branch { .. } => None,
        }
    }

    pub fn data_mut(&mut self) -> Option<&mut DataSlot> {
        match self {
            Node::Leaf { data, .. } => Some(data),
            Node::Branch { .. } => None,
        }
    }

    pub fn uuid(&self) -> &str {
        match self {
            Node::Branch { uuid, .. } => uuid,
            Node::Leaf { meta, .. } => &meta.uuid,
        }
    }
}
