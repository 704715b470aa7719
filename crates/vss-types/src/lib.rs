// SPDX-License-Identifier: MIT OR Apache-2.0
//! The VSS data model: [`Datatype`], [`Value`], tree [`Node`]s, and the
//! type checker that binds them together (§3, §4.2, §9).

pub mod checker;
pub mod datatype;
pub mod node;
pub mod value;

pub use checker::{check, coerce_value};
pub use datatype::Datatype;
pub use node::{Attribute, DataSlot, Datapoint, LeafKind, Metadata, Node, Timestamp};
pub use value::Value;
