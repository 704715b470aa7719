// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tree-definition document parsing and overlay merging (§6 tree-definition
//! doc, §9 supplemented alphanumeric overlay loading).

use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue};
use std::path::Path as FsPath;
use vss_error::BrokerError;
use vss_types::{DataSlot, Datatype, LeafKind, Metadata, Node};

/// Parse a full tree-definition document into a root [`Node::Branch`].
///
/// The document's top-level object is itself the root's children map (there
/// is no synthetic wrapping key).
pub fn load_tree(doc: &JsonValue) -> Result<Node, BrokerError> {
    let obj = doc
        .as_object()
        .ok_or_else(|| BrokerError::BadRequest("tree definition must be a JSON object".into()))?;
    let children = load_children(obj)?;
    Ok(Node::Branch {
        children,
        description: None,
        uuid: "root".to_string(),
    })
}

fn load_children(obj: &Map<String, JsonValue>) -> Result<IndexMap<String, Node>, BrokerError> {
    let mut children = IndexMap::new();
    for (name, raw) in obj {
        children.insert(name.clone(), load_node(name, raw)?);
    }
    Ok(children)
}

fn load_node(name: &str, raw: &JsonValue) -> Result<Node, BrokerError> {
    let obj = raw.as_object().ok_or_else(|| {
        BrokerError::BadRequest(format!("node '{name}' must be a JSON object"))
    })?;
    let kind_tag = obj
        .get("type")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| BrokerError::BadRequest(format!("node '{name}' is missing 'type'")))?;

    if kind_tag.eq_ignore_ascii_case("branch") {
        let children = match obj.get("children") {
            Some(JsonValue::Object(c)) => load_children(c)?,
            Some(_) => {
                return Err(BrokerError::BadRequest(format!(
                    "branch '{name}' has non-object 'children'"
                )))
            }
            None => IndexMap::new(),
        };
        let description = obj
            .get("description")
            .and_then(JsonValue::as_str)
            .map(str::to_string);
        let uuid = obj
            .get("uuid")
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
            .to_string();
        return Ok(Node::Branch {
            children,
            description,
            uuid,
        });
    }

    let kind = LeafKind::parse(kind_tag).ok_or_else(|| {
        BrokerError::BadRequest(format!("node '{name}' has unknown type '{kind_tag}'"))
    })?;
    let datatype_tag = obj.get("datatype").and_then(JsonValue::as_str).ok_or_else(|| {
        BrokerError::BadRequest(format!("leaf '{name}' is missing 'datatype'"))
    })?;
    let datatype = Datatype::parse(datatype_tag).ok_or_else(|| {
        BrokerError::UnsupportedType(format!(
            "leaf '{name}' declares unsupported datatype '{datatype_tag}'"
        ))
    })?;
    let uuid = obj
        .get("uuid")
        .and_then(JsonValue::as_str)
        .unwrap_or_default()
        .to_string();
    let meta = Metadata::from_json(datatype, uuid, obj)?;

    Ok(Node::Leaf {
        kind,
        meta,
        data: DataSlot::default(),
    })
}

/// Deep-merge an overlay document into an existing tree, in place.
///
/// Overlay branches merge children recursively; overlay leaves replace the
/// base leaf's metadata wholesale (the data slot, if any, is preserved).
/// New branches/leaves not present in the base are added.
pub fn merge_overlay(base: &mut Node, overlay: &JsonValue) -> Result<(), BrokerError> {
    let overlay_obj = match overlay.as_object() {
        Some(o) => o,
        None => {
            return Err(BrokerError::BadRequest(
                "overlay document must be a JSON object".into(),
            ))
        }
    };
    if !base.is_branch() {
        return Err(BrokerError::BadRequest(
            "cannot merge an overlay into a leaf node".into(),
        ));
    }
    for (name, raw) in overlay_obj {
        if base.children().unwrap().contains_key(name) {
            let child = base.children_mut().unwrap().get_mut(name).unwrap();
            merge_node(child, raw)?;
        } else {
            base.children_mut()
                .unwrap()
                .insert(name.clone(), load_node(name, raw)?);
        }
    }
    Ok(())
}

fn merge_node(node: &mut Node, raw: &JsonValue) -> Result<(), BrokerError> {
    let is_branch_patch = raw
        .get("type")
        .and_then(JsonValue::as_str)
        .is_some_and(|t| t.eq_ignore_ascii_case("branch"));
    if node.is_branch() && is_branch_patch {
        if let Some(JsonValue::Object(c)) = raw.get("children") {
            for (child_name, child_raw) in c {
                if node.children().unwrap().contains_key(child_name) {
                    let child = node.children_mut().unwrap().get_mut(child_name).unwrap();
                    merge_node(child, child_raw)?;
                } else {
                    node.children_mut()
                        .unwrap()
                        .insert(child_name.clone(), load_node(child_name, child_raw)?);
                }
            }
        }
        Ok(())
    } else {
        // A leaf overlay patch replaces metadata wholesale but keeps
        // whatever the leaf's data slot already holds (§9 supplemented
        // overlay semantics: "never removes keys (only add/replace)").
        let preserved = node.data().cloned();
        let mut replacement = load_node("overlay", raw)?;
        if let (Some(data), Node::Leaf { data: slot, .. }) = (preserved, &mut replacement) {
            *slot = data;
        }
        *node = replacement;
        Ok(())
    }
}

/// Load a base tree-definition document, then apply every `*.json` overlay
/// found in `overlay_dir`, in alphanumeric filename order.
pub fn load_tree_with_overlays(
    base_doc: &JsonValue,
    overlay_dir: &FsPath,
) -> Result<Node, BrokerError> {
    let mut tree = load_tree(base_doc)?;
    if !overlay_dir.is_dir() {
        return Ok(tree);
    }
    let mut entries: Vec<_> = std::fs::read_dir(overlay_dir)
        .map_err(|e| BrokerError::Internal(format!("reading overlay dir: {e}")))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    entries.sort();

    for path in entries {
        let text = std::fs::read_to_string(&path)
            .map_err(|e| BrokerError::Internal(format!("reading overlay {path:?}: {e}")))?;
        let doc: JsonValue = serde_json::from_str(&text)
            .map_err(|e| BrokerError::BadRequest(format!("parsing overlay {path:?}: {e}")))?;
        tracing::debug!(overlay = %path.display(), "applying VSS tree overlay");
        merge_overlay(&mut tree, &doc)?;
    }
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_simple_branch_and_leaf() {
        let doc = serde_json::json!({
            "Vehicle": {
                "type": "branch",
                "uuid": "b1",
                "children": {
                    "Speed": {
                        "type": "sensor",
                        "datatype": "float",
                        "uuid": "l1",
                        "unit": "km/h"
                    }
                }
            }
        });
        let tree = load_tree(&doc).unwrap();
        let vehicle = tree.children().unwrap().get("Vehicle").unwrap();
        assert!(vehicle.is_branch());
        let speed = vehicle.children().unwrap().get("Speed").unwrap();
        assert_eq!(speed.leaf_kind(), Some(LeafKind::Sensor));
        assert_eq!(speed.metadata().unwrap().datatype, Datatype::Float);
    }

    #[test]
    fn rejects_unknown_datatype() {
        let doc = serde_json::json!({
            "X": { "type": "sensor", "datatype": "bignum", "uuid": "u" }
        });
        assert!(load_tree(&doc).is_err());
    }

    #[test]
    fn overlay_adds_new_leaf_under_existing_branch() {
        let doc = serde_json::json!({
            "Vehicle": {
                "type": "branch",
                "uuid": "b1",
                "children": {
                    "Speed": { "type": "sensor", "datatype": "float", "uuid": "l1" }
                }
            }
        });
        let mut tree = load_tree(&doc).unwrap();
        let overlay = serde_json::json!({
            "Vehicle": {
                "type": "branch",
                "children": {
                    "IsMoving": { "type": "sensor", "datatype": "boolean", "uuid": "l2" }
                }
            }
        });
        merge_overlay(&mut tree, &overlay).unwrap();
        let vehicle = tree.children().unwrap().get("Vehicle").unwrap();
        assert!(vehicle.children().unwrap().contains_key("Speed"));
        assert!(vehicle.children().unwrap().contains_key("IsMoving"));
    }

    #[test]
    fn load_tree_with_overlays_applies_files_in_alphanumeric_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("01-base-overlay.json"),
            serde_json::json!({
                "Vehicle": {
                    "type": "branch",
                    "children": {
                        "Speed": { "type": "sensor", "datatype": "float", "uuid": "l1", "unit": "km/h" }
                    }
                }
            })
            .to_string(),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("02-overrides-unit.json"),
            serde_json::json!({
                "Vehicle": {
                    "type": "branch",
                    "children": {
                        "Speed": { "type": "sensor", "datatype": "float", "uuid": "l1", "unit": "mph" }
                    }
                }
            })
            .to_string(),
        )
        .unwrap();

        let base = serde_json::json!({
            "Vehicle": { "type": "branch", "uuid": "b1", "children": {} }
        });
        let tree = load_tree_with_overlays(&base, dir.path()).unwrap();
        let speed = tree
            .children()
            .unwrap()
            .get("Vehicle")
            .unwrap()
            .children()
            .unwrap()
            .get("Speed")
            .unwrap();
        assert_eq!(speed.metadata().unwrap().unit, Some("mph".to_string()));
    }

    #[test]
    fn load_tree_with_overlays_on_a_missing_directory_returns_just_the_base_tree() {
        let base = serde_json::json!({
            "Vehicle": { "type": "branch", "uuid": "b1", "children": {} }
        });
        let tree = load_tree_with_overlays(&base, FsPath::new("/does/not/exist")).unwrap();
        assert!(tree.children().unwrap().contains_key("Vehicle"));
    }

    #[test]
    fn overlay_replaces_existing_leaf_metadata() {
        let doc = serde_json::json!({
            "Speed": { "type": "sensor", "datatype": "float", "uuid": "l1", "unit": "km/h" }
        });
        let mut tree = load_tree(&doc).unwrap();
        let overlay = serde_json::json!({
            "Speed": { "type": "sensor", "datatype": "float", "uuid": "l1", "unit": "mph" }
        });
        merge_overlay(&mut tree, &overlay).unwrap();
        assert_eq!(
            tree.children().unwrap().get("Speed").unwrap().metadata().unwrap().unit,
            Some("mph".to_string())
        );
    }
}
