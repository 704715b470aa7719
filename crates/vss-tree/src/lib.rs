// SPDX-License-Identifier: MIT OR Apache-2.0
//! The Signal Tree (§4.3): in-memory metadata + data storage, traversal,
//! wildcard expansion, and the monotonic timestamp source.

pub mod loader;

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use serde_json::{Map, Value as JsonValue};
use vss_error::BrokerError;
use vss_path::{Path, WILDCARD};
use vss_types::{check, Attribute, DataSlot, Datapoint, Datatype, LeafKind, Metadata, Node, Timestamp};

/// The in-memory signal tree. Cheap to clone (wraps an `Arc`-free
/// `RwLock` directly; callers share one instance behind their own `Arc`,
/// mirroring how the daemon shares its broker context).
pub struct SignalTree {
    root: RwLock<Node>,
    clock: AtomicI64,
}

/// A single `(path, value-at-that-time)` result from a read.
#[derive(Debug, Clone)]
pub struct Reading {
    pub path: Path,
    pub datapoint: Option<Datapoint>,
}

impl SignalTree {
    /// Build a tree from an already-loaded root, materializing attribute
    /// defaults into the `value` slot (§4.3 "Default propagation").
    pub fn new(mut root: Node) -> Self {
        let ts = Timestamp::now();
        propagate_defaults(&mut root, ts);
        SignalTree {
            root: RwLock::new(root),
            clock: AtomicI64::new(0),
        }
    }

    /// Issue a timestamp strictly greater than every previously issued one,
    /// even across signals, so two writes racing on the same tick never
    /// appear simultaneous (§5 concurrency note).
    pub fn next_timestamp(&self) -> Timestamp {
        let now = Timestamp::now().nanos();
        let issued = self.clock.fetch_add(1, Ordering::Relaxed) + 1;
        Timestamp::from_nanos(now.max(issued))
    }

    fn resolve<'a>(node: &'a Node, segments: &[String]) -> Option<&'a Node> {
        match segments.split_first() {
            None => Some(node),
            Some((head, rest)) => {
                let children = node.children()?;
                SignalTree::resolve(children.get(head)?, rest)
            }
        }
    }

    fn resolve_mut<'a>(node: &'a mut Node, segments: &[String]) -> Option<&'a mut Node> {
        match segments.split_first() {
            None => Some(node),
            Some((head, rest)) => {
                let children = node.children_mut()?;
                SignalTree::resolve_mut(children.get_mut(head)?, rest)
            }
        }
    }

    /// Collect every concrete (non-wildcard) path matching `path`, in tree
    /// order. A path with no wildcard segment resolves to at most one
    /// match; a wildcard segment fans out over every child at that depth.
    pub fn expand(&self, path: &Path) -> Vec<Path> {
        let root = self.root.read().expect("tree lock poisoned");
        let mut out = Vec::new();
        expand_rec(&root, path.segments(), Vec::new(), path.is_legacy(), &mut out);
        out
    }

    pub fn exists(&self, path: &Path) -> bool {
        !self.expand(path).is_empty()
    }

    pub fn is_readable(&self, path: &Path) -> bool {
        let matches = self.expand(path);
        if matches.is_empty() {
            return false;
        }
        let root = self.root.read().expect("tree lock poisoned");
        matches
            .iter()
            .all(|p| SignalTree::resolve(&root, p.segments()).is_some_and(Node::is_leaf))
    }

    pub fn is_writable(&self, path: &Path) -> bool {
        let root = self.root.read().expect("tree lock poisoned");
        match SignalTree::resolve(&root, path.segments()) {
            Some(node) => node.leaf_kind().is_some_and(LeafKind::is_writable_kind),
            None => false,
        }
    }

    /// `true` iff `path` resolves to exactly one leaf for which
    /// `attribute` is a meaningful slot: `targetValue` only on actuators,
    /// `value` on any leaf.
    pub fn is_attributable(&self, path: &Path, attribute: Attribute) -> bool {
        let root = self.root.read().expect("tree lock poisoned");
        match SignalTree::resolve(&root, path.segments()) {
            Some(node @ Node::Leaf { .. }) => match attribute {
                Attribute::Value => true,
                Attribute::Target => matches!(node.leaf_kind(), Some(LeafKind::Actuator)),
            },
            _ => false,
        }
    }

    pub fn datatype_of(&self, path: &Path) -> Option<Datatype> {
        let root = self.root.read().expect("tree lock poisoned");
        SignalTree::resolve(&root, path.segments())
            .and_then(Node::metadata)
            .map(|m| m.datatype.clone())
    }

    /// All concrete leaf paths reachable under `path` (inclusive of `path`
    /// itself if it is already a leaf). `path` must not contain a wildcard;
    /// use [`SignalTree::leaves_matching`] for wildcard queries.
    pub fn leaves(&self, path: &Path) -> Vec<Path> {
        let root = self.root.read().expect("tree lock poisoned");
        let Some(start) = SignalTree::resolve(&root, path.segments()) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        collect_leaves(start, path.clone(), &mut out);
        out
    }

    /// Every leaf reachable under `path`, expanding any wildcard segment
    /// first and then descending into branches (§4.9 `get` dispatch).
    pub fn leaves_matching(&self, path: &Path) -> Vec<Path> {
        if !path.has_wildcard() {
            return self.leaves(path);
        }
        self.expand(path).iter().flat_map(|p| self.leaves(p)).collect()
    }

    /// Read the current value of a single concrete leaf's `attribute` slot.
    pub fn get_signal(&self, path: &Path, attribute: Attribute) -> Result<Reading, BrokerError> {
        let root = self.root.read().expect("tree lock poisoned");
        let node = SignalTree::resolve(&root, path.segments())
            .ok_or_else(|| BrokerError::PathNotFound(path.render()))?;
        match node {
            Node::Leaf { kind, data, .. } => {
                if attribute == Attribute::Target && *kind != LeafKind::Actuator {
                    return Err(BrokerError::NotAttributable { path: path.render() });
                }
                Ok(Reading {
                    path: path.clone(),
                    datapoint: data.get(attribute).cloned(),
                })
            }
            Node::Branch { .. } => Err(BrokerError::NotReadable(path.render())),
        }
    }

    /// Type-check and write a new value into a concrete leaf's `attribute`
    /// slot, stamping it with a freshly issued monotonic timestamp, and
    /// return the stamped datapoint for the caller to publish.
    pub fn set_signal(
        &self,
        path: &Path,
        attribute: Attribute,
        raw: &JsonValue,
    ) -> Result<Datapoint, BrokerError> {
        let ts = self.next_timestamp();
        let mut root = self.root.write().expect("tree lock poisoned");
        let node = SignalTree::resolve_mut(&mut root, path.segments())
            .ok_or_else(|| BrokerError::PathNotFound(path.render()))?;
        match node {
            Node::Leaf { kind, meta, data } => {
                match attribute {
                    Attribute::Value if !kind.is_writable_kind() => {
                        return Err(BrokerError::NotWritable(path.render()));
                    }
                    Attribute::Target if *kind != LeafKind::Actuator => {
                        return Err(BrokerError::NotAttributable { path: path.render() });
                    }
                    _ => {}
                }
                let value = check(meta, raw)?;
                let dp = Datapoint::new(value, ts);
                data.set(attribute, dp.clone());
                Ok(dp)
            }
            Node::Branch { .. } => Err(BrokerError::NotWritable(path.render())),
        }
    }

    /// A single leaf's own metadata (used internally by `updateMetaData`;
    /// prefer [`SignalTree::get_metadata_tree`] for the client-facing
    /// `getMetaData` action, which also handles branches and wildcards).
    pub fn get_metadata(&self, path: &Path) -> Result<Metadata, BrokerError> {
        let root = self.root.read().expect("tree lock poisoned");
        match SignalTree::resolve(&root, path.segments()) {
            Some(Node::Leaf { meta, .. }) => Ok(meta.clone()),
            Some(Node::Branch { .. }) => Err(BrokerError::NotAttributable {
                path: path.render(),
            }),
            None => Err(BrokerError::PathNotFound(path.render())),
        }
    }

    /// The smallest metadata subtree rooted at `path` (§4.3): a leaf's own
    /// metadata object when `path` names one leaf, the reconstructed
    /// branch/children skeleton containing every matched leaf when `path`
    /// contains a wildcard, or the full subtree document when `path` names
    /// a branch directly.
    pub fn get_metadata_tree(&self, path: &Path) -> Result<JsonValue, BrokerError> {
        let root = self.root.read().expect("tree lock poisoned");
        if path.has_wildcard() {
            let matches = {
                let mut out = Vec::new();
                expand_rec(&root, path.segments(), Vec::new(), path.is_legacy(), &mut out);
                out
            };
            if matches.is_empty() {
                return Err(BrokerError::PathNotFound(path.render()));
            }
            let mut out = Map::new();
            for m in &matches {
                insert_metadata_path(&root, m.segments(), &mut out)?;
            }
            return Ok(JsonValue::Object(out));
        }
        match SignalTree::resolve(&root, path.segments()) {
            Some(node) => Ok(render_node(node)),
            None => Err(BrokerError::PathNotFound(path.render())),
        }
    }

    /// Shallow-merge a JSON patch into a single leaf's metadata in place
    /// (datatype and uuid are immutable once set).
    pub fn update_metadata(&self, path: &Path, raw: &JsonValue) -> Result<Metadata, BrokerError> {
        let mut root = self.root.write().expect("tree lock poisoned");
        let node = SignalTree::resolve_mut(&mut root, path.segments())
            .ok_or_else(|| BrokerError::PathNotFound(path.render()))?;
        let Node::Leaf { meta, .. } = node else {
            return Err(BrokerError::NotAttributable {
                path: path.render(),
            });
        };
        let patch = raw
            .as_object()
            .ok_or_else(|| BrokerError::BadRequest("metadata patch must be an object".into()))?;
        let mut merged = meta.to_json();
        let merged_obj = merged.as_object_mut().expect("metadata renders as object");
        for (k, v) in patch {
            merged_obj.insert(k.clone(), v.clone());
        }
        let updated = Metadata::from_json(meta.datatype.clone(), meta.uuid.clone(), merged_obj)?;
        *meta = updated;
        Ok(meta.clone())
    }

    /// Deep-merge a tree-definition overlay document into the whole tree,
    /// then materialize defaults for any newly-attributed leaf (§4.3).
    pub fn update_vss_tree(&self, doc: &JsonValue) -> Result<(), BrokerError> {
        let ts = self.next_timestamp();
        let mut root = self.root.write().expect("tree lock poisoned");
        loader::merge_overlay(&mut root, doc)?;
        propagate_defaults(&mut root, ts);
        Ok(())
    }
}

/// Recursively materialize each attribute leaf's `default` into its
/// `value` slot, if that slot is still unpopulated (§4.3).
fn propagate_defaults(node: &mut Node, ts: Timestamp) {
    match node {
        Node::Leaf { kind, meta, data } => {
            if *kind == LeafKind::Attribute && data.value.is_none() {
                if let Some(default) = meta.default.clone() {
                    data.value = Some(Datapoint::new(default, ts));
                }
            }
        }
        Node::Branch { children, .. } => {
            for child in children.values_mut() {
                propagate_defaults(child, ts);
            }
        }
    }
}

fn render_node(node: &Node) -> JsonValue {
    match node {
        Node::Leaf { kind, meta, .. } => {
            let mut obj = meta.to_json().as_object().cloned().unwrap_or_default();
            obj.insert("type".into(), JsonValue::String(kind.to_string()));
            JsonValue::Object(obj)
        }
        Node::Branch {
            children,
            description,
            uuid,
        } => {
            let mut obj = Map::new();
            obj.insert("type".into(), JsonValue::String("branch".into()));
            obj.insert("uuid".into(), JsonValue::String(uuid.clone()));
            if let Some(d) = description {
                obj.insert("description".into(), JsonValue::String(d.clone()));
            }
            let rendered_children: Map<String, JsonValue> = children
                .iter()
                .map(|(name, child)| (name.clone(), render_node(child)))
                .collect();
            obj.insert("children".into(), JsonValue::Object(rendered_children));
            JsonValue::Object(obj)
        }
    }
}

/// Insert the metadata skeleton for one concrete leaf path into `out`,
/// merging with any sibling paths already inserted so a batch of matches
/// reconstructs a single shared branch/children tree.
fn insert_metadata_path(
    node: &Node,
    segments: &[String],
    out: &mut Map<String, JsonValue>,
) -> Result<(), BrokerError> {
    let (head, rest) = segments
        .split_first()
        .expect("leaf path has at least one segment");
    let children = node
        .children()
        .ok_or_else(|| BrokerError::Internal("expected branch while reconstructing metadata".into()))?;
    let child = children
        .get(head)
        .ok_or_else(|| BrokerError::PathNotFound(head.clone()))?;

    if rest.is_empty() {
        out.insert(head.clone(), render_node(child));
        return Ok(());
    }

    let entry = out.entry(head.clone()).or_insert_with(|| match child {
        Node::Branch { description, uuid, .. } => {
            let mut obj = Map::new();
            obj.insert("type".into(), JsonValue::String("branch".into()));
            obj.insert("uuid".into(), JsonValue::String(uuid.clone()));
            if let Some(d) = description {
                obj.insert("description".into(), JsonValue::String(d.clone()));
            }
            obj.insert("children".into(), JsonValue::Object(Map::new()));
            JsonValue::Object(obj)
        }
        Node::Leaf { .. } => JsonValue::Object(Map::new()),
    });
    let children_slot = entry
        .as_object_mut()
        .and_then(|o| o.get_mut("children"))
        .and_then(JsonValue::as_object_mut)
        .ok_or_else(|| BrokerError::Internal("metadata reconstruction lost children map".into()))?;
    insert_metadata_path(child, rest, children_slot)
}

fn expand_rec(
    node: &Node,
    remaining: &[String],
    prefix: Vec<String>,
    legacy: bool,
    out: &mut Vec<Path>,
) {
    match remaining.split_first() {
        None => out.push(Path::from_segments(prefix, legacy)),
        Some((head, rest)) => {
            let Some(children) = node.children() else {
                return;
            };
            if head == WILDCARD {
                for (name, child) in children {
                    let mut next = prefix.clone();
                    next.push(name.clone());
                    expand_rec(child, rest, next, legacy, out);
                }
            } else if let Some(child) = children.get(head) {
                let mut next = prefix.clone();
                next.push(head.clone());
                expand_rec(child, rest, next, legacy, out);
            }
        }
    }
}

fn collect_leaves(node: &Node, path: Path, out: &mut Vec<Path>) {
    match node {
        Node::Leaf { .. } => out.push(path),
        Node::Branch { children, .. } => {
            for (name, child) in children {
                collect_leaves(child, path.join(name), out);
            }
        }
    }
}
