// SPDX-License-Identifier: MIT OR Apache-2.0
//! Canonical VSS path handling (§4.1).
//!
//! A [`Path`] has three equivalent projections — dot-delimited legacy,
//! slash-delimited canonical, and a `children`-interleaved query form used
//! internally by the signal tree for traversal. Construction accepts any of
//! the three input forms; rendering preserves whichever convention the
//! caller used, so responses can echo it back.

#![deny(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::fmt;
use vss_error::BrokerError;

/// Segment that matches any single child name during tree traversal.
pub const WILDCARD: &str = "*";

/// A canonical, validated VSS path.
///
/// Equality and hashing are defined on the canonical slash form; the
/// `legacy` flag only affects rendering, not comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Path {
    segments: Vec<String>,
    legacy: bool,
}

impl Path {
    /// Parse a path from any of the three accepted string forms.
    ///
    /// A string containing `/` is treated as slash-delimited (canonical);
    /// otherwise it is treated as dot-delimited (legacy). Empty segments
    /// (leading/trailing/doubled separators) are rejected.
    pub fn parse(raw: &str) -> Result<Self, BrokerError> {
        if raw.is_empty() {
            return Err(BrokerError::InvalidPath("empty path".into()));
        }
        let legacy = !raw.contains('/');
        let sep = if legacy { '.' } else { '/' };
        let segments: Vec<String> = raw.split(sep).map(str::to_string).collect();

        if segments.iter().any(|s| s.is_empty()) {
            return Err(BrokerError::InvalidPath(format!(
                "malformed path '{raw}': empty segment"
            )));
        }
        for seg in &segments {
            if seg.len() > 1 && seg.contains('*') {
                return Err(BrokerError::InvalidPath(format!(
                    "malformed path '{raw}': '*' must be a whole segment"
                )));
            }
        }

        Ok(Self { segments, legacy })
    }

    /// Build a path directly from already-validated segments.
    pub fn from_segments(segments: Vec<String>, legacy: bool) -> Self {
        Self { segments, legacy }
    }

    /// The path's segments in root-to-leaf order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// `true` if this path was constructed from the dotted legacy form.
    pub fn is_legacy(&self) -> bool {
        self.legacy
    }

    /// `true` if any segment is the wildcard `*`.
    pub fn has_wildcard(&self) -> bool {
        self.segments.iter().any(|s| s == WILDCARD)
    }

    /// Dot-delimited legacy rendering, e.g. `Vehicle.Acceleration.Vertical`.
    pub fn to_dotted(&self) -> String {
        self.segments.join(".")
    }

    /// Slash-delimited canonical rendering, e.g. `Vehicle/Acceleration/Vertical`.
    pub fn to_slashed(&self) -> String {
        self.segments.join("/")
    }

    /// Render in whichever convention this path originated from.
    pub fn render(&self) -> String {
        if self.legacy {
            self.to_dotted()
        } else {
            self.to_slashed()
        }
    }

    /// Query-path form used by the tree for internal traversal: segments
    /// interleaved with the `children` tag, rooted at `$`.
    ///
    /// e.g. `Vehicle.Speed` becomes `$['Vehicle']['children']['Speed']`.
    pub fn to_query_path(&self) -> String {
        let mut out = String::from("$");
        let last = self.segments.len() - 1;
        for (i, seg) in self.segments.iter().enumerate() {
            if seg == WILDCARD {
                out.push_str("[*]");
            } else {
                out.push('[');
                out.push('\'');
                out.push_str(seg);
                out.push('\'');
                out.push(']');
            }
            if i != last {
                out.push_str("['children']");
            }
        }
        out
    }

    /// Append a child segment, producing a new path with the same origin convention.
    pub fn join(&self, child: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(child.to_string());
        Self {
            segments,
            legacy: self.legacy,
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_slashed())
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}
impl Eq for Path {}

impl std::hash::Hash for Path {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.segments.hash(state);
    }
}

impl std::str::FromStr for Path {
    type Err = BrokerError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dotted_form_as_legacy() {
        let p = Path::parse("Vehicle.Acceleration.Vertical").unwrap();
        assert!(p.is_legacy());
        assert_eq!(p.to_slashed(), "Vehicle/Acceleration/Vertical");
        assert_eq!(p.render(), "Vehicle.Acceleration.Vertical");
    }

    #[test]
    fn parses_slashed_form_as_canonical() {
        let p = Path::parse("Vehicle/Acceleration/Vertical").unwrap();
        assert!(!p.is_legacy());
        assert_eq!(p.to_dotted(), "Vehicle.Acceleration.Vertical");
        assert_eq!(p.render(), "Vehicle/Acceleration/Vertical");
    }

    #[test]
    fn equality_ignores_origin_convention() {
        let a = Path::parse("Vehicle.Speed").unwrap();
        let b = Path::parse("Vehicle/Speed").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_empty_path() {
        assert!(Path::parse("").is_err());
    }

    #[test]
    fn rejects_doubled_separator() {
        assert!(Path::parse("Vehicle..Speed").is_err());
        assert!(Path::parse("Vehicle//Speed").is_err());
    }

    #[test]
    fn rejects_leading_and_trailing_separator() {
        assert!(Path::parse(".Vehicle.Speed").is_err());
        assert!(Path::parse("Vehicle.Speed.").is_err());
    }

    #[test]
    fn wildcard_segment_is_accepted() {
        let p = Path::parse("Vehicle/Acceleration/*").unwrap();
        assert!(p.has_wildcard());
    }

    #[test]
    fn wildcard_must_be_whole_segment() {
        assert!(Path::parse("Vehicle/Accel*ation").is_err());
    }

    #[test]
    fn query_path_interleaves_children() {
        let p = Path::parse("Vehicle.Speed").unwrap();
        assert_eq!(p.to_query_path(), "$['Vehicle']['children']['Speed']");
    }

    #[test]
    fn query_path_single_segment_has_no_children_suffix() {
        let p = Path::parse("Vehicle").unwrap();
        assert_eq!(p.to_query_path(), "$['Vehicle']");
    }
}

#[cfg(test)]
mod boundary_properties {
    use super::*;
    use proptest::prelude::*;

    fn segment() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9]{0,9}"
    }

    proptest! {
        #[test]
        fn dotted_and_slashed_forms_of_the_same_segments_are_equal(
            segs in prop::collection::vec(segment(), 1..6)
        ) {
            let dotted = Path::parse(&segs.join(".")).unwrap();
            let slashed = Path::parse(&segs.join("/")).unwrap();
            prop_assert_eq!(dotted, slashed);
        }

        #[test]
        fn render_round_trips_through_parse(
            segs in prop::collection::vec(segment(), 1..6)
        ) {
            let original = Path::parse(&segs.join("/")).unwrap();
            let reparsed = Path::parse(&original.render()).unwrap();
            prop_assert_eq!(original, reparsed);
        }

        #[test]
        fn query_path_always_has_one_fewer_children_tag_than_segments(
            segs in prop::collection::vec(segment(), 1..6)
        ) {
            let p = Path::parse(&segs.join("/")).unwrap();
            let tag_count = p.to_query_path().matches("['children']").count();
            prop_assert_eq!(tag_count, segs.len() - 1);
        }
    }
}
