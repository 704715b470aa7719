// SPDX-License-Identifier: MIT OR Apache-2.0
//! The Permission Resolver (§4.4): wildcard path permission maps granted by
//! a bearer token's claims.

use regex::Regex;
use vss_error::BrokerError;
use vss_path::Path;

/// The access a token grants for a matched path pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
    ReadWrite,
}

impl AccessMode {
    pub fn parse(tag: &str) -> Result<Self, BrokerError> {
        match tag.to_ascii_lowercase().as_str() {
            "r" => Ok(AccessMode::Read),
            "w" => Ok(AccessMode::Write),
            "rw" | "wr" => Ok(AccessMode::ReadWrite),
            other => Err(BrokerError::BadRequest(format!(
                "unrecognized access mode '{other}'"
            ))),
        }
    }

    pub fn allows_read(&self) -> bool {
        matches!(self, AccessMode::Read | AccessMode::ReadWrite)
    }

    pub fn allows_write(&self) -> bool {
        matches!(self, AccessMode::Write | AccessMode::ReadWrite)
    }
}

fn normalize(raw: &str) -> String {
    raw.replace('/', ".")
}

struct PermissionEntry {
    /// Pre-normalized (dot-delimited) pattern, used for literal comparison.
    normalized: String,
    /// Present only when the pattern contains a `*`.
    regex: Option<Regex>,
    mode: AccessMode,
}

impl PermissionEntry {
    fn new(pattern: &str, mode: AccessMode) -> Result<Self, BrokerError> {
        let normalized = normalize(pattern);
        let regex = if normalized.contains('*') {
            let escaped: Vec<String> = normalized.split('*').map(regex::escape).collect();
            let pattern_str = format!("^{}$", escaped.join(".*"));
            Some(Regex::new(&pattern_str).map_err(|e| {
                BrokerError::BadRequest(format!("invalid permission pattern '{pattern}': {e}"))
            })?)
        } else {
            None
        };
        Ok(PermissionEntry {
            normalized,
            regex,
            mode,
        })
    }

    fn is_wildcard(&self) -> bool {
        self.regex.is_some()
    }

    fn matches(&self, candidate: &str) -> bool {
        match &self.regex {
            Some(re) => re.is_match(candidate),
            None => self.normalized == candidate,
        }
    }
}

/// An ordered set of path-pattern -> access-mode grants, resolved per the
/// "literal exact match first, then wildcards in declaration order, first
/// match wins" rule.
pub struct PermissionMap {
    entries: Vec<PermissionEntry>,
}

impl PermissionMap {
    /// Build a permission map from a token's claim object, e.g.
    /// `{"Vehicle.Speed": "r", "Vehicle.Cabin.*": "rw"}`.
    pub fn from_claims(claims: &serde_json::Map<String, serde_json::Value>) -> Result<Self, BrokerError> {
        let mut entries = Vec::with_capacity(claims.len());
        for (pattern, mode_raw) in claims {
            let mode_tag = mode_raw.as_str().ok_or_else(|| {
                BrokerError::BadRequest(format!(
                    "permission entry for '{pattern}' must be a string access mode"
                ))
            })?;
            entries.push(PermissionEntry::new(pattern, AccessMode::parse(mode_tag)?)?);
        }
        Ok(PermissionMap { entries })
    }

    pub fn empty() -> Self {
        PermissionMap { entries: Vec::new() }
    }

    /// Resolve the access granted for a concrete signal path, or `None` if
    /// no grant covers it.
    ///
    /// A literal match, if any, always wins. Among wildcard patterns, the
    /// *last* matching entry wins: `AccessChecker::checkSignalAccess` has no
    /// `break` in its wildcard scan, so every matching pattern overwrites
    /// the previous one in turn.
    pub fn resolve(&self, path: &Path) -> Option<AccessMode> {
        let candidate = normalize(&path.to_slashed());
        self.entries
            .iter()
            .filter(|e| !e.is_wildcard())
            .find(|e| e.matches(&candidate))
            .or_else(|| {
                self.entries
                    .iter()
                    .filter(|e| e.is_wildcard())
                    .fold(None, |last, e| if e.matches(&candidate) { Some(e) } else { last })
            })
            .map(|e| e.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> PermissionMap {
        let mut obj = serde_json::Map::new();
        for (pattern, mode) in entries {
            obj.insert(pattern.to_string(), serde_json::json!(mode));
        }
        PermissionMap::from_claims(&obj).unwrap()
    }

    #[test]
    fn literal_pattern_grants_exact_path_only() {
        let m = map(&[("Vehicle.Speed", "r")]);
        assert_eq!(
            m.resolve(&Path::parse("Vehicle/Speed").unwrap()),
            Some(AccessMode::Read)
        );
        assert_eq!(m.resolve(&Path::parse("Vehicle/Acceleration").unwrap()), None);
    }

    #[test]
    fn wildcard_pattern_grants_every_descendant() {
        let m = map(&[("Vehicle.Cabin.*", "rw")]);
        assert_eq!(
            m.resolve(&Path::parse("Vehicle/Cabin/Door/IsOpen").unwrap()),
            Some(AccessMode::ReadWrite)
        );
    }

    #[test]
    fn literal_match_takes_priority_over_a_wildcard() {
        let m = map(&[("Vehicle.*", "r"), ("Vehicle.Speed", "rw")]);
        assert_eq!(
            m.resolve(&Path::parse("Vehicle/Speed").unwrap()),
            Some(AccessMode::ReadWrite)
        );
    }

    #[test]
    fn last_matching_wildcard_wins_among_overlapping_wildcards() {
        let m = map(&[("Vehicle.*", "r"), ("Vehicle.Cabin.*", "rw")]);
        assert_eq!(
            m.resolve(&Path::parse("Vehicle/Cabin/Door/IsOpen").unwrap()),
            Some(AccessMode::ReadWrite)
        );
    }

    #[test]
    fn unmatched_path_has_no_grant() {
        let m = map(&[("Vehicle.Speed", "r")]);
        assert_eq!(m.resolve(&Path::parse("Vehicle/Cabin").unwrap()), None);
    }
}
