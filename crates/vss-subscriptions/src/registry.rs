// SPDX-License-Identifier: MIT OR Apache-2.0
//! The Subscription Registry (§4.6): `(path, attribute)` -> subscribers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;
use vss_error::BrokerError;
use vss_path::Path;

use crate::{Attribute, Notification, Sink};

struct Entry {
    path: Path,
    attribute: Attribute,
    sink: Arc<dyn Sink>,
    /// The owning session's stable connection identifier (§3 Session),
    /// used by [`SubscriptionRegistry::unsubscribe_all`] when a session
    /// closes.
    session_id: String,
}

/// Tracks every live subscription and its target `(path, attribute)` key.
///
/// A single mutex guards both directions of the index; subscription churn
/// is not expected to be hot enough to warrant finer-grained locking.
pub struct SubscriptionRegistry {
    by_id: Mutex<HashMap<Uuid, Entry>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        SubscriptionRegistry {
            by_id: Mutex::new(HashMap::new()),
        }
    }

    /// Register a new subscription, returning its UUIDv4 identifier.
    pub fn subscribe(
        &self,
        path: Path,
        attribute: Attribute,
        sink: Arc<dyn Sink>,
        session_id: impl Into<String>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let mut map = self.by_id.lock().expect("registry lock poisoned");
        map.insert(
            id,
            Entry {
                path,
                attribute,
                sink,
                session_id: session_id.into(),
            },
        );
        id
    }

    /// Remove a subscription by id.
    pub fn unsubscribe(&self, id: Uuid) -> Result<(), BrokerError> {
        let mut map = self.by_id.lock().expect("registry lock poisoned");
        map.remove(&id)
            .map(|_| ())
            .ok_or_else(|| BrokerError::BadRequest(format!("unknown subscription '{id}'")))
    }

    /// Remove every subscription owned by `session_id` (§4.6: a closed
    /// session's registrations are torn down together). Returns the count
    /// removed; calling this twice for the same session is a harmless
    /// no-op the second time (§8 idempotent teardown).
    pub fn unsubscribe_all(&self, session_id: &str) -> usize {
        let mut map = self.by_id.lock().expect("registry lock poisoned");
        let before = map.len();
        map.retain(|_, entry| entry.session_id != session_id);
        before - map.len()
    }

    /// Every subscription whose `(path, attribute)` exactly matches, or
    /// whose registered path is a wildcard that covers `path`. Each match
    /// carries its owning session id so a failed delivery can be traced
    /// back to the session to tear down.
    pub(crate) fn matching(&self, path: &Path, attribute: Attribute) -> Vec<(Uuid, String, Arc<dyn Sink>)> {
        let map = self.by_id.lock().expect("registry lock poisoned");
        map.iter()
            .filter(|(_, e)| e.attribute == attribute && path_matches(&e.path, path))
            .map(|(id, e)| (*id, e.session_id.clone(), Arc::clone(&e.sink)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.lock().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn path_matches(registered: &Path, published: &Path) -> bool {
    if !registered.has_wildcard() {
        return registered == published;
    }
    let reg = registered.segments();
    let pub_segs = published.segments();
    if reg.len() != pub_segs.len() {
        return false;
    }
    reg.iter()
        .zip(pub_segs.iter())
        .all(|(r, p)| r == vss_path::WILDCARD || r == p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Notification;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink(AtomicUsize);
    impl Sink for CountingSink {
        fn notify(&self, _n: Notification) -> bool {
            self.0.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    #[test]
    fn exact_path_subscription_matches_exact_publish() {
        let registry = SubscriptionRegistry::new();
        let sink = Arc::new(CountingSink(AtomicUsize::new(0)));
        registry.subscribe(
            Path::parse("Vehicle.Speed").unwrap(),
            Attribute::Value,
            sink.clone(),
            "conn-1",
        );
        let matches = registry.matching(&Path::parse("Vehicle.Speed").unwrap(), Attribute::Value);
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn wildcard_subscription_matches_sibling_paths() {
        let registry = SubscriptionRegistry::new();
        let sink = Arc::new(CountingSink(AtomicUsize::new(0)));
        registry.subscribe(
            Path::parse("Vehicle.Cabin.*").unwrap(),
            Attribute::Value,
            sink,
            "conn-1",
        );
        let matches = registry.matching(
            &Path::parse("Vehicle.Cabin.Door").unwrap(),
            Attribute::Value,
        );
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn unsubscribe_removes_the_entry() {
        let registry = SubscriptionRegistry::new();
        let sink = Arc::new(CountingSink(AtomicUsize::new(0)));
        let id = registry.subscribe(
            Path::parse("Vehicle.Speed").unwrap(),
            Attribute::Value,
            sink,
            "conn-1",
        );
        registry.unsubscribe(id).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn unsubscribing_unknown_id_is_an_error() {
        let registry = SubscriptionRegistry::new();
        assert!(registry.unsubscribe(Uuid::new_v4()).is_err());
    }

    #[test]
    fn unsubscribe_all_tears_down_every_entry_for_a_session_and_leaves_others() {
        let registry = SubscriptionRegistry::new();
        let sink = Arc::new(CountingSink(AtomicUsize::new(0)));
        registry.subscribe(Path::parse("Vehicle.Speed").unwrap(), Attribute::Value, sink.clone(), "conn-1");
        registry.subscribe(Path::parse("Vehicle.Cabin").unwrap(), Attribute::Value, sink.clone(), "conn-1");
        registry.subscribe(Path::parse("Vehicle.Speed").unwrap(), Attribute::Value, sink, "conn-2");

        assert_eq!(registry.unsubscribe_all("conn-1"), 2);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.unsubscribe_all("conn-1"), 0);
    }
}
