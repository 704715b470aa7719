// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-connection session state (§3 Session): owned by the transport,
//! borrowed by the Request Processor. Holds the last-validated token and
//! its resolved permissions behind a lock, since `authorize` can arrive at
//! any point in a connection's lifetime and re-resolve them.

use std::sync::RwLock;

use vss_auth::{AccessMode, Session as AuthSession};
use vss_path::Path;

/// A transport connection's authorization state.
///
/// The core never owns a `SessionState`; the transport layer constructs
/// one per connection and passes it by reference into
/// [`crate::RequestProcessor::handle`] (§5: "the core holds only borrowed
/// handles").
pub struct SessionState {
    /// Stable identifier assigned by the transport layer, used as the
    /// subscription registry's session key.
    connection_id: String,
    /// A tag naming the transport this session arrived over (e.g.
    /// `"websocket"`), carried for §3's "transport tag" field.
    transport: String,
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    auth: Option<AuthSession>,
}

impl SessionState {
    pub fn new(connection_id: impl Into<String>, transport: impl Into<String>) -> Self {
        SessionState {
            connection_id: connection_id.into(),
            transport: transport.into(),
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn transport(&self) -> &str {
        &self.transport
    }

    /// `true` once a token has been validated and not since invalidated.
    pub fn is_authorized(&self) -> bool {
        self.inner
            .read()
            .expect("session lock poisoned")
            .auth
            .as_ref()
            .is_some_and(AuthSession::is_still_valid)
    }

    /// Install a freshly validated token's session (§4.5 `validate`).
    pub fn install(&self, auth: AuthSession) {
        self.inner.write().expect("session lock poisoned").auth = Some(auth);
    }

    /// Drop any installed authorization, e.g. after `isStillValid` fails.
    pub fn clear(&self) {
        self.inner.write().expect("session lock poisoned").auth = None;
    }

    /// The access this session's token grants for `path`, or `None` if
    /// unauthorized or no grant covers it.
    pub fn permission(&self, path: &Path) -> Option<AccessMode> {
        self.inner
            .read()
            .expect("session lock poisoned")
            .auth
            .as_ref()
            .filter(|a| a.is_still_valid())
            .and_then(|a| a.permissions.resolve(path))
    }

    /// Whether this session's token asserted the tree-modification
    /// capability (§4.4), required for `updateMetaData`/`updateVSSTree`.
    pub fn modify_tree_capability(&self) -> bool {
        self.inner
            .read()
            .expect("session lock poisoned")
            .auth
            .as_ref()
            .is_some_and(|a| a.is_still_valid() && a.modify_tree)
    }
}
