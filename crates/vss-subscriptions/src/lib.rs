// SPDX-License-Identifier: MIT OR Apache-2.0
//! Subscription registry and publisher loop (§4.6, §4.7).

pub mod publisher;
pub mod queue;
pub mod registry;

use vss_path::Path;
use vss_types::Datapoint;

pub use publisher::PublisherLoop;
pub use queue::PublishJob;
pub use registry::SubscriptionRegistry;
pub use vss_types::Attribute;

/// One delivered change, addressed to a specific subscription.
#[derive(Debug, Clone)]
pub struct Notification {
    pub subscription_id: uuid::Uuid,
    pub path: Path,
    pub attribute: Attribute,
    pub datapoint: Datapoint,
}

/// A per-client delivery target. Implemented by the transport layer (e.g.
/// a WebSocket writer) so this crate stays transport-agnostic.
///
/// Returns `false` when the underlying connection is gone so the publisher
/// loop can tear down every subscription the dead session still owns
/// (§4.7: "if the transport reports that the session is gone, the loop
/// invokes `unsubscribeAll` for that session").
pub trait Sink: Send + Sync {
    fn notify(&self, notification: Notification) -> bool;
}

/// External republish hook (§9 supplemented `updateByPath` bridge): invoked
/// for every published change before subscriber fan-out. The default is a
/// no-op; a real bridge to an external bus is out of scope.
pub trait Republisher: Send + Sync {
    fn republish(&self, path: &Path, datapoint: &Datapoint);
}

/// The do-nothing [`Republisher`] used when no external bridge is wired up.
pub struct NoopRepublisher;

impl Republisher for NoopRepublisher {
    fn republish(&self, _path: &Path, _datapoint: &Datapoint) {}
}
