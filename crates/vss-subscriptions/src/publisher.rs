// SPDX-License-Identifier: MIT OR Apache-2.0
//! The Publisher Loop (§4.7): a single dedicated thread that drains
//! published value changes and fans each out to matching subscribers.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::queue::{PublishJob, PublishQueue};
use crate::registry::SubscriptionRegistry;
use crate::{Notification, Republisher};

/// Handle to the background publisher thread. Dropping it does not stop
/// the thread; call [`PublisherLoop::shutdown`] explicitly.
pub struct PublisherLoop {
    queue: Arc<PublishQueue>,
    handle: Option<JoinHandle<()>>,
}

impl PublisherLoop {
    /// Spawn the dedicated publisher thread. Every enqueued [`PublishJob`]
    /// is matched against `registry` and handed to each matching
    /// subscriber's sink, then offered to `republisher` for any external
    /// bridge (§9: `updateByPath` hook; a no-op by default).
    pub fn spawn(registry: Arc<SubscriptionRegistry>, republisher: Arc<dyn Republisher>) -> Self {
        let queue = Arc::new(PublishQueue::new());
        let worker_queue = Arc::clone(&queue);
        let handle = thread::Builder::new()
            .name("vss-publisher".into())
            .spawn(move || run(worker_queue, registry, republisher))
            .expect("failed to spawn publisher thread");
        PublisherLoop {
            queue,
            handle: Some(handle),
        }
    }

    /// Enqueue a value change for delivery.
    pub fn publish(&self, job: PublishJob) {
        self.queue.push(job);
    }

    /// Signal the thread to drain remaining jobs and exit, then join it.
    pub fn shutdown(mut self) {
        self.queue.shutdown();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(queue: Arc<PublishQueue>, registry: Arc<SubscriptionRegistry>, republisher: Arc<dyn Republisher>) {
    while let Some(job) = queue.pop() {
        republisher.republish(&job.path, &job.datapoint);
        for (subscription_id, session_id, sink) in registry.matching(&job.path, job.attribute) {
            let delivered = sink.notify(Notification {
                subscription_id,
                path: job.path.clone(),
                attribute: job.attribute,
                datapoint: job.datapoint.clone(),
            });
            if !delivered {
                tracing::warn!(session = %session_id, "sink gone, tearing down its subscriptions");
                registry.unsubscribe_all(&session_id);
            }
        }
    }
    tracing::debug!("publisher thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Attribute, NoopRepublisher, Notification, Sink};
    use std::sync::mpsc;
    use vss_path::Path;
    use vss_types::{Datapoint, Timestamp, Value};

    struct ChannelSink(mpsc::Sender<Notification>);
    impl Sink for ChannelSink {
        fn notify(&self, n: Notification) -> bool {
            self.0.send(n).is_ok()
        }
    }

    #[test]
    fn published_job_reaches_matching_subscriber() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let (tx, rx) = mpsc::channel();
        registry.subscribe(
            Path::parse("Vehicle.Speed").unwrap(),
            Attribute::Value,
            Arc::new(ChannelSink(tx)),
            "conn-1",
        );
        let publisher = PublisherLoop::spawn(Arc::clone(&registry), Arc::new(NoopRepublisher));
        publisher.publish(PublishJob {
            path: Path::parse("Vehicle.Speed").unwrap(),
            attribute: Attribute::Value,
            datapoint: Datapoint::new(Value::Float(88.0), Timestamp::epoch_zero()),
        });
        let notification = rx.recv_timeout(std::time::Duration::from_secs(1)).unwrap();
        assert_eq!(notification.datapoint.value, Value::Float(88.0));
        publisher.shutdown();
    }

    struct DeadSink;
    impl Sink for DeadSink {
        fn notify(&self, _n: Notification) -> bool {
            false
        }
    }

    #[test]
    fn a_dead_sink_tears_down_every_subscription_its_session_owned() {
        let registry = Arc::new(SubscriptionRegistry::new());
        registry.subscribe(
            Path::parse("Vehicle.Speed").unwrap(),
            Attribute::Value,
            Arc::new(DeadSink),
            "conn-1",
        );
        registry.subscribe(
            Path::parse("Vehicle.Cabin").unwrap(),
            Attribute::Value,
            Arc::new(DeadSink),
            "conn-1",
        );
        assert_eq!(registry.len(), 2);

        let publisher = PublisherLoop::spawn(Arc::clone(&registry), Arc::new(NoopRepublisher));
        publisher.publish(PublishJob {
            path: Path::parse("Vehicle.Speed").unwrap(),
            attribute: Attribute::Value,
            datapoint: Datapoint::new(Value::Float(1.0), Timestamp::epoch_zero()),
        });
        publisher.shutdown();

        assert_eq!(registry.len(), 0);
    }
}
