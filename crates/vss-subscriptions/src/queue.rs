// SPDX-License-Identifier: MIT OR Apache-2.0
//! FIFO job queue backing the publisher loop, guarded by a condition
//! variable rather than an async channel (§5: "dedicated threads, not a
//! general async runtime").

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use vss_path::Path;
use vss_types::Datapoint;

use crate::Attribute;

/// One value-changed event to fan out to matching subscribers.
#[derive(Debug, Clone)]
pub struct PublishJob {
    pub path: Path,
    pub attribute: Attribute,
    pub datapoint: Datapoint,
}

enum Slot {
    Job(PublishJob),
    Shutdown,
}

/// A bounded-only-by-memory FIFO queue; `pop` blocks the calling thread
/// until a job is enqueued or [`PublishQueue::shutdown`] is called.
pub struct PublishQueue {
    queue: Mutex<VecDeque<Slot>>,
    not_empty: Condvar,
}

impl PublishQueue {
    pub fn new() -> Self {
        PublishQueue {
            queue: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
        }
    }

    pub fn push(&self, job: PublishJob) {
        let mut q = self.queue.lock().expect("queue lock poisoned");
        q.push_back(Slot::Job(job));
        self.not_empty.notify_one();
    }

    /// Wake the publisher thread and tell it to exit its loop.
    pub fn shutdown(&self) {
        let mut q = self.queue.lock().expect("queue lock poisoned");
        q.push_back(Slot::Shutdown);
        self.not_empty.notify_all();
    }

    /// Block until a job is available. Returns `None` once shutdown has
    /// been requested and no jobs remain.
    pub fn pop(&self) -> Option<PublishJob> {
        let mut q = self.queue.lock().expect("queue lock poisoned");
        loop {
            match q.pop_front() {
                Some(Slot::Job(job)) => return Some(job),
                Some(Slot::Shutdown) => return None,
                None => {
                    q = self.not_empty.wait(q).expect("queue lock poisoned");
                }
            }
        }
    }
}

impl Default for PublishQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use vss_path::Path;
    use vss_types::{Datapoint, Timestamp, Value};

    #[test]
    fn pop_blocks_until_a_job_is_pushed() {
        let queue = Arc::new(PublishQueue::new());
        let reader = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop())
        };
        thread::sleep(std::time::Duration::from_millis(20));
        queue.push(PublishJob {
            path: Path::parse("Vehicle.Speed").unwrap(),
            attribute: Attribute::Value,
            datapoint: Datapoint::new(Value::Float(1.0), Timestamp::epoch_zero()),
        });
        let job = reader.join().unwrap();
        assert!(job.is_some());
    }

    #[test]
    fn shutdown_unblocks_a_waiting_pop_with_none() {
        let queue = Arc::new(PublishQueue::new());
        let reader = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop())
        };
        thread::sleep(std::time::Duration::from_millis(20));
        queue.shutdown();
        assert!(reader.join().unwrap().is_none());
    }
}
