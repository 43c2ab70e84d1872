//! Fan-out notification topics.
//!
//! A topic announces job-state events to any number of independent
//! subscriber queues; each subscriber gets its own copy and its own
//! acknowledgement lifecycle. The topic itself stores nothing — durability
//! lives in the bound queues.

use std::sync::{Arc, Mutex};

use crate::queue::{InMemoryQueue, MessageQueue, QueueError};

/// Fan-out publish primitive.
pub trait NotificationBus: Send + Sync {
    /// Deliver a copy of `body` to every subscriber queue.
    fn publish(&self, body: &str) -> Result<(), QueueError>;
}

impl<B> NotificationBus for Arc<B>
where
    B: NotificationBus + ?Sized,
{
    fn publish(&self, body: &str) -> Result<(), QueueError> {
        (**self).publish(body)
    }
}

/// In-memory topic for tests/dev.
#[derive(Debug)]
pub struct InMemoryTopic {
    name: String,
    subscribers: Mutex<Vec<Arc<InMemoryQueue>>>,
}

impl InMemoryTopic {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bind a fresh subscriber queue to this topic.
    pub fn subscribe(&self) -> Arc<InMemoryQueue> {
        let queue = InMemoryQueue::arc();
        self.attach(queue.clone());
        queue
    }

    /// Bind an existing queue (e.g. one with a test-tuned visibility window).
    pub fn attach(&self, queue: Arc<InMemoryQueue>) {
        self.subscribers.lock().unwrap().push(queue);
    }
}

impl NotificationBus for InMemoryTopic {
    fn publish(&self, body: &str) -> Result<(), QueueError> {
        let subs = self.subscribers.lock().unwrap();
        for queue in subs.iter() {
            queue.send(body.to_string())?;
        }
        Ok(())
    }
}
