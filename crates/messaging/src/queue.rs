//! Durable message queue abstraction with explicit acknowledgement.
//!
//! A received message is not removed from the queue — it becomes invisible
//! for a visibility window and reappears unless the consumer acknowledges it
//! within that window. Crash before `ack` = redelivery. This is the only
//! retry mechanism the pipeline has; workers never count attempts themselves.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;

/// Opaque handle identifying one *delivery* of a message.
///
/// A redelivered message gets a fresh handle; acknowledging with a stale one
/// fails (the message already went back on the queue).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ReceiptHandle(u64);

/// One delivery of a message: the opaque body plus its receipt.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub body: String,
    pub receipt: ReceiptHandle,
    /// How many times this message has been delivered, this one included.
    pub deliveries: u32,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    /// The receipt does not match any in-flight delivery (visibility window
    /// expired and the message was redelivered, or it was already acked).
    #[error("unknown or stale receipt")]
    StaleReceipt,
    /// Transport-level failure.
    #[error("queue transport error: {0}")]
    Transport(String),
}

/// Independently named, durable, at-least-once queue of opaque bodies.
pub trait MessageQueue: Send + Sync {
    /// Append a message.
    fn send(&self, body: String) -> Result<(), QueueError>;

    /// Pull the next visible message, blocking up to `wait`.
    ///
    /// Returns `None` when nothing became visible within the bounded wait —
    /// the worker loop treats that as an idle tick, never an error.
    fn receive(&self, wait: Duration) -> Result<Option<Delivery>, QueueError>;

    /// Remove a delivered message for good.
    fn ack(&self, receipt: ReceiptHandle) -> Result<(), QueueError>;
}

impl<Q> MessageQueue for Arc<Q>
where
    Q: MessageQueue + ?Sized,
{
    fn send(&self, body: String) -> Result<(), QueueError> {
        (**self).send(body)
    }

    fn receive(&self, wait: Duration) -> Result<Option<Delivery>, QueueError> {
        (**self).receive(wait)
    }

    fn ack(&self, receipt: ReceiptHandle) -> Result<(), QueueError> {
        (**self).ack(receipt)
    }
}

#[derive(Debug)]
struct Entry {
    body: String,
    receipt: u64,
    visible_at: Instant,
    deliveries: u32,
}

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<Entry>,
    next_receipt: u64,
}

/// In-memory queue for tests/dev.
///
/// Faithful to the at-least-once contract: unacknowledged messages come back
/// after the visibility window. A zero window makes unacked messages
/// immediately redeliverable, which tests use to simulate crashes.
#[derive(Debug)]
pub struct InMemoryQueue {
    inner: Mutex<Inner>,
    ready: Condvar,
    visibility: Duration,
}

impl InMemoryQueue {
    pub const DEFAULT_VISIBILITY: Duration = Duration::from_secs(30);

    pub fn new() -> Self {
        Self::with_visibility(Self::DEFAULT_VISIBILITY)
    }

    pub fn with_visibility(visibility: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            ready: Condvar::new(),
            visibility,
        }
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn visibility(&self) -> Duration {
        self.visibility
    }

    /// Total messages held, visible or in flight.
    pub fn depth(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageQueue for InMemoryQueue {
    fn send(&self, body: String) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.push(Entry {
            body,
            receipt: 0,
            visible_at: Instant::now(),
            deliveries: 0,
        });
        drop(inner);
        self.ready.notify_one();
        Ok(())
    }

    fn receive(&self, wait: Duration) -> Result<Option<Delivery>, QueueError> {
        let deadline = Instant::now() + wait;
        let mut inner = self.inner.lock().unwrap();

        loop {
            let now = Instant::now();

            if let Some(idx) = inner.entries.iter().position(|e| e.visible_at <= now) {
                // Fresh receipt per delivery; stale receipts must not ack.
                inner.next_receipt += 1;
                let receipt = inner.next_receipt;
                let visibility = self.visibility;

                let entry = &mut inner.entries[idx];
                entry.deliveries += 1;
                entry.visible_at = now + visibility;
                entry.receipt = receipt;

                return Ok(Some(Delivery {
                    body: entry.body.clone(),
                    receipt: ReceiptHandle(receipt),
                    deliveries: entry.deliveries,
                }));
            }

            if now >= deadline {
                return Ok(None);
            }

            // Wake either when something is sent or when the earliest
            // in-flight message becomes visible again.
            let next_visible = inner.entries.iter().map(|e| e.visible_at).min();
            let until = match next_visible {
                Some(t) if t < deadline => t,
                _ => deadline,
            };
            let park = until.saturating_duration_since(now).max(Duration::from_millis(1));
            let (guard, _timed_out) = self.ready.wait_timeout(inner, park).unwrap();
            inner = guard;
        }
    }

    fn ack(&self, receipt: ReceiptHandle) -> Result<(), QueueError> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.entries.len();
        inner.entries.retain(|e| e.receipt != receipt.0);
        if inner.entries.len() == before {
            return Err(QueueError::StaleReceipt);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_receive_ack_removes_message() {
        let q = InMemoryQueue::new();
        q.send("hello".into()).unwrap();

        let d = q.receive(Duration::from_millis(10)).unwrap().unwrap();
        assert_eq!(d.body, "hello");
        assert_eq!(d.deliveries, 1);

        q.ack(d.receipt).unwrap();
        assert_eq!(q.depth(), 0);
    }

    #[test]
    fn empty_queue_times_out_with_none() {
        let q = InMemoryQueue::new();
        let got = q.receive(Duration::from_millis(5)).unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn unacked_message_is_redelivered_after_visibility() {
        let q = InMemoryQueue::with_visibility(Duration::from_millis(5));
        q.send("again".into()).unwrap();

        let first = q.receive(Duration::from_millis(10)).unwrap().unwrap();
        // Not acked: becomes visible again after the window.
        let second = q.receive(Duration::from_millis(50)).unwrap().unwrap();
        assert_eq!(second.body, "again");
        assert_eq!(second.deliveries, 2);

        // The first receipt is now stale.
        assert_eq!(q.ack(first.receipt), Err(QueueError::StaleReceipt));
        q.ack(second.receipt).unwrap();
        assert_eq!(q.depth(), 0);
    }

    #[test]
    fn in_flight_message_is_not_redelivered_within_window() {
        let q = InMemoryQueue::with_visibility(Duration::from_secs(60));
        q.send("one".into()).unwrap();

        let _d = q.receive(Duration::from_millis(10)).unwrap().unwrap();
        assert!(q.receive(Duration::from_millis(5)).unwrap().is_none());
    }

    #[test]
    fn zero_visibility_redelivers_immediately() {
        let q = InMemoryQueue::with_visibility(Duration::ZERO);
        q.send("crashy".into()).unwrap();

        let first = q.receive(Duration::from_millis(10)).unwrap().unwrap();
        let second = q.receive(Duration::from_millis(10)).unwrap().unwrap();
        assert_eq!(first.body, second.body);
        assert_eq!(second.deliveries, 2);
    }

    #[test]
    fn fifo_for_visible_messages() {
        let q = InMemoryQueue::new();
        q.send("a".into()).unwrap();
        q.send("b".into()).unwrap();

        let first = q.receive(Duration::from_millis(10)).unwrap().unwrap();
        assert_eq!(first.body, "a");
        let second = q.receive(Duration::from_millis(10)).unwrap().unwrap();
        assert_eq!(second.body, "b");
    }
}
