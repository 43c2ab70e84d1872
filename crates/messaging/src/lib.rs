//! `frostflow-messaging` — queues, fan-out topics, and message payloads.
//!
//! Delivery contract for everything in this crate: **at-least-once**. A
//! message stays on its queue until the consumer explicitly acknowledges it;
//! consumers must tolerate redelivery without corrupting shared state.

pub mod payload;
pub mod queue;
pub mod topic;

pub use payload::{CompletionNotice, RetrievalReady, SubmissionMessage, UpgradeEvent};
pub use queue::{Delivery, InMemoryQueue, MessageQueue, QueueError, ReceiptHandle};
pub use topic::{InMemoryTopic, NotificationBus};
