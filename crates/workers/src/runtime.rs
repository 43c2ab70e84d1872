//! Worker poll-loop scaffolding.
//!
//! Each worker role is a long-running loop over exactly one queue: bounded
//! receive, handle sequentially, then either acknowledge or leave the
//! message for redelivery. Scaling out means running more instances of the
//! same loop — safe because every shared-state write is conditional or
//! structurally single-writer.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use frostflow_messaging::{MessageQueue, QueueError};

/// What the handler decided about one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum HandlerOutcome {
    /// Done; remove the message.
    Ack,
    /// Non-recoverable body (missing/garbled fields). Remove the message —
    /// redelivering cannot fix missing data — and log why.
    Drop(String),
    /// Transient failure. Leave the message unacknowledged; the visibility
    /// window brings it back.
    Retry(String),
}

/// A queue consumer's message handler.
///
/// Must be idempotent: at-least-once delivery means `handle` can see the
/// same body more than once, including after a partial prior attempt.
pub trait MessageHandler: Send {
    fn handle(&mut self, body: &str) -> HandlerOutcome;
}

impl<F> MessageHandler for F
where
    F: FnMut(&str) -> HandlerOutcome + Send,
{
    fn handle(&mut self, body: &str) -> HandlerOutcome {
        self(body)
    }
}

/// Pull and handle at most one message; apply the outcome's ack discipline.
///
/// Returns the outcome when a message was handled, `None` on an idle tick.
/// The worker loop is just this in a loop; tests call it directly for
/// deterministic stepping.
pub fn process_one<Q, H>(
    name: &str,
    queue: &Q,
    handler: &mut H,
    wait: Duration,
) -> Result<Option<HandlerOutcome>, QueueError>
where
    Q: MessageQueue,
    H: MessageHandler + ?Sized,
{
    let Some(delivery) = queue.receive(wait)? else {
        return Ok(None);
    };

    if delivery.deliveries > 1 {
        debug!(
            worker = name,
            deliveries = delivery.deliveries,
            "handling redelivered message"
        );
    }

    let outcome = handler.handle(&delivery.body);
    match &outcome {
        HandlerOutcome::Ack => {
            if let Err(e) = queue.ack(delivery.receipt) {
                // Visibility expired mid-handling; the message will come
                // around again and the handler must absorb the repeat.
                warn!(worker = name, error = %e, "ack failed after successful handling");
            }
        }
        HandlerOutcome::Drop(reason) => {
            warn!(worker = name, reason = %reason, "dropping non-recoverable message");
            if let Err(e) = queue.ack(delivery.receipt) {
                warn!(worker = name, error = %e, "ack failed while dropping message");
            }
        }
        HandlerOutcome::Retry(reason) => {
            warn!(
                worker = name,
                reason = %reason,
                deliveries = delivery.deliveries,
                "leaving message for redelivery"
            );
        }
    }

    Ok(Some(outcome))
}

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Spawn a worker thread polling `queue` with the given bounded wait.
pub fn spawn_worker<Q, H>(
    name: &'static str,
    queue: Q,
    wait: Duration,
    mut handler: H,
) -> WorkerHandle
where
    Q: MessageQueue + 'static,
    H: MessageHandler + 'static,
{
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

    let join = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || worker_loop(name, queue, shutdown_rx, wait, &mut handler))
        .expect("failed to spawn worker thread");

    WorkerHandle {
        shutdown: shutdown_tx,
        join: Some(join),
    }
}

fn worker_loop<Q, H>(
    name: &'static str,
    queue: Q,
    shutdown_rx: mpsc::Receiver<()>,
    wait: Duration,
    handler: &mut H,
) where
    Q: MessageQueue,
    H: MessageHandler,
{
    info!(worker = name, "worker started");

    loop {
        // Shutdown check (non-blocking)
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match process_one(name, &queue, handler, wait) {
            Ok(_) => {}
            Err(e) => {
                // Queue transport trouble: fail this attempt, keep the loop
                // alive. The bounded receive is the backoff.
                error!(worker = name, error = %e, "queue receive failed");
            }
        }
    }

    info!(worker = name, "worker stopped");
}
