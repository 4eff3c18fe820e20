//! Request/acknowledge client over the message agent.
//!
//! The agent completes requests through a callback on its own task. Here
//! every request gets a fresh correlation id and a one-slot channel; the
//! caller blocks on that channel with a bounded timeout, so a lost
//! acknowledgment can never wedge a task.
//!
//! ```text
//!   caller ── enqueue(id, done) ──▶ agent queue ──▶ broker
//!     │                                               │
//!     └──── recv_timeout ◀── done(status) ◀── SUBACK / PUBACK
//! ```

use core::sync::atomic::{AtomicU32, Ordering};
use core::time::Duration;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Instant;

use log::{debug, error, info, warn};

use crate::app::ports::{AckStatus, Completion, EnqueueError, MessageAgent, QoS};
use crate::comms::router::{MessageHandler, Router};
use crate::config::{CommsConfig, Topic};
use crate::error::{CommsError, Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Unsubscribed,
    /// Request queued, acknowledgment outstanding.
    Pending,
    Subscribed,
    Failed,
}

/// One topic filter and where it stands with the broker.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    filter: Topic,
    qos: QoS,
    state: SubscriptionState,
    correlation_id: Option<u32>,
}

impl SubscriptionHandle {
    pub fn new(filter: &str, qos: QoS) -> Result<Self, Error> {
        let filter =
            Topic::try_from(filter).map_err(|()| Error::InvalidArgument("topic filter too long"))?;
        Ok(Self {
            filter,
            qos,
            state: SubscriptionState::Unsubscribed,
            correlation_id: None,
        })
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    /// Id of the most recent subscribe request.
    pub fn correlation_id(&self) -> Option<u32> {
        self.correlation_id
    }
}

pub struct AgentClient<A> {
    agent: A,
    router: Arc<Router>,
    next_id: AtomicU32,
    ack_timeout: Duration,
    enqueue_block: Duration,
}

impl<A: MessageAgent> AgentClient<A> {
    pub fn new(agent: A, router: Arc<Router>, config: &CommsConfig) -> Self {
        Self {
            agent,
            router,
            next_id: AtomicU32::new(1),
            ack_timeout: Duration::from_millis(u64::from(config.ack_timeout_ms)),
            enqueue_block: Duration::from_millis(u64::from(config.enqueue_block_ms)),
        }
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Subscribe `handle`'s filter and route its messages to `handler`.
    ///
    /// The handler is registered before the request goes out, so a retained
    /// message arriving right after the SUBACK is not lost; it is removed
    /// again if the broker never confirms.
    pub fn subscribe(
        &self,
        handle: &mut SubscriptionHandle,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), Error> {
        self.router.register(&handle.filter, handler)?;
        let id = self.next_correlation_id();
        handle.state = SubscriptionState::Pending;
        handle.correlation_id = Some(id);
        info!("Subscribing to '{}' (id {})", handle.filter, id);

        let result = self.round_trip(id, |id, done| {
            self.agent.subscribe(&handle.filter, handle.qos, id, done)
        });
        match result {
            Ok(()) => {
                handle.state = SubscriptionState::Subscribed;
                info!("Subscribed to '{}'", handle.filter);
                Ok(())
            }
            Err(e) => {
                handle.state = SubscriptionState::Failed;
                self.router.remove(&handle.filter);
                error!("Failed to subscribe to '{}': {}", handle.filter, e);
                Err(e)
            }
        }
    }

    /// Publish and wait for the agent's delivery acknowledgment.
    /// Returns the request's correlation id.
    pub fn publish(&self, topic: &str, qos: QoS, payload: &[u8]) -> Result<u32, Error> {
        let id = self.next_correlation_id();
        debug!("Publishing {} bytes to '{}' (id {})", payload.len(), topic, id);
        self.round_trip(id, |id, done| self.agent.publish(topic, qos, payload, id, done))
            .inspect_err(|e| warn!("Publish to '{}' failed: {}", topic, e))?;
        Ok(id)
    }

    fn next_correlation_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn round_trip(
        &self,
        id: u32,
        submit: impl Fn(u32, Completion) -> Result<(), EnqueueError>,
    ) -> Result<(), Error> {
        let (tx, rx) = mpsc::sync_channel::<AckStatus>(1);

        // One budget covers queueing and the ack.
        let deadline = Instant::now() + self.ack_timeout;
        loop {
            let tx = tx.clone();
            let done: Completion = Box::new(move |status| {
                // The waiter may already have timed out.
                let _ = tx.try_send(status);
            });
            match submit(id, done) {
                Ok(()) => break,
                Err(EnqueueError::Closed) => return Err(CommsError::EnqueueFailed.into()),
                Err(EnqueueError::QueueFull) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(CommsError::EnqueueFailed.into());
                    }
                    debug!("Agent queue full, retrying request {}", id);
                    thread::sleep(self.enqueue_block.min(deadline - now));
                }
            }
        }
        // Only completions may hold senders now, so a dropped one disconnects.
        drop(tx);

        match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
            Ok(AckStatus::Success) => Ok(()),
            Ok(AckStatus::Failed(code)) => Err(CommsError::AckRejected(code).into()),
            Err(RecvTimeoutError::Timeout) => Err(CommsError::AckTimeout.into()),
            Err(RecvTimeoutError::Disconnected) => Err(CommsError::AckDropped.into()),
        }
    }
}
