//! Completions parked by broker message id.
//!
//! The transport assigns the message id only when the client call returns,
//! and the matching ack can be delivered on the event task before the
//! caller gets to register. The table is never locked across a client call;
//! an ack for an id nobody has registered yet is remembered instead and
//! settled at registration.

use std::sync::{Mutex, PoisonError};

use heapless::Vec as BoundedVec;
use log::{debug, warn};

use crate::app::ports::{AckStatus, Completion};

/// Acks remembered for ids not yet registered. QoS 0 traffic and expired
/// requests also land here, so the oldest are evicted.
pub const EARLY_ACKS: usize = 8;

/// How the transport finished a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Acked(AckStatus),
    /// Discarded without an ack; the waiter sees the completion dropped.
    Discarded,
}

struct Waiting {
    message_id: u32,
    correlation_id: u32,
    done: Completion,
}

#[derive(Default)]
struct Table {
    waiting: Vec<Waiting>,
    early: BoundedVec<(u32, Settlement), EARLY_ACKS>,
}

#[derive(Default)]
pub struct AckTable {
    table: Mutex<Table>,
}

impl AckTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park `done` under `message_id`, or settle it now if its ack already
    /// arrived.
    pub fn register(&self, message_id: u32, correlation_id: u32, done: Completion) {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        let early = table
            .early
            .iter()
            .position(|(id, _)| *id == message_id)
            .map(|i| table.early.remove(i).1);
        match early {
            Some(settlement) => {
                drop(table);
                debug!("Request {} (msg {}) was settled before registration", correlation_id, message_id);
                finish(done, settlement);
            }
            None => table.waiting.push(Waiting {
                message_id,
                correlation_id,
                done,
            }),
        }
    }

    /// Deliver the outcome for `message_id`. Completions run outside the lock.
    pub fn settle(&self, message_id: u32, settlement: Settlement) {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        let found = table
            .waiting
            .iter()
            .position(|w| w.message_id == message_id)
            .map(|i| table.waiting.swap_remove(i));
        match found {
            Some(w) => {
                drop(table);
                debug!("Settled request {} (msg {}): {:?}", w.correlation_id, message_id, settlement);
                if settlement == Settlement::Discarded {
                    warn!("Request {} expired before its ack", w.correlation_id);
                }
                finish(w.done, settlement);
            }
            None => {
                if table.early.is_full() {
                    table.early.remove(0);
                }
                // Cannot fail: a slot was just freed.
                let _ = table.early.push((message_id, settlement));
            }
        }
    }

    /// Drop every parked completion and forget early acks.
    pub fn abandon_all(&self) -> usize {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        table.early.clear();
        let dropped = core::mem::take(&mut table.waiting);
        dropped.len()
    }

    pub fn waiting(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .waiting
            .len()
    }
}

fn finish(done: Completion, settlement: Settlement) {
    match settlement {
        Settlement::Acked(status) => done(status),
        Settlement::Discarded => drop(done),
    }
}
