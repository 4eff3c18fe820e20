//! Connectivity gates.
//!
//! Two flags guard every task that talks to the broker: "connected" and
//! "no maintenance in progress". The agent's event handler is the only
//! writer; command and telemetry loops block on [`ConnectivityGates::wait_ready`]
//! until both are open.

use core::time::Duration;
use std::sync::{Condvar, Mutex, PoisonError};

use log::{info, warn};

use crate::app::ports::AgentEvent;

#[derive(Debug, Clone, Copy, Default)]
struct GateBits {
    connected: bool,
    maintenance: bool,
    /// Times the gates went from open to closed.
    closures: u32,
}

impl GateBits {
    fn ready(self) -> bool {
        self.connected && !self.maintenance
    }
}

/// Shared readiness state, injected into each task as `Arc<ConnectivityGates>`.
#[derive(Debug, Default)]
pub struct ConnectivityGates {
    bits: Mutex<GateBits>,
    changed: Condvar,
}

impl ConnectivityGates {
    /// Starts disconnected with no maintenance in progress.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_connected(&self, connected: bool) {
        self.update(|b| b.connected = connected);
    }

    pub fn set_maintenance(&self, in_progress: bool) {
        self.update(|b| b.maintenance = in_progress);
    }

    pub fn is_ready(&self) -> bool {
        self.bits.lock().unwrap_or_else(PoisonError::into_inner).ready()
    }

    /// `Some(n)` while open, where `n` counts earlier closures. Work
    /// accepted under one epoch is stale once the epoch changes.
    pub fn ready_epoch(&self) -> Option<u32> {
        let bits = *self.bits.lock().unwrap_or_else(PoisonError::into_inner);
        bits.ready().then_some(bits.closures)
    }

    pub fn is_connected(&self) -> bool {
        self.bits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .connected
    }

    /// Block until both gates are open or `timeout` elapses.
    pub fn wait_ready(&self, timeout: Duration) -> bool {
        let guard = self.bits.lock().unwrap_or_else(PoisonError::into_inner);
        let (bits, _) = self
            .changed
            .wait_timeout_while(guard, timeout, |b| !b.ready())
            .unwrap_or_else(PoisonError::into_inner);
        bits.ready()
    }

    /// Apply one agent lifecycle event.
    pub fn handle(&self, event: AgentEvent) {
        match event {
            AgentEvent::Connected => {
                info!("MQTT agent connected");
                self.set_connected(true);
            }
            AgentEvent::Disconnected => {
                warn!("MQTT agent disconnected, holding back requests");
                self.set_connected(false);
            }
            AgentEvent::MaintenanceStarted => {
                info!("Maintenance started, holding back requests");
                self.set_maintenance(true);
            }
            AgentEvent::MaintenanceStopped => {
                info!("Maintenance stopped, releasing requests");
                self.set_maintenance(false);
            }
        }
    }

    fn update(&self, f: impl FnOnce(&mut GateBits)) {
        let mut bits = self.bits.lock().unwrap_or_else(PoisonError::into_inner);
        let was_ready = bits.ready();
        f(&mut bits);
        if was_ready && !bits.ready() {
            bits.closures = bits.closures.wrapping_add(1);
        }
        drop(bits);
        self.changed.notify_all();
    }
}
