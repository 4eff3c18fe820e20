//! Hardware adapter: bundles the barrier drive and its confirmation sensor
//! behind the controller's port traits.
//!
//! The controller takes a single `H: DrivePort + ConfirmationPort` so both
//! sides live behind one lock and can never be touched by two actuations at
//! once.

use crate::app::ports::{ConfirmationPort, DrivePort};
use crate::control::barrier::Direction;
use crate::error::{ActuatorError, SensorError};

pub struct BarrierHardware<D, C> {
    drive: D,
    confirm: C,
}

impl<D, C> BarrierHardware<D, C> {
    pub fn new(drive: D, confirm: C) -> Self {
        Self { drive, confirm }
    }
}

// ── DrivePort ─────────────────────────────────────────────────

impl<D: DrivePort, C> DrivePort for BarrierHardware<D, C> {
    fn drive(&mut self, direction: Direction) -> Result<(), ActuatorError> {
        self.drive.drive(direction)
    }

    fn stop(&mut self) -> Result<(), ActuatorError> {
        self.drive.stop()
    }

    fn is_stopped(&self) -> bool {
        self.drive.is_stopped()
    }
}

// ── ConfirmationPort ──────────────────────────────────────────

impl<D, C: ConfirmationPort> ConfirmationPort for BarrierHardware<D, C> {
    fn target_reached(&mut self, direction: Direction) -> Result<bool, SensorError> {
        self.confirm.target_reached(direction)
    }
}
