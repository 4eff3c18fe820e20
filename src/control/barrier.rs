//! Barrier actuation controller.
//!
//! ```text
//!            claim (CAS)            drive + settle             poll sensor
//!   Idle ─────────────────▶ Opening/Closing ──────────▶ ... ──────────────▶ Open/Closed
//!   Open/Closed/Fault                                     │ timeout
//!                                                         ▼
//!                                                    Fault(Timeout)
//! ```
//!
//! One actuation owns the barrier at a time: the state word is claimed with
//! a compare-and-swap before anything is driven, so a second caller gets
//! [`Error::Busy`] instead of interleaving drive commands. Drive is removed
//! on every exit path by `DriveGuard`, including a panic inside a port.

use core::sync::atomic::{AtomicU8, Ordering};
use core::time::Duration;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{ConfirmationPort, DrivePort, EventSink, TimePort};
use crate::config::BarrierTiming;
use crate::error::{ActuatorError, Error};

// ---------------------------------------------------------------------------
// Direction and state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Open,
    Close,
}

impl Direction {
    /// State held while moving in this direction.
    pub fn moving_state(self) -> BarrierState {
        match self {
            Self::Open => BarrierState::Opening,
            Self::Close => BarrierState::Closing,
        }
    }

    /// State reached once the end position is confirmed.
    pub fn end_state(self) -> BarrierState {
        match self {
            Self::Open => BarrierState::Open,
            Self::Close => BarrierState::Closed,
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Self::Open => "opening",
            Self::Close => "closing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// The end position was never confirmed.
    Timeout,
    /// The drive could not be commanded.
    Drive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierState {
    /// Power-on state; end position unknown.
    Idle,
    Opening,
    Closing,
    Open,
    Closed,
    /// Last actuation failed. Any new command may be attempted.
    Fault(FaultKind),
}

impl BarrierState {
    pub fn is_moving(self) -> bool {
        matches!(self, Self::Opening | Self::Closing)
    }

    fn to_index(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Opening => 1,
            Self::Closing => 2,
            Self::Open => 3,
            Self::Closed => 4,
            Self::Fault(FaultKind::Timeout) => 5,
            Self::Fault(FaultKind::Drive) => 6,
        }
    }

    fn from_index(idx: u8) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::Opening,
            2 => Self::Closing,
            3 => Self::Open,
            4 => Self::Closed,
            5 => Self::Fault(FaultKind::Timeout),
            6 => Self::Fault(FaultKind::Drive),
            _ => {
                debug_assert!(false, "invalid barrier state index: {idx}");
                Self::Fault(FaultKind::Drive)
            }
        }
    }
}

/// Lock-free holder of the current [`BarrierState`].
struct StateCell(AtomicU8);

impl StateCell {
    fn new(state: BarrierState) -> Self {
        Self(AtomicU8::new(state.to_index()))
    }

    fn load(&self) -> BarrierState {
        BarrierState::from_index(self.0.load(Ordering::Acquire))
    }

    fn store(&self, state: BarrierState) {
        self.0.store(state.to_index(), Ordering::Release);
    }

    /// Move to the moving state for `direction` unless already moving.
    /// Returns the state that was replaced, or the blocking state.
    fn claim(&self, direction: Direction) -> Result<BarrierState, BarrierState> {
        let target = direction.moving_state().to_index();
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            let state = BarrierState::from_index(current);
            if state.is_moving() {
                return Err(state);
            }
            match self
                .0
                .compare_exchange(current, target, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return Ok(state),
                Err(actual) => current = actual,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Requests and outcomes
// ---------------------------------------------------------------------------

/// A queued instruction to move the barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuationRequest {
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuationResult {
    /// The confirmation sensor reported the end position.
    Completed,
    /// Polling hit the operation timeout.
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuationOutcome {
    pub direction: Direction,
    pub result: ActuationResult,
    /// Time from drive applied to drive removed.
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Stops the drive when dropped.
struct DriveGuard<'a, H: DrivePort> {
    hw: MutexGuard<'a, H>,
}

impl<H: DrivePort> Drop for DriveGuard<'_, H> {
    fn drop(&mut self) {
        if let Err(e) = self.hw.stop() {
            error!("Failed to stop barrier drive: {}", e);
        }
    }
}

/// Owns the barrier hardware and serialises actuations on it.
pub struct BarrierController<H, T> {
    hw: Mutex<H>,
    state: StateCell,
    timing: BarrierTiming,
    time: T,
}

impl<H, T> BarrierController<H, T>
where
    H: DrivePort + ConfirmationPort,
    T: TimePort,
{
    pub fn new(hw: H, time: T, timing: BarrierTiming) -> Self {
        Self {
            hw: Mutex::new(hw),
            state: StateCell::new(BarrierState::Idle),
            timing,
            time,
        }
    }

    pub fn state(&self) -> BarrierState {
        self.state.load()
    }

    /// Whether an actuation currently owns the barrier.
    pub fn is_busy(&self) -> bool {
        self.state.load().is_moving()
    }

    pub fn time(&self) -> &T {
        &self.time
    }

    /// Run `f` with exclusive access to the hardware (diagnostics, tests).
    pub fn with_hardware<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        let mut hw = self.hw.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut hw)
    }

    /// Drive the barrier toward `direction` and wait for confirmation.
    ///
    /// Blocks the calling task for at least `settle_ms` and at most roughly
    /// `settle_ms + operation_timeout_ms`. A timeout is a normal outcome,
    /// not an error; `Err` means the call was rejected or the drive failed.
    pub fn actuate(
        &self,
        direction: Direction,
        sink: &mut impl EventSink,
    ) -> Result<ActuationOutcome, Error> {
        let from = self.state.claim(direction).map_err(|current| {
            warn!("Barrier busy ({:?}), rejecting {:?}", current, direction);
            Error::Busy
        })?;
        let moving = direction.moving_state();
        sink.emit(&AppEvent::StateChanged { from, to: moving });

        let mut guard = DriveGuard {
            hw: self.hw.lock().unwrap_or_else(PoisonError::into_inner),
        };
        info!("Barrier {}", direction.verb());
        let started = self.time.uptime_us();
        let result = self.run_motion(&mut guard.hw, direction, sink);
        drop(guard);
        let elapsed = Duration::from_micros(self.time.uptime_us().saturating_sub(started));

        let to = match result {
            Ok(ActuationResult::Completed) => direction.end_state(),
            Ok(ActuationResult::TimedOut) => BarrierState::Fault(FaultKind::Timeout),
            Err(_) => BarrierState::Fault(FaultKind::Drive),
        };
        self.state.store(to);
        sink.emit(&AppEvent::StateChanged { from: moving, to });

        let result = result.map_err(|e| {
            error!("Barrier drive failed while {}: {}", direction.verb(), e);
            Error::from(e)
        })?;
        let outcome = ActuationOutcome {
            direction,
            result,
            elapsed,
        };
        match result {
            ActuationResult::Completed => {
                info!("Barrier {:?} confirmed after {} ms", to, elapsed.as_millis());
            }
            ActuationResult::TimedOut => {
                error!(
                    "Timeout while {} the barrier ({} ms)",
                    direction.verb(),
                    elapsed.as_millis()
                );
            }
        }
        sink.emit(&AppEvent::ActuationFinished(outcome));
        Ok(outcome)
    }

    fn run_motion(
        &self,
        hw: &mut H,
        direction: Direction,
        sink: &mut impl EventSink,
    ) -> Result<ActuationResult, ActuatorError> {
        hw.drive(direction)?;
        sink.emit(&AppEvent::BarrierChanging { direction });

        // Let the motor leave the current end stop before trusting the sensor.
        let settle_us = u64::from(self.timing.settle_ms) * 1_000;
        let settle_start = self.time.uptime_us();
        while self.time.uptime_us().saturating_sub(settle_start) < settle_us {
            self.time.sleep_ms(self.timing.poll_interval_ms);
        }

        let timeout_us = u64::from(self.timing.operation_timeout_ms) * 1_000;
        let poll_start = self.time.uptime_us();
        loop {
            match hw.target_reached(direction) {
                Ok(true) => return Ok(ActuationResult::Completed),
                Ok(false) => {}
                Err(e) => warn!("Confirmation sensor read failed: {}", e),
            }
            if self.time.uptime_us().saturating_sub(poll_start) >= timeout_us {
                return Ok(ActuationResult::TimedOut);
            }
            self.time.sleep_ms(self.timing.poll_interval_ms);
        }
    }
}
