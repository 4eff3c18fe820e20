//! Application services: the glue between decoded commands and the
//! subsystems that carry them out.
//!
//! ```text
//!  dispatcher ──handle()──▶ BarrierService ──[1-slot queue]──▶ barrier task
//!                                                               │
//!                                                  BarrierController::actuate
//! ```
//!
//! `handle()` runs on the transport's delivery task and must return
//! quickly, so barrier commands are queued and executed by the barrier
//! task. The queue holds one request: a command that arrives while one is
//! queued or running is rejected, never interleaved. Nothing is accepted
//! while the connectivity gates are closed, and a request queued before
//! they last closed is discarded rather than replayed.

use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use std::sync::{Arc, Mutex, PoisonError};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{debug, info, warn};

use crate::app::commands::{BarrierCommand, Sound};
use crate::app::ports::{AudioPort, CommandHandler, ConfirmationPort, DrivePort, EventSink, TimePort};
use crate::comms::gates::ConnectivityGates;
use crate::control::barrier::{ActuationOutcome, ActuationRequest, BarrierController, Direction};
use crate::error::{CommsError, Error};

/// How long the barrier task blocks on the gates before re-checking.
const GATE_WAIT: Duration = Duration::from_secs(1);

// ───────────────────────────────────────────────────────────────
// BarrierService
// ───────────────────────────────────────────────────────────────

/// A request plus the gate epoch it was accepted under.
#[derive(Debug, Clone, Copy)]
struct Queued {
    request: ActuationRequest,
    epoch: u32,
}

pub struct BarrierService<H, T> {
    controller: BarrierController<H, T>,
    gates: Arc<ConnectivityGates>,
    queue: Channel<CriticalSectionRawMutex, Queued, 1>,
    /// Held from `request` until the actuation (or its discard) is done.
    slot_taken: AtomicBool,
}

impl<H, T> BarrierService<H, T>
where
    H: DrivePort + ConfirmationPort,
    T: TimePort,
{
    pub fn new(controller: BarrierController<H, T>, gates: Arc<ConnectivityGates>) -> Self {
        Self {
            controller,
            gates,
            queue: Channel::new(),
            slot_taken: AtomicBool::new(false),
        }
    }

    pub fn controller(&self) -> &BarrierController<H, T> {
        &self.controller
    }

    /// Queue an actuation. Fails with `NotReady` while the gates are closed
    /// and with [`Error::Busy`] if one is already queued or running.
    pub fn request(&self, direction: Direction) -> Result<(), Error> {
        let epoch = self.gates.ready_epoch().ok_or(CommsError::NotReady)?;
        if self
            .slot_taken
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::Busy);
        }
        let queued = Queued {
            request: ActuationRequest { direction },
            epoch,
        };
        if self.controller.is_busy() || self.queue.try_send(queued).is_err() {
            self.release();
            return Err(Error::Busy);
        }
        Ok(())
    }

    /// Execute the queued request, if any. A request accepted before the
    /// gates last closed is dropped instead.
    pub fn run_pending(&self, sink: &mut impl EventSink) -> Option<Result<ActuationOutcome, Error>> {
        let queued = self.queue.try_receive().ok()?;
        if self.gates.ready_epoch() != Some(queued.epoch) {
            warn!("Dropping {:?} accepted before the link went down", queued.request);
            self.release();
            return None;
        }
        debug!("Executing queued {:?}", queued.request);
        let result = self.controller.actuate(queued.request.direction, sink);
        self.release();
        Some(result)
    }

    /// Barrier task body. Requests are only executed while the gates are
    /// open.
    pub fn run(&self, sink: &mut impl EventSink, loop_delay_ms: u32) -> ! {
        info!("Barrier task running");
        loop {
            // While gated, `run_pending` only discards stale requests.
            self.gates.wait_ready(GATE_WAIT);
            if let Some(Err(e)) = self.run_pending(sink) {
                warn!("Queued actuation failed: {}", e);
            }
            self.controller.time().sleep_ms(loop_delay_ms);
        }
    }

    fn release(&self) {
        self.slot_taken.store(false, Ordering::Release);
    }
}

impl<H, T> CommandHandler<BarrierCommand> for BarrierService<H, T>
where
    H: DrivePort + ConfirmationPort + Send,
    T: TimePort + Send + Sync,
{
    fn handle(&self, command: BarrierCommand) -> Result<(), Error> {
        self.request(command.direction())
    }
}

// ───────────────────────────────────────────────────────────────
// BuzzerControl
// ───────────────────────────────────────────────────────────────

/// Plays buzzer commands on the audio port. Playback is non-blocking, so
/// this runs directly in the delivery context.
pub struct BuzzerControl<A> {
    audio: Mutex<A>,
}

impl<A: AudioPort> BuzzerControl<A> {
    pub fn new(audio: A) -> Self {
        Self {
            audio: Mutex::new(audio),
        }
    }
}

impl<A: AudioPort + Send> CommandHandler<Sound> for BuzzerControl<A> {
    fn handle(&self, sound: Sound) -> Result<(), Error> {
        self.audio
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .play(sound);
        Ok(())
    }
}
