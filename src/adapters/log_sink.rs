//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART / USB-CDC in production).

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{AgentEvent, EventSink};
use crate::control::barrier::{ActuationResult, BarrierState};

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started => info!("START | node running"),
            AppEvent::BarrierChanging { direction } => {
                info!("BARRIER | moving {:?}", direction);
            }
            AppEvent::StateChanged { from, to } => match to {
                BarrierState::Fault(kind) => warn!("STATE | {:?} -> Fault({:?})", from, kind),
                _ => info!("STATE | {:?} -> {:?}", from, to),
            },
            AppEvent::ActuationFinished(o) => match o.result {
                ActuationResult::Completed => info!(
                    "BARRIER | {:?} completed in {} ms",
                    o.direction,
                    o.elapsed.as_millis()
                ),
                ActuationResult::TimedOut => warn!(
                    "BARRIER | {:?} timed out after {} ms",
                    o.direction,
                    o.elapsed.as_millis()
                ),
            },
            AppEvent::Agent(e) => match e {
                AgentEvent::Disconnected => warn!("LINK | disconnected"),
                other => info!("LINK | {:?}", other),
            },
            AppEvent::Subscribed { topic } => info!("LINK | subscribed {}", topic),
            AppEvent::Obstacle(s) => debug!(
                "OBSTACLE | distance={:?}cm vehicle={}",
                s.distance_cm, s.vehicle_present
            ),
            AppEvent::TelemetryPublished { correlation_id } => {
                info!("TELEM | published (id {})", correlation_id);
            }
            AppEvent::TelemetrySkipped => warn!("TELEM | cycle skipped"),
        }
    }
}

/// Forwards every event to two sinks.
pub struct Tee<A, B>(pub A, pub B);

impl<A: EventSink, B: EventSink> EventSink for Tee<A, B> {
    fn emit(&mut self, event: &AppEvent) {
        self.0.emit(event);
        self.1.emit(event);
    }
}
