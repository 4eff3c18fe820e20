//! Outbound application events.
//!
//! The controller, dispatcher and telemetry loops emit these through the
//! [`EventSink`](super::ports::EventSink) port. Adapters on the other side
//! decide what to do with them: log to serial, light the status LED, sound
//! the buzzer.

use crate::app::ports::AgentEvent;
use crate::config::Topic;
use crate::control::barrier::{ActuationOutcome, BarrierState, Direction};

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The node finished wiring and its tasks are running.
    Started,

    /// Drive was applied; the barrier is physically moving.
    BarrierChanging { direction: Direction },

    /// The barrier state machine moved.
    StateChanged { from: BarrierState, to: BarrierState },

    /// An actuation ran to completion or timed out.
    ActuationFinished(ActuationOutcome),

    /// The message agent reported a lifecycle change.
    Agent(AgentEvent),

    /// A subscription was acknowledged by the broker.
    Subscribed { topic: Topic },

    /// One obstacle measurement cycle.
    Obstacle(ObstacleSample),

    /// A power telemetry document was acknowledged.
    TelemetryPublished { correlation_id: u32 },

    /// A power telemetry cycle produced nothing publishable.
    TelemetrySkipped,
}

/// Result of one obstacle-sensing cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObstacleSample {
    /// `None` when the probe produced no reading.
    pub distance_cm: Option<f32>,
    /// Whether the presence sensor reports a vehicle in the bay.
    pub vehicle_present: bool,
}

/// Visual status cue shown on the indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorCue {
    /// Barrier is moving.
    BarrierMoving,
    /// Barrier is raised (bay reserved/occupied).
    VehicleParked,
    /// Barrier is lowered (bay free).
    SpotEmpty,
    ConnectionLost,
    ConnectionEstablished,
    /// Something needs attention (timed-out actuation).
    Fault,
}
