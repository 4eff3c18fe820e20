//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Controller / Dispatcher / Publisher (domain)
//! ```
//!
//! Driven adapters (H-bridge, limit switches, clock, message agent, event
//! sinks) implement these traits. The domain consumes them via generics, so
//! the control core never touches hardware or the transport directly.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::app::events::{AppEvent, IndicatorCue};
use crate::control::barrier::Direction;
use crate::error::{ActuatorError, Error, SensorError};

// ───────────────────────────────────────────────────────────────
// Actuator ports (domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Binary full-speed drive toward one end position.
pub trait DrivePort {
    /// Apply full drive toward `direction`.
    fn drive(&mut self, direction: Direction) -> Result<(), ActuatorError>;

    /// Remove drive. Must be idempotent.
    fn stop(&mut self) -> Result<(), ActuatorError>;

    /// Whether the drive signal is currently off.
    fn is_stopped(&self) -> bool;
}

/// Read-side port for the end-position confirmation sensor(s).
pub trait ConfirmationPort {
    /// Instantaneous sample: has the barrier reached the end position for
    /// `direction`?
    fn target_reached(&mut self, direction: Direction) -> Result<bool, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Time port
// ───────────────────────────────────────────────────────────────

/// Monotonic time, cooperative sleeps and wall-clock for timestamps.
pub trait TimePort {
    /// Microseconds since boot (monotonic).
    fn uptime_us(&self) -> u64;

    /// Yield the calling task for `ms` milliseconds.
    fn sleep_ms(&self, ms: u32);

    /// Short busy-wait used for trigger pulses.
    fn delay_us(&self, us: u32);

    /// Current UTC wall-clock time.
    fn now_utc(&self) -> DateTime<Utc>;
}

impl<T: TimePort + ?Sized> TimePort for &T {
    fn uptime_us(&self) -> u64 {
        (**self).uptime_us()
    }
    fn sleep_ms(&self, ms: u32) {
        (**self).sleep_ms(ms);
    }
    fn delay_us(&self, us: u32) {
        (**self).delay_us(us);
    }
    fn now_utc(&self) -> DateTime<Utc> {
        (**self).now_utc()
    }
}

impl<T: TimePort + ?Sized> TimePort for Arc<T> {
    fn uptime_us(&self) -> u64 {
        (**self).uptime_us()
    }
    fn sleep_ms(&self, ms: u32) {
        (**self).sleep_ms(ms);
    }
    fn delay_us(&self, us: u32) {
        (**self).delay_us(us);
    }
    fn now_utc(&self) -> DateTime<Utc> {
        (**self).now_utc()
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → logging / indicators)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`]s through this port. Adapters
/// decide where they go (serial log, status LED, buzzer).
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}

/// Visual status output. Rendering (LED strip timing, colours) lives in the
/// adapter.
pub trait IndicatorPort {
    fn show(&mut self, cue: IndicatorCue);
}

/// Audible alert output.
pub trait AudioPort {
    fn play(&mut self, sound: crate::app::commands::Sound);
}

// ───────────────────────────────────────────────────────────────
// Command handler port (dispatcher → subsystem)
// ───────────────────────────────────────────────────────────────

/// Receives decoded commands of one command set.
///
/// Called from the transport's delivery context, so implementations must
/// not block for the duration of a physical operation.
pub trait CommandHandler<C>: Send + Sync {
    fn handle(&self, command: C) -> Result<(), Error>;
}

impl<C, H: CommandHandler<C> + ?Sized> CommandHandler<C> for Arc<H> {
    fn handle(&self, command: C) -> Result<(), Error> {
        (**self).handle(command)
    }
}

// ───────────────────────────────────────────────────────────────
// Message agent port (domain ↔ MQTT agent)
// ───────────────────────────────────────────────────────────────

/// MQTT quality of service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QoS {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl QoS {
    pub fn from_level(level: u8) -> Result<Self, Error> {
        match level {
            0 => Ok(Self::AtMostOnce),
            1 => Ok(Self::AtLeastOnce),
            2 => Ok(Self::ExactlyOnce),
            _ => Err(Error::InvalidArgument("qos must be 0, 1 or 2")),
        }
    }
}

/// Final status reported by the agent for one queued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    Success,
    /// Broker or agent failure code.
    Failed(u8),
}

/// One-shot completion invoked by the agent when a request finishes.
pub type Completion = Box<dyn FnOnce(AckStatus) + Send + 'static>;

/// Why the agent refused to queue a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    /// The agent's command queue is full; retrying later may succeed.
    QueueFull,
    /// The agent is not running.
    Closed,
}

/// The transport agent. Connect/reconnect/TLS are its business; the domain
/// only queues requests and gets one completion per request.
pub trait MessageAgent: Send + Sync {
    fn subscribe(
        &self,
        topic_filter: &str,
        qos: QoS,
        correlation_id: u32,
        done: Completion,
    ) -> Result<(), EnqueueError>;

    fn publish(
        &self,
        topic: &str,
        qos: QoS,
        payload: &[u8],
        correlation_id: u32,
        done: Completion,
    ) -> Result<(), EnqueueError>;
}

impl<A: MessageAgent + ?Sized> MessageAgent for Arc<A> {
    fn subscribe(
        &self,
        topic_filter: &str,
        qos: QoS,
        correlation_id: u32,
        done: Completion,
    ) -> Result<(), EnqueueError> {
        (**self).subscribe(topic_filter, qos, correlation_id, done)
    }

    fn publish(
        &self,
        topic: &str,
        qos: QoS,
        payload: &[u8],
        correlation_id: u32,
        done: Completion,
    ) -> Result<(), EnqueueError> {
        (**self).publish(topic, qos, payload, correlation_id, done)
    }
}

/// Lifecycle notifications raised by the agent's event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentEvent {
    Connected,
    Disconnected,
    /// A maintenance operation (firmware update) started.
    MaintenanceStarted,
    MaintenanceStopped,
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from configuration loading and validation.
#[derive(Debug)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::Corrupted => Error::Config("corrupted"),
            ConfigError::ValidationFailed(msg) => Error::Config(msg),
        }
    }
}
