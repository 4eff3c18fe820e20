//! Unified error types for the barrier node firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! task loops' error handling uniform. All variants are `Copy` so they can be
//! passed through outcome values and events without allocation.
//!
//! Errors are handled at the boundary where they occur: a timed-out
//! actuation is an [`ActuationResult`](crate::control::barrier::ActuationResult),
//! a malformed command is a [`DispatchOutcome`](crate::comms::dispatcher::DispatchOutcome),
//! and only argument validation surfaces as [`Error::InvalidArgument`].

use core::fmt;

use embedded_hal::i2c::ErrorKind;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A register-addressed sensor could not be read.
    Sensor(SensorError),
    /// The ultrasonic probe produced no usable measurement.
    Probe(ProbeError),
    /// The barrier drive could not be commanded.
    Actuator(ActuatorError),
    /// A message-channel request was not acknowledged.
    Comms(CommsError),
    /// An actuation is already in progress on this barrier.
    Busy,
    /// A caller passed an argument outside the accepted range.
    InvalidArgument(&'static str),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Probe(e) => write!(f, "probe: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Comms(e) => write!(f, "comms: {e}"),
            Self::Busy => write!(f, "actuation already in progress"),
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The bus transaction failed (NACK, arbitration loss, timeout...).
    Bus(ErrorKind),
    /// A GPIO level could not be read.
    GpioReadFailed,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(kind) => write!(f, "bus error ({kind})"),
            Self::GpioReadFailed => write!(f, "GPIO read failed"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Probe errors
// ---------------------------------------------------------------------------

/// Failure modes of a single ultrasonic measurement.
///
/// Callers treat both timeouts as "no reading available"; the split exists
/// for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeError {
    /// No echo started within the fixed wait bound (wiring or hardware fault).
    NoEcho,
    /// The echo lasted longer than the configured maximum distance allows.
    EchoTooLong,
    /// Trigger or echo pin could not be driven/read.
    Gpio,
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoEcho => write!(f, "timed out waiting for echo"),
            Self::EchoTooLong => write!(f, "echo exceeded maximum distance"),
            Self::Gpio => write!(f, "GPIO access failed"),
        }
    }
}

impl From<ProbeError> for Error {
    fn from(e: ProbeError) -> Self {
        Self::Probe(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// Setting an H-bridge input failed.
    GpioWriteFailed,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    /// The broker is unreachable or maintenance is in progress.
    NotReady,
    /// The agent refused to queue the request before the deadline.
    EnqueueFailed,
    /// No acknowledgment arrived within the configured timeout.
    AckTimeout,
    /// The broker acknowledged with a failure code.
    AckRejected(u8),
    /// The agent dropped the completion without ever invoking it.
    AckDropped,
    /// The subscription table has no free slot.
    RouteTableFull,
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady => write!(f, "not connected"),
            Self::EnqueueFailed => write!(f, "request could not be enqueued"),
            Self::AckTimeout => write!(f, "timed out waiting for acknowledgment"),
            Self::AckRejected(code) => write!(f, "request rejected (code {code})"),
            Self::AckDropped => write!(f, "acknowledgment dropped"),
            Self::RouteTableFull => write!(f, "subscription table full"),
        }
    }
}

impl From<CommsError> for Error {
    fn from(e: CommsError) -> Self {
        Self::Comms(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
