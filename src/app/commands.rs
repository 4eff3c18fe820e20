//! Inbound commands decoded from the remote command surface.
//!
//! Each command set owns one topic family and one recognised JSON field.
//! Values outside the set are never an error; the dispatcher logs and drops
//! them so newer cloud-side commands cannot crash an older node.

use core::fmt::Debug;

use crate::control::barrier::Direction;

/// A closed set of command values carried in a single JSON field.
pub trait CommandSet: Sized + Copy + Debug + Send + 'static {
    /// Name of the top-level field holding the command value.
    const FIELD: &'static str;

    /// Map a field value onto the set. `None` for unrecognised values.
    fn parse(value: &str) -> Option<Self>;
}

/// Barrier commands, carried in the `command` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierCommand {
    Unlock,
    Lock,
}

impl BarrierCommand {
    /// Unlocking lifts the barrier; locking lowers it.
    pub fn direction(self) -> Direction {
        match self {
            Self::Unlock => Direction::Open,
            Self::Lock => Direction::Close,
        }
    }
}

impl CommandSet for BarrierCommand {
    const FIELD: &'static str = "command";

    fn parse(value: &str) -> Option<Self> {
        match value {
            "unlock" => Some(Self::Unlock),
            "lock" => Some(Self::Lock),
            _ => None,
        }
    }
}

/// Buzzer sounds, carried in the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sound {
    ObstacleWarning,
    ObstacleAlert,
    VehicleParked,
    VehicleLeaving,
    BarrierLocking,
    BarrierUnlocking,
    ConnectionLost,
    ConnectionEstablished,
    /// Silence whatever is playing.
    Stop,
}

impl Sound {
    pub const ALL: [Sound; 9] = [
        Self::ObstacleWarning,
        Self::ObstacleAlert,
        Self::VehicleParked,
        Self::VehicleLeaving,
        Self::BarrierLocking,
        Self::BarrierUnlocking,
        Self::ConnectionLost,
        Self::ConnectionEstablished,
        Self::Stop,
    ];

    /// Wire name of the sound.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ObstacleWarning => "obstacle-warning",
            Self::ObstacleAlert => "obstacle-alert",
            Self::VehicleParked => "vehicle-parked",
            Self::VehicleLeaving => "vehicle-leaving",
            Self::BarrierLocking => "barrier-locking",
            Self::BarrierUnlocking => "barrier-unlocking",
            Self::ConnectionLost => "connection-lost",
            Self::ConnectionEstablished => "connection-established",
            Self::Stop => "stop",
        }
    }
}

impl CommandSet for Sound {
    const FIELD: &'static str = "type";

    fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }
}
