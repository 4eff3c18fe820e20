//! Digital position inputs: end-stop limit switches and the FC-33
//! presence sensor.

use embedded_hal::digital::InputPin;

use crate::app::ports::ConfirmationPort;
use crate::control::barrier::Direction;
use crate::error::SensorError;

/// Electrical level that means "active".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveLevel {
    Low,
    High,
}

fn is_active<P: InputPin>(pin: &mut P, level: ActiveLevel) -> Result<bool, SensorError> {
    let result = match level {
        ActiveLevel::Low => pin.is_low(),
        ActiveLevel::High => pin.is_high(),
    };
    result.map_err(|_| SensorError::GpioReadFailed)
}

/// One switch per end stop, wired to ground with pull-ups (active-low).
pub struct LimitSwitches<L, U> {
    locked: L,
    unlocked: U,
}

impl<L: InputPin, U: InputPin> LimitSwitches<L, U> {
    pub fn new(locked: L, unlocked: U) -> Self {
        Self { locked, unlocked }
    }

    pub fn is_locked(&mut self) -> Result<bool, SensorError> {
        is_active(&mut self.locked, ActiveLevel::Low)
    }

    pub fn is_unlocked(&mut self) -> Result<bool, SensorError> {
        is_active(&mut self.unlocked, ActiveLevel::Low)
    }
}

impl<L: InputPin, U: InputPin> ConfirmationPort for LimitSwitches<L, U> {
    fn target_reached(&mut self, direction: Direction) -> Result<bool, SensorError> {
        match direction {
            Direction::Open => self.is_unlocked(),
            Direction::Close => self.is_locked(),
        }
    }
}

/// Single-input sensor (FC-33 slot / IR presence).
pub struct PresenceSensor<P> {
    pin: P,
    active: ActiveLevel,
}

impl<P: InputPin> PresenceSensor<P> {
    pub fn new(pin: P, active: ActiveLevel) -> Self {
        Self { pin, active }
    }

    pub fn is_present(&mut self) -> Result<bool, SensorError> {
        is_active(&mut self.pin, self.active)
    }
}

/// Boards with a single FC-33 at the barrier arm use it for both end
/// positions.
impl<P: InputPin> ConfirmationPort for PresenceSensor<P> {
    fn target_reached(&mut self, _direction: Direction) -> Result<bool, SensorError> {
        self.is_present()
    }
}
