//! Barrier gear motor driver (L298N H-bridge).
//!
//! Binary full-speed control through the two bridge inputs:
//!
//! | IN1 | IN2 | Motion        |
//! |-----|-----|---------------|
//! |  1  |  0  | raise (open)  |
//! |  0  |  1  | lower (close) |
//! |  0  |  0  | stopped       |
//!
//! The inactive input is always driven low before the active one goes high,
//! so the bridge never sees both inputs high.

use embedded_hal::digital::OutputPin;

use crate::app::ports::DrivePort;
use crate::control::barrier::Direction;
use crate::error::ActuatorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorState {
    Stopped,
    Running(Direction),
}

pub struct MotorDriver<IN1, IN2> {
    in1: IN1,
    in2: IN2,
    state: MotorState,
}

impl<IN1: OutputPin, IN2: OutputPin> MotorDriver<IN1, IN2> {
    /// Takes the bridge inputs and forces them low.
    pub fn new(in1: IN1, in2: IN2) -> Result<Self, ActuatorError> {
        let mut driver = Self {
            in1,
            in2,
            state: MotorState::Stopped,
        };
        driver.stop()?;
        Ok(driver)
    }

    pub fn state(&self) -> MotorState {
        self.state
    }
}

impl<IN1: OutputPin, IN2: OutputPin> DrivePort for MotorDriver<IN1, IN2> {
    fn drive(&mut self, direction: Direction) -> Result<(), ActuatorError> {
        match direction {
            Direction::Open => {
                self.in2.set_low().map_err(|_| ActuatorError::GpioWriteFailed)?;
                self.in1.set_high().map_err(|_| ActuatorError::GpioWriteFailed)?;
            }
            Direction::Close => {
                self.in1.set_low().map_err(|_| ActuatorError::GpioWriteFailed)?;
                self.in2.set_high().map_err(|_| ActuatorError::GpioWriteFailed)?;
            }
        }
        self.state = MotorState::Running(direction);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ActuatorError> {
        // Attempt both inputs even if the first write fails.
        let a = self.in1.set_low().is_ok();
        let b = self.in2.set_low().is_ok();
        if !(a && b) {
            return Err(ActuatorError::GpioWriteFailed);
        }
        self.state = MotorState::Stopped;
        Ok(())
    }

    fn is_stopped(&self) -> bool {
        self.state == MotorState::Stopped
    }
}
