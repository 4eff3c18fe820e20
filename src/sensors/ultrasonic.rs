//! HC-SR04 ultrasonic distance probe.
//!
//! Emits a 10 µs trigger pulse and times the echo pulse. Distance is half
//! the round trip at the speed of sound, optionally corrected for ambient
//! temperature.
//!
//! Two failure modes are kept apart: no echo ever starting means a wiring
//! or hardware fault, while an echo that outlasts the caller's maximum
//! distance just means nothing is in range.

use embedded_hal::digital::{InputPin, OutputPin};
use log::info;

use crate::app::ports::TimePort;
use crate::error::{Error, ProbeError};

const TRIGGER_LOW_DELAY_US: u32 = 2;
const TRIGGER_HIGH_DELAY_US: u32 = 10;

/// Upper bound on waiting for the echo line to rise.
pub const ECHO_START_TIMEOUT_US: u64 = 60_000;

/// Speed of sound used without temperature correction (cm/µs).
pub const SPEED_OF_SOUND_CM_PER_US: f32 = 0.0343;
/// Linear correction per °C (cm/µs).
pub const SPEED_PER_DEGREE_CM_PER_US: f32 = 0.0006;

pub struct UltrasonicProbe<TRIG, ECHO, T> {
    trigger: TRIG,
    echo: ECHO,
    time: T,
}

impl<TRIG, ECHO, T> UltrasonicProbe<TRIG, ECHO, T>
where
    TRIG: OutputPin,
    ECHO: InputPin,
    T: TimePort,
{
    pub fn new(mut trigger: TRIG, echo: ECHO, time: T) -> Result<Self, Error> {
        trigger.set_low().map_err(|_| ProbeError::Gpio)?;
        info!("HC-SR04 probe initialised");
        Ok(Self {
            trigger,
            echo,
            time,
        })
    }

    /// Distance in cm to the nearest echo within `max_distance_cm`.
    pub fn measure(&mut self, max_distance_cm: u32) -> Result<f32, Error> {
        self.measure_at_speed(max_distance_cm, SPEED_OF_SOUND_CM_PER_US)
    }

    /// Like [`measure`](Self::measure), correcting the speed of sound for
    /// `temperature_c`.
    pub fn measure_compensated(
        &mut self,
        max_distance_cm: u32,
        temperature_c: f32,
    ) -> Result<f32, Error> {
        let speed = SPEED_OF_SOUND_CM_PER_US + SPEED_PER_DEGREE_CM_PER_US * temperature_c;
        if !speed.is_finite() || speed <= 0.0 {
            return Err(Error::InvalidArgument("temperature out of range"));
        }
        self.measure_at_speed(max_distance_cm, speed)
    }

    /// Echo pulse width in µs, bounded by `max_time_us`.
    pub fn measure_raw(&mut self, max_time_us: u64) -> Result<u64, Error> {
        self.pulse_trigger()?;

        let wait_start = self.time.uptime_us();
        while !self.echo_high()? {
            if self.time.uptime_us().saturating_sub(wait_start) >= ECHO_START_TIMEOUT_US {
                return Err(ProbeError::NoEcho.into());
            }
        }

        let echo_start = self.time.uptime_us();
        while self.echo_high()? {
            if self.time.uptime_us().saturating_sub(echo_start) >= max_time_us {
                return Err(ProbeError::EchoTooLong.into());
            }
        }
        Ok(self.time.uptime_us().saturating_sub(echo_start))
    }

    fn measure_at_speed(&mut self, max_distance_cm: u32, speed_cm_per_us: f32) -> Result<f32, Error> {
        if max_distance_cm == 0 {
            return Err(Error::InvalidArgument("max_distance_cm must be > 0"));
        }
        let max_time_us = (2.0 * max_distance_cm as f32 / speed_cm_per_us) as u64;
        let echo_us = self.measure_raw(max_time_us)?;
        Ok(echo_us as f32 * speed_cm_per_us / 2.0)
    }

    fn pulse_trigger(&mut self) -> Result<(), ProbeError> {
        self.trigger.set_low().map_err(|_| ProbeError::Gpio)?;
        self.time.delay_us(TRIGGER_LOW_DELAY_US);
        self.trigger.set_high().map_err(|_| ProbeError::Gpio)?;
        self.time.delay_us(TRIGGER_HIGH_DELAY_US);
        self.trigger.set_low().map_err(|_| ProbeError::Gpio)
    }

    fn echo_high(&mut self) -> Result<bool, ProbeError> {
        self.echo.is_high().map_err(|_| ProbeError::Gpio)
    }
}
