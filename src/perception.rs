//! Obstacle perception: ultrasonic distance plus the bay presence sensor,
//! sampled on a fixed period.

use embedded_hal::digital::{InputPin, OutputPin};
use log::{info, warn};

use crate::app::events::{AppEvent, ObstacleSample};
use crate::app::ports::{EventSink, TimePort};
use crate::config::ProbeConfig;
use crate::sensors::position::PresenceSensor;
use crate::sensors::ultrasonic::UltrasonicProbe;

pub struct ObstacleMonitor<TRIG, ECHO, T, P> {
    probe: UltrasonicProbe<TRIG, ECHO, T>,
    presence: PresenceSensor<P>,
    config: ProbeConfig,
}

impl<TRIG, ECHO, T, P> ObstacleMonitor<TRIG, ECHO, T, P>
where
    TRIG: OutputPin,
    ECHO: InputPin,
    T: TimePort,
    P: InputPin,
{
    pub fn new(probe: UltrasonicProbe<TRIG, ECHO, T>, presence: PresenceSensor<P>, config: ProbeConfig) -> Self {
        Self {
            probe,
            presence,
            config,
        }
    }

    /// Take one sample. Failures degrade to "no reading" / "absent".
    pub fn sample(&mut self, sink: &mut impl EventSink) -> ObstacleSample {
        let measured = match self.config.temperature_c {
            Some(t) => self.probe.measure_compensated(self.config.max_distance_cm, t),
            None => self.probe.measure(self.config.max_distance_cm),
        };
        let distance_cm = measured
            .inspect_err(|e| warn!("Failed to measure distance: {}", e))
            .ok();

        let vehicle_present = self
            .presence
            .is_present()
            .inspect_err(|e| warn!("Presence sensor read failed: {}", e))
            .unwrap_or(false);

        if vehicle_present {
            match distance_cm {
                Some(d) => info!("Vehicle detected: distance = {:.0} cm", d),
                None => info!("Vehicle detected: distance unknown"),
            }
        }

        let sample = ObstacleSample {
            distance_cm,
            vehicle_present,
        };
        sink.emit(&AppEvent::Obstacle(sample));
        sample
    }

    /// Obstacle task body.
    pub fn run(&mut self, time: &impl TimePort, sink: &mut impl EventSink, interval_ms: u32) -> ! {
        info!("Obstacle perception running");
        loop {
            self.sample(sink);
            time.sleep_ms(interval_ms);
        }
    }
}
