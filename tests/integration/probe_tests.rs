//! Ultrasonic probe timing on a simulated echo line.

use std::sync::Arc;

use parkgate::adapters::time::SimClock;
use parkgate::app::events::AppEvent;
use parkgate::config::ProbeConfig;
use parkgate::error::{Error, ProbeError};
use parkgate::perception::ObstacleMonitor;
use parkgate::sensors::position::{ActiveLevel, LimitSwitches, PresenceSensor};
use parkgate::sensors::ultrasonic::{ECHO_START_TIMEOUT_US, UltrasonicProbe};
use parkgate::app::ports::{ConfirmationPort, TimePort};
use parkgate::control::barrier::Direction;

use crate::mock_hw::{EchoPin, LevelPin, RecordingPin, RecordingSink};

fn probe(
    rise_after_us: Option<u64>,
    high_for_us: u64,
) -> (UltrasonicProbe<RecordingPin, EchoPin, Arc<SimClock>>, RecordingPin, Arc<SimClock>) {
    let clock = Arc::new(SimClock::new());
    let trigger = RecordingPin::default();
    let echo = EchoPin::new(Arc::clone(&clock), rise_after_us, high_for_us);
    let p = UltrasonicProbe::new(trigger.clone(), echo, Arc::clone(&clock)).unwrap();
    (p, trigger, clock)
}

#[test]
fn distance_is_half_the_round_trip() {
    let (mut p, trigger, _) = probe(Some(100), 1_000);

    let cm = p.measure(500).unwrap();

    // 1000 µs * 0.0343 cm/µs / 2
    assert!((cm - 17.15).abs() < 0.01, "got {cm}");
    // init low, then the low-high-low trigger pulse
    assert_eq!(trigger.history(), vec![false, false, true, false]);
}

#[test]
fn temperature_raises_the_speed_of_sound() {
    let (mut cold, _, _) = probe(Some(100), 1_000);
    let (mut warm, _, _) = probe(Some(100), 1_000);

    let at_zero = cold.measure(500).unwrap();
    let at_twenty = warm.measure_compensated(500, 20.0).unwrap();

    // (0.0343 + 0.012) * 1000 / 2
    assert!((at_twenty - 23.15).abs() < 0.01, "got {at_twenty}");
    assert!(at_twenty > at_zero);
}

#[test]
fn missing_echo_is_a_hardware_fault() {
    let (mut p, _, clock) = probe(None, 0);

    let err = p.measure(500).unwrap_err();

    assert_eq!(err, Error::Probe(ProbeError::NoEcho));
    let waited = clock.uptime_us();
    assert!(waited >= ECHO_START_TIMEOUT_US && waited < ECHO_START_TIMEOUT_US + 1_000);
}

#[test]
fn echo_beyond_max_distance_is_out_of_range() {
    // 10 cm allows about 583 µs of echo.
    let (mut p, _, _) = probe(Some(100), 1_000);
    assert_eq!(p.measure(10).unwrap_err(), Error::Probe(ProbeError::EchoTooLong));
}

#[test]
fn zero_max_distance_is_rejected_without_a_pulse() {
    let (mut p, trigger, _) = probe(Some(100), 1_000);

    assert!(matches!(p.measure(0), Err(Error::InvalidArgument(_))));
    assert_eq!(trigger.history(), vec![false], "only the init level");
}

#[test]
fn absurd_temperature_is_rejected() {
    let (mut p, _, _) = probe(Some(100), 1_000);
    assert!(matches!(p.measure_compensated(500, -100.0), Err(Error::InvalidArgument(_))));
}

// ── Obstacle monitor ──────────────────────────────────────────

#[test]
fn monitor_reports_vehicle_and_distance() {
    let (p, _, _) = probe(Some(100), 1_000);
    let presence_pin = LevelPin::default();
    presence_pin.set(true);
    let config = ProbeConfig {
        max_distance_cm: 500,
        temperature_c: None,
    };
    let mut monitor = ObstacleMonitor::new(p, PresenceSensor::new(presence_pin, ActiveLevel::High), config);
    let mut sink = RecordingSink::new();

    let sample = monitor.sample(&mut sink);

    assert!(sample.vehicle_present);
    assert!(sample.distance_cm.is_some());
    assert!(matches!(sink.events.as_slice(), [AppEvent::Obstacle(s)] if *s == sample));
}

#[test]
fn monitor_degrades_to_no_reading() {
    let (p, _, _) = probe(None, 0);
    let config = ProbeConfig {
        max_distance_cm: 500,
        temperature_c: Some(20.0),
    };
    let mut monitor = ObstacleMonitor::new(p, PresenceSensor::new(LevelPin::default(), ActiveLevel::High), config);

    let sample = monitor.sample(&mut RecordingSink::new());

    assert_eq!(sample.distance_cm, None);
    assert!(!sample.vehicle_present);
}

// ── Confirmation inputs ───────────────────────────────────────

#[test]
fn limit_switches_confirm_by_direction() {
    let locked = LevelPin::default();
    let unlocked = LevelPin::default();
    // Active low: released switches read high.
    locked.set(true);
    unlocked.set(true);
    let mut switches = LimitSwitches::new(locked.clone(), unlocked.clone());

    assert!(!switches.target_reached(Direction::Open).unwrap());
    assert!(!switches.target_reached(Direction::Close).unwrap());

    unlocked.set(false);
    assert!(switches.target_reached(Direction::Open).unwrap());
    assert!(!switches.target_reached(Direction::Close).unwrap());

    unlocked.set(true);
    locked.set(false);
    assert!(switches.target_reached(Direction::Close).unwrap());
}

#[test]
fn presence_sensor_confirms_any_direction() {
    let pin = LevelPin::default();
    let mut sensor = PresenceSensor::new(pin.clone(), ActiveLevel::High);
    assert!(!sensor.target_reached(Direction::Close).unwrap());
    pin.set(true);
    assert!(sensor.target_reached(Direction::Open).unwrap());
    assert!(sensor.target_reached(Direction::Close).unwrap());
}
