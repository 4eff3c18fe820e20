//! Retrying register reads and INA3221 conversion over a scripted bus.

use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

use parkgate::adapters::time::SimClock;
use parkgate::app::ports::TimePort;
use parkgate::config::{BusConfig, SystemConfig};
use parkgate::error::{Error, SensorError};
use parkgate::sensors::ina3221::{Ina3221, MAX_READ_LEN, REG_CONFIG, RegisterReader};

use crate::mock_hw::ScriptedI2c;

const ADDR: u8 = 0x40;
const NACK: ErrorKind = ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data);

fn bus_config() -> BusConfig {
    SystemConfig::default().bus
}

#[test]
fn transient_failures_are_retried_with_backoff() {
    let clock = SimClock::new();
    let mut bus = ScriptedI2c::new(&[ADDR]).then_err(NACK, 4).then_ok(&[0x12, 0x34]);
    let mut reader = RegisterReader::new(&mut bus, &clock, &bus_config());

    let reading = reader.read(0x02, 2).unwrap();

    assert_eq!(reading.attempts, 5);
    assert_eq!(reading.register, 0x02);
    assert_eq!(reading.bytes.as_slice(), &[0x12, 0x34]);
    assert_eq!(reading.word(), Some(0x1234));
    // Four failures, four 200 ms backoffs.
    assert_eq!(clock.uptime_us(), 800_000);
    drop(reader);
    assert_eq!(bus.reads_seen(), 5);
    assert!(bus.log.iter().all(|(addr, w)| *addr == ADDR && w == &[0x02]));
}

#[test]
fn exhausted_retries_return_the_last_error() {
    let clock = SimClock::new();
    let mut bus = ScriptedI2c::new(&[ADDR])
        .then_err(ErrorKind::Bus, 4)
        .then_err(ErrorKind::ArbitrationLoss, 1)
        .then_ok(&[0, 0]);
    let mut reader = RegisterReader::new(&mut bus, &clock, &bus_config());

    let err = reader.read(0x01, 2).unwrap_err();

    assert_eq!(err, Error::Sensor(SensorError::Bus(ErrorKind::ArbitrationLoss)));
    // No backoff after the final attempt.
    assert_eq!(clock.uptime_us(), 800_000);
    drop(reader);
    assert_eq!(bus.reads_seen(), 5, "exactly read_attempts exchanges");
}

#[test]
fn first_try_success_costs_no_delay() {
    let clock = SimClock::new();
    let mut bus = ScriptedI2c::new(&[ADDR]).then_ok(&[1, 2, 3, 4]);
    let mut reader = RegisterReader::new(&mut bus, &clock, &bus_config());

    let reading = reader.read(0x05, 4).unwrap();

    assert_eq!(reading.attempts, 1);
    assert_eq!(reading.bytes.len(), 4);
    assert_eq!(clock.uptime_us(), 0);
}

#[test]
fn read_length_is_validated_before_touching_the_bus() {
    let clock = SimClock::new();
    let mut bus = ScriptedI2c::new(&[ADDR]);
    let mut reader = RegisterReader::new(&mut bus, &clock, &bus_config());

    assert!(matches!(reader.read(0x01, 0), Err(Error::InvalidArgument(_))));
    assert!(matches!(reader.read(0x01, MAX_READ_LEN + 1), Err(Error::InvalidArgument(_))));
    drop(reader);
    assert!(bus.log.is_empty());
}

#[test]
fn configured_attempt_count_is_honoured() {
    let clock = SimClock::new();
    let config = BusConfig {
        read_attempts: 2,
        retry_backoff_ms: 50,
        ..bus_config()
    };
    let mut bus = ScriptedI2c::new(&[ADDR]).then_err(NACK, 2).then_ok(&[0, 1]);
    let mut reader = RegisterReader::new(&mut bus, &clock, &config);

    assert!(reader.read(0x01, 2).is_err());
    assert_eq!(clock.uptime_us(), 50_000);
    drop(reader);
    assert_eq!(bus.reads_seen(), 2);
}

// ── INA3221 ───────────────────────────────────────────────────

#[test]
fn init_writes_the_configuration_register() {
    let clock = SimClock::new();
    let mut bus = ScriptedI2c::new(&[ADDR]);
    let mut ina = Ina3221::new(RegisterReader::new(&mut bus, &clock, &bus_config()));

    ina.init().unwrap();
    drop(ina);

    assert_eq!(bus.log, vec![(ADDR, vec![REG_CONFIG, 0x71, 0x27])]);
}

#[test]
fn init_reports_an_absent_device() {
    let clock = SimClock::new();
    let mut bus = ScriptedI2c::new(&[]);
    let mut ina = Ina3221::new(RegisterReader::new(&mut bus, &clock, &bus_config()));

    assert!(matches!(ina.init(), Err(Error::Sensor(SensorError::Bus(_)))));
}

#[test]
fn channel_two_reads_its_own_registers() {
    let clock = SimClock::new();
    // 500 * 10 µV shunt, 12 000 mV bus.
    let mut bus = ScriptedI2c::new(&[ADDR]).then_ok(&[0x01, 0xF4]).then_ok(&[0x2E, 0xE0]);
    let mut ina = Ina3221::new(RegisterReader::new(&mut bus, &clock, &bus_config()));

    let r = ina.read_channel(2).unwrap();
    drop(ina);

    assert_eq!(r.channel, 2);
    assert!((r.shunt_voltage_mv - 5.0).abs() < 1e-4);
    assert!((r.bus_voltage_v - 12.0).abs() < 1e-4);
    assert!((r.current_ma - 50.0).abs() < 1e-3);
    assert_eq!(bus.log, vec![(ADDR, vec![0x03]), (ADDR, vec![0x04])]);
}

#[test]
fn channel_out_of_range_is_rejected() {
    let clock = SimClock::new();
    let mut bus = ScriptedI2c::new(&[ADDR]);
    let mut ina = Ina3221::new(RegisterReader::new(&mut bus, &clock, &bus_config()));

    assert!(matches!(ina.read_channel(0), Err(Error::InvalidArgument(_))));
    assert!(matches!(ina.read_channel(4), Err(Error::InvalidArgument(_))));
}

#[test]
fn scan_lists_acking_addresses() {
    let clock = SimClock::new();
    let mut bus = ScriptedI2c::new(&[0x40, 0x68]);
    let mut ina = Ina3221::new(RegisterReader::new(&mut bus, &clock, &bus_config()));

    assert_eq!(ina.scan_bus().as_slice(), &[0x40, 0x68]);
}
