//! Power telemetry cycle: scripted monitor → record → mock agent.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use embedded_hal::i2c::ErrorKind;
use serde_json::Value;

use parkgate::adapters::time::SimClock;
use parkgate::app::events::AppEvent;
use parkgate::app::ports::{AckStatus, QoS};
use parkgate::comms::agent::AgentClient;
use parkgate::comms::gates::ConnectivityGates;
use parkgate::comms::router::Router;
use parkgate::config::{CommsConfig, SystemConfig};
use parkgate::error::{CommsError, Error};
use parkgate::sensors::ina3221::{Ina3221, RegisterReader};
use parkgate::telemetry::power::PowerPerception;
use parkgate::telemetry::publisher::TelemetryPublisher;

use crate::mock_hw::{AckBehaviour, MockAgent, RecordingSink, ScriptedI2c};

const ADDR: u8 = 0x40;

/// Two register reads per channel: shunt, then bus.
fn healthy_bus() -> ScriptedI2c {
    ScriptedI2c::new(&[ADDR])
        // ch1: 5.0 V regulator, 20 mA
        .then_ok(&[0x00, 0xC8])
        .then_ok(&[0x13, 0x88])
        // ch2: 12.0 V battery, 50 mA
        .then_ok(&[0x01, 0xF4])
        .then_ok(&[0x2E, 0xE0])
        // ch3: 11.8 V motor, 0 mA
        .then_ok(&[0x00, 0x00])
        .then_ok(&[0x2E, 0x18])
}

fn clock() -> SimClock {
    SimClock::starting_at(Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap())
}

fn comms() -> CommsConfig {
    CommsConfig {
        ack_timeout_ms: 100,
        enqueue_block_ms: 5,
        ..SystemConfig::default().comms
    }
}

fn perception<'a>(
    bus: &'a mut ScriptedI2c,
    clock: &'a SimClock,
    agent: &Arc<MockAgent>,
) -> PowerPerception<&'a mut ScriptedI2c, &'a SimClock, Arc<MockAgent>> {
    let config = SystemConfig::default();
    let client = Arc::new(AgentClient::new(Arc::clone(agent), Arc::new(Router::new()), &comms()));
    let topic = config.deployment.power_topic().unwrap();
    let publisher = TelemetryPublisher::new(client, topic, QoS::AtLeastOnce);
    let monitor = Ina3221::new(RegisterReader::new(bus, clock, &config.bus));
    PowerPerception::new(monitor, publisher, config.deployment.session_id)
}

fn open_gates() -> ConnectivityGates {
    let gates = ConnectivityGates::new();
    gates.set_connected(true);
    gates
}

fn published_document(agent: &MockAgent) -> Value {
    let requests = agent.requests();
    assert_eq!(requests.len(), 1);
    serde_json::from_slice(&requests[0].payload).unwrap()
}

#[test]
fn healthy_cycle_publishes_every_channel() {
    let agent = MockAgent::new(AckBehaviour::Ack(AckStatus::Success));
    let clock = clock();
    let mut bus = healthy_bus();
    let mut sink = RecordingSink::new();

    let id = perception(&mut bus, &clock, &agent)
        .run_cycle(&open_gates(), &clock, &mut sink)
        .unwrap();

    let request = &agent.requests()[0];
    assert!(!request.subscribe);
    assert_eq!(request.qos, QoS::AtLeastOnce);
    assert!(request.topic.starts_with("dt/pb/") && request.topic.ends_with("/power"));

    let doc = published_document(&agent);
    assert_eq!(doc["timestamp"], "2026-10-19T08:30:00Z");
    assert_eq!(doc["status"], "ok");
    assert_eq!(doc["session-id"], SystemConfig::default().deployment.session_id.as_str());
    let channels = doc["channels"].as_array().unwrap();
    assert_eq!(channels.len(), 3);
    assert_eq!(channels[0]["type"], "regulator");
    assert_eq!(channels[1]["type"], "battery");
    assert_eq!(channels[2]["type"], "motor");
    assert_eq!(channels[1]["channel"], 2);
    assert!((channels[1]["bus_voltage_v"].as_f64().unwrap() - 12.0).abs() < 1e-3);
    assert!((channels[1]["current_ma"].as_f64().unwrap() - 50.0).abs() < 1e-3);

    assert!(matches!(
        sink.events.as_slice(),
        [AppEvent::TelemetryPublished { correlation_id }] if *correlation_id == id
    ));
}

#[test]
fn failed_channel_is_omitted_and_marked_partial() {
    let agent = MockAgent::new(AckBehaviour::Ack(AckStatus::Success));
    let clock = clock();
    let mut bus = ScriptedI2c::new(&[ADDR])
        .then_ok(&[0x00, 0xC8])
        .then_ok(&[0x13, 0x88])
        .then_err(ErrorKind::Bus, 5)
        .then_ok(&[0x00, 0x00])
        .then_ok(&[0x2E, 0x18]);

    perception(&mut bus, &clock, &agent)
        .run_cycle(&open_gates(), &clock, &mut RecordingSink::new())
        .unwrap();

    let doc = published_document(&agent);
    assert_eq!(doc["status"], "partial");
    let channels: Vec<i64> = doc["channels"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["channel"].as_i64().unwrap())
        .collect();
    assert_eq!(channels, vec![1, 3]);
}

#[test]
fn dead_bus_still_reports_an_error_record() {
    let agent = MockAgent::new(AckBehaviour::Ack(AckStatus::Success));
    let clock = clock();
    let mut bus = ScriptedI2c::new(&[ADDR]).then_err(ErrorKind::Other, 15);

    perception(&mut bus, &clock, &agent)
        .run_cycle(&open_gates(), &clock, &mut RecordingSink::new())
        .unwrap();

    let doc = published_document(&agent);
    assert_eq!(doc["status"], "error");
    assert!(doc["channels"].as_array().unwrap().is_empty());
}

#[test]
fn closed_gates_skip_the_publish() {
    let agent = MockAgent::new(AckBehaviour::Ack(AckStatus::Success));
    let clock = clock();
    let mut bus = healthy_bus();
    let mut sink = RecordingSink::new();

    let err = perception(&mut bus, &clock, &agent)
        .run_cycle(&ConnectivityGates::new(), &clock, &mut sink)
        .unwrap_err();

    assert_eq!(err, Error::Comms(CommsError::NotReady));
    assert!(agent.requests().is_empty());
    assert!(matches!(sink.events.as_slice(), [AppEvent::TelemetrySkipped]));
}

#[test]
fn maintenance_also_skips_the_publish() {
    let agent = MockAgent::new(AckBehaviour::Ack(AckStatus::Success));
    let clock = clock();
    let mut bus = healthy_bus();
    let gates = open_gates();
    gates.set_maintenance(true);

    let err = perception(&mut bus, &clock, &agent)
        .run_cycle(&gates, &clock, &mut RecordingSink::new())
        .unwrap_err();

    assert_eq!(err, Error::Comms(CommsError::NotReady));
}

#[test]
fn unacknowledged_publish_skips_the_cycle() {
    let agent = MockAgent::new(AckBehaviour::Never);
    let clock = clock();
    let mut bus = healthy_bus();
    let mut sink = RecordingSink::new();

    let err = perception(&mut bus, &clock, &agent)
        .run_cycle(&open_gates(), &clock, &mut sink)
        .unwrap_err();

    assert_eq!(err, Error::Comms(CommsError::AckTimeout));
    // No in-cycle retry.
    assert_eq!(agent.attempts(), 1);
    assert!(matches!(sink.events.as_slice(), [AppEvent::TelemetrySkipped]));
}
