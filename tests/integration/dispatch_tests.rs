//! Subscribe/acknowledge round trips and command dispatch, end to end from
//! raw payload to the barrier queue.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use parkgate::adapters::time::SimClock;
use parkgate::app::commands::{BarrierCommand, Sound};
use parkgate::app::ports::{AckStatus, AudioPort, QoS};
use parkgate::app::service::{BarrierService, BuzzerControl};
use parkgate::comms::agent::{AgentClient, SubscriptionHandle, SubscriptionState};
use parkgate::comms::dispatcher::{CommandDispatcher, DispatchOutcome};
use parkgate::comms::gates::ConnectivityGates;
use parkgate::comms::router::Router;
use parkgate::config::{BarrierTiming, CommsConfig, SystemConfig};
use parkgate::control::barrier::{ActuationResult, BarrierController, Direction};
use parkgate::error::{CommsError, Error};

use crate::mock_hw::{AckBehaviour, DriveCall, MockAgent, MockBarrier, RecordingSink, open_gates};

const UNLOCK: &str = "cmd/pb/city/area/zone/node-1/barrier/unlock";
const LOCK: &str = "cmd/pb/city/area/zone/node-1/barrier/lock";

fn comms() -> CommsConfig {
    CommsConfig {
        ack_timeout_ms: 100,
        enqueue_block_ms: 5,
        ..SystemConfig::default().comms
    }
}

fn client(agent: &Arc<MockAgent>) -> AgentClient<Arc<MockAgent>> {
    AgentClient::new(Arc::clone(agent), Arc::new(Router::new()), &comms())
}

type Service = BarrierService<MockBarrier, SimClock>;

fn service() -> Arc<Service> {
    service_behind(open_gates())
}

fn service_behind(gates: Arc<ConnectivityGates>) -> Arc<Service> {
    let timing = BarrierTiming {
        settle_ms: 50,
        operation_timeout_ms: 1_000,
        poll_interval_ms: 10,
    };
    let controller = BarrierController::new(MockBarrier::confirming_on(1), SimClock::new(), timing);
    Arc::new(BarrierService::new(controller, gates))
}

// ── Subscribe round trip ──────────────────────────────────────

#[test]
fn acknowledged_subscribe_registers_route() {
    let agent = MockAgent::new(AckBehaviour::Ack(AckStatus::Success));
    let client = client(&agent);
    let mut handle = SubscriptionHandle::new(UNLOCK, QoS::AtLeastOnce).unwrap();
    assert_eq!(handle.state(), SubscriptionState::Unsubscribed);

    let dispatcher = Arc::new(CommandDispatcher::<BarrierCommand, _>::new(service()));
    client.subscribe(&mut handle, dispatcher).unwrap();

    assert_eq!(handle.state(), SubscriptionState::Subscribed);
    assert_eq!(handle.correlation_id(), Some(1));
    assert_eq!(client.router().len(), 1);
    let sent = agent.requests();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].subscribe);
    assert_eq!(sent[0].topic, UNLOCK);
    assert_eq!(sent[0].qos, QoS::AtLeastOnce);
}

#[test]
fn rejected_subscribe_fails_and_unroutes() {
    let agent = MockAgent::new(AckBehaviour::Ack(AckStatus::Failed(0x80)));
    let client = client(&agent);
    let mut handle = SubscriptionHandle::new(LOCK, QoS::AtLeastOnce).unwrap();

    let err = client
        .subscribe(&mut handle, Arc::new(CommandDispatcher::<BarrierCommand, _>::new(service())))
        .unwrap_err();

    assert_eq!(err, Error::Comms(CommsError::AckRejected(0x80)));
    assert_eq!(handle.state(), SubscriptionState::Failed);
    assert!(client.router().is_empty());
}

#[test]
fn unanswered_subscribe_times_out() {
    let agent = MockAgent::new(AckBehaviour::Never);
    let client = client(&agent);
    let mut handle = SubscriptionHandle::new(LOCK, QoS::AtLeastOnce).unwrap();

    let err = client
        .subscribe(&mut handle, Arc::new(CommandDispatcher::<BarrierCommand, _>::new(service())))
        .unwrap_err();

    assert_eq!(err, Error::Comms(CommsError::AckTimeout));
    assert_eq!(handle.state(), SubscriptionState::Failed);
}

#[test]
fn dropped_completion_is_reported_not_waited_out() {
    let agent = MockAgent::new(AckBehaviour::Drop);
    let err = client(&agent).publish("dt/x", QoS::AtLeastOnce, b"{}").unwrap_err();
    assert_eq!(err, Error::Comms(CommsError::AckDropped));
}

#[test]
fn full_queue_is_retried_until_accepted() {
    let agent = MockAgent::new(AckBehaviour::Ack(AckStatus::Success));
    agent.fill_queue(3);

    let id = client(&agent).publish("dt/x", QoS::AtLeastOnce, b"{}").unwrap();

    assert_eq!(id, 1);
    assert_eq!(agent.attempts(), 4);
    assert_eq!(agent.requests().len(), 1);
}

#[test]
fn queue_that_never_drains_fails_at_the_deadline() {
    let agent = MockAgent::new(AckBehaviour::Ack(AckStatus::Success));
    agent.fill_queue(u32::MAX);

    let err = client(&agent).publish("dt/x", QoS::AtLeastOnce, b"{}").unwrap_err();

    assert_eq!(err, Error::Comms(CommsError::EnqueueFailed));
    assert!(agent.requests().is_empty());
}

#[test]
fn queueing_delay_counts_against_the_ack_timeout() {
    let agent = MockAgent::new(AckBehaviour::Never);
    agent.fill_queue(30);
    let config = CommsConfig {
        ack_timeout_ms: 200,
        enqueue_block_ms: 5,
        ..SystemConfig::default().comms
    };
    let client = AgentClient::new(Arc::clone(&agent), Arc::new(Router::new()), &config);

    let started = Instant::now();
    let err = client.publish("dt/x", QoS::AtLeastOnce, b"{}").unwrap_err();
    let waited = started.elapsed();

    assert!(
        matches!(err, Error::Comms(CommsError::AckTimeout | CommsError::EnqueueFailed)),
        "got {err:?}"
    );
    assert!(waited >= Duration::from_millis(190), "returned early: {waited:?}");
    assert!(waited < Duration::from_millis(300), "waited {waited:?}");
}

#[test]
fn closed_agent_fails_immediately() {
    let agent = MockAgent::new(AckBehaviour::Closed);
    let err = client(&agent).publish("dt/x", QoS::AtMostOnce, b"{}").unwrap_err();
    assert_eq!(err, Error::Comms(CommsError::EnqueueFailed));
    assert_eq!(agent.attempts(), 1);
}

#[test]
fn correlation_ids_are_unique_per_request() {
    let agent = MockAgent::new(AckBehaviour::Ack(AckStatus::Success));
    let client = client(&agent);
    let a = client.publish("dt/x", QoS::AtLeastOnce, b"1").unwrap();
    let b = client.publish("dt/x", QoS::AtLeastOnce, b"2").unwrap();
    assert_ne!(a, b);
    let ids: Vec<u32> = agent.requests().iter().map(|r| r.correlation_id).collect();
    assert_eq!(ids, vec![a, b]);
}

// ── Inbound dispatch ──────────────────────────────────────────

#[test]
fn routed_unlock_queues_an_open() {
    let agent = MockAgent::new(AckBehaviour::Ack(AckStatus::Success));
    let client = client(&agent);
    let svc = service();
    let dispatcher = Arc::new(CommandDispatcher::<BarrierCommand, _>::new(Arc::clone(&svc)));
    for topic in [UNLOCK, LOCK] {
        let mut handle = SubscriptionHandle::new(topic, QoS::AtLeastOnce).unwrap();
        client.subscribe(&mut handle, dispatcher.clone()).unwrap();
    }

    let delivered = client.router().deliver(UNLOCK, br#"{"command":"unlock"}"#);
    assert_eq!(delivered, 1);

    let outcome = svc.run_pending(&mut RecordingSink::new()).unwrap().unwrap();
    assert_eq!(outcome.direction, Direction::Open);
    assert_eq!(outcome.result, ActuationResult::Completed);
    svc.controller().with_hardware(|hw| {
        assert_eq!(hw.drive_count(), 1);
        assert_eq!(hw.calls[0], DriveCall::Drive(Direction::Open));
    });
}

#[test]
fn lock_payload_drives_the_barrier_closed_once() {
    let svc = service();
    let dispatcher = CommandDispatcher::<BarrierCommand, _>::new(Arc::clone(&svc));

    assert_eq!(
        dispatcher.dispatch(LOCK, br#"{"command":"lock"}"#),
        DispatchOutcome::Executed(BarrierCommand::Lock)
    );
    let outcome = svc.run_pending(&mut RecordingSink::new()).unwrap().unwrap();

    assert_eq!(outcome.direction, Direction::Close);
    svc.controller().with_hardware(|hw| {
        assert_eq!(hw.drive_count(), 1);
        assert_eq!(hw.calls, vec![DriveCall::Drive(Direction::Close), DriveCall::Stop]);
    });
    assert!(svc.run_pending(&mut RecordingSink::new()).is_none());
}

#[test]
fn commands_are_refused_while_gated() {
    let gates = open_gates();
    gates.set_maintenance(true);
    let svc = service_behind(Arc::clone(&gates));
    let dispatcher = CommandDispatcher::<BarrierCommand, _>::new(Arc::clone(&svc));

    assert_eq!(
        dispatcher.dispatch(UNLOCK, br#"{"command":"unlock"}"#),
        DispatchOutcome::Rejected(BarrierCommand::Unlock, Error::Comms(CommsError::NotReady))
    );

    gates.set_maintenance(false);
    assert!(svc.run_pending(&mut RecordingSink::new()).is_none());
    svc.controller().with_hardware(|hw| assert_eq!(hw.drive_count(), 0));
}

#[test]
fn second_command_while_queued_is_rejected() {
    let dispatcher = CommandDispatcher::<BarrierCommand, _>::new(service());

    assert_eq!(
        dispatcher.dispatch(UNLOCK, br#"{"command":"unlock"}"#),
        DispatchOutcome::Executed(BarrierCommand::Unlock)
    );
    assert_eq!(
        dispatcher.dispatch(LOCK, br#"{"command":"lock"}"#),
        DispatchOutcome::Rejected(BarrierCommand::Lock, Error::Busy)
    );
}

#[test]
fn malformed_payloads_take_no_action() {
    let svc = service();
    let dispatcher = CommandDispatcher::<BarrierCommand, _>::new(Arc::clone(&svc));

    assert_eq!(dispatcher.dispatch(LOCK, b"not json"), DispatchOutcome::InvalidDocument);
    assert_eq!(dispatcher.dispatch(LOCK, b"[1,2]"), DispatchOutcome::InvalidDocument);
    assert_eq!(dispatcher.dispatch(LOCK, br#"{"cmd":"lock"}"#), DispatchOutcome::MissingField);
    assert_eq!(dispatcher.dispatch(LOCK, br#"{"command":"open"}"#), DispatchOutcome::UnknownValue);
    assert_eq!(dispatcher.dispatch(LOCK, br#"{"command":"spin"}"#), DispatchOutcome::UnknownValue);
    assert_eq!(dispatcher.dispatch(LOCK, br#"{"command":1}"#), DispatchOutcome::UnknownValue);

    assert!(svc.run_pending(&mut RecordingSink::new()).is_none());
    svc.controller().with_hardware(|hw| assert_eq!(hw.drive_count(), 0));
}

#[test]
fn oversized_payload_is_truncated_then_rejected() {
    let dispatcher = CommandDispatcher::<BarrierCommand, _>::new(service());
    let padding = " ".repeat(300);
    let payload = format!(r#"{{"command":"lock",{padding}"x":1}}"#);

    // The closing brace falls past the buffer, so the document is cut short.
    assert_eq!(
        dispatcher.dispatch(LOCK, payload.as_bytes()),
        DispatchOutcome::InvalidDocument
    );
}

// ── Buzzer commands ───────────────────────────────────────────

#[derive(Clone, Default)]
struct RecordingBuzzer(Arc<Mutex<Vec<Sound>>>);

impl AudioPort for RecordingBuzzer {
    fn play(&mut self, sound: Sound) {
        self.0.lock().unwrap().push(sound);
    }
}

#[test]
fn buzzer_payloads_play_the_named_sound() {
    let buzzer = RecordingBuzzer::default();
    let dispatcher = CommandDispatcher::<Sound, _>::new(BuzzerControl::new(buzzer.clone()));
    let topic = "cmd/pb/city/area/zone/node-1/buzzer";

    for sound in Sound::ALL {
        let payload = format!(r#"{{"type":"{}"}}"#, sound.as_str());
        assert_eq!(dispatcher.dispatch(topic, payload.as_bytes()), DispatchOutcome::Executed(sound));
    }
    assert_eq!(
        dispatcher.dispatch(topic, br#"{"type":"siren"}"#),
        DispatchOutcome::UnknownValue
    );
    assert_eq!(*buzzer.0.lock().unwrap(), Sound::ALL.to_vec());
}
