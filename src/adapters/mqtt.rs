//! ESP-IDF MQTT client adapter.
//!
//! Implements [`MessageAgent`] over `esp_idf_svc::mqtt::client`. Requests
//! are handed to the IDF client, which returns a broker message id; the
//! completion is parked in an [`AckTable`] under that id until the event
//! loop sees the matching SUBACK/PUBACK.
//!
//! The event loop ([`run_event_loop`]) is the single writer of the
//! connectivity gates and the only caller of [`Router::deliver`].

use std::sync::{Arc, Mutex, PoisonError};

use esp_idf_svc::mqtt::client::{
    EspMqttClient, EspMqttConnection, EventPayload, MqttClientConfiguration, QoS as EspQoS,
};
use esp_idf_svc::sys::EspError;
use log::{debug, error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{AckStatus, AgentEvent, Completion, EnqueueError, EventSink, MessageAgent, QoS};
use crate::comms::acks::{AckTable, Settlement};
use crate::comms::gates::ConnectivityGates;
use crate::comms::router::Router;

pub struct EspMqttAgent {
    client: Mutex<EspMqttClient<'static>>,
    acks: AckTable,
}

fn esp_qos(qos: QoS) -> EspQoS {
    match qos {
        QoS::AtMostOnce => EspQoS::AtMostOnce,
        QoS::AtLeastOnce => EspQoS::AtLeastOnce,
        QoS::ExactlyOnce => EspQoS::ExactlyOnce,
    }
}

impl EspMqttAgent {
    /// Create the client. The returned connection must be handed to
    /// [`run_event_loop`] on its own task.
    pub fn connect(
        broker_url: &str,
        client_id: &str,
    ) -> Result<(Self, EspMqttConnection), EspError> {
        let conf = MqttClientConfiguration {
            client_id: Some(client_id),
            // Keep subscriptions across reconnects.
            disable_clean_session: true,
            ..Default::default()
        };
        let (client, connection) = EspMqttClient::new(broker_url, &conf)?;
        info!("MQTT client created for {}", broker_url);
        Ok((
            Self {
                client: Mutex::new(client),
                acks: AckTable::new(),
            },
            connection,
        ))
    }

    /// Hand a request to the IDF client, then park `done` under the message
    /// id it returns. The client call blocks on the IDF API lock, which the
    /// MQTT task holds while it waits for the event loop, so nothing the
    /// event loop needs may be locked here.
    fn submit(
        &self,
        correlation_id: u32,
        done: Completion,
        send: impl FnOnce(&mut EspMqttClient<'static>) -> Result<u32, EspError>,
    ) -> Result<(), EnqueueError> {
        let message_id = {
            let mut client = self.client.lock().unwrap_or_else(PoisonError::into_inner);
            send(&mut client).map_err(|e| {
                debug!("MQTT client refused request {}: {}", correlation_id, e);
                EnqueueError::QueueFull
            })?
        };
        self.acks.register(message_id, correlation_id, done);
        Ok(())
    }
}

impl MessageAgent for EspMqttAgent {
    fn subscribe(
        &self,
        topic_filter: &str,
        qos: QoS,
        correlation_id: u32,
        done: Completion,
    ) -> Result<(), EnqueueError> {
        self.submit(correlation_id, done, |c| c.subscribe(topic_filter, esp_qos(qos)))
    }

    fn publish(
        &self,
        topic: &str,
        qos: QoS,
        payload: &[u8],
        correlation_id: u32,
        done: Completion,
    ) -> Result<(), EnqueueError> {
        if qos == QoS::AtMostOnce {
            // QoS 0 has no PUBACK; handing it to the client is delivery.
            let mut client = self.client.lock().unwrap_or_else(PoisonError::into_inner);
            client
                .publish(topic, EspQoS::AtMostOnce, false, payload)
                .map_err(|_| EnqueueError::QueueFull)?;
            drop(client);
            done(AckStatus::Success);
            return Ok(());
        }
        self.submit(correlation_id, done, |c| {
            c.publish(topic, esp_qos(qos), false, payload)
        })
    }
}

/// MQTT event task body. Returns when the connection is torn down.
pub fn run_event_loop(
    mut connection: EspMqttConnection,
    agent: Arc<EspMqttAgent>,
    router: Arc<Router>,
    gates: Arc<ConnectivityGates>,
    sink: &mut impl EventSink,
) {
    info!("MQTT event loop running");
    while let Ok(event) = connection.next() {
        match event.payload() {
            EventPayload::Connected(_) => {
                gates.handle(AgentEvent::Connected);
                sink.emit(&AppEvent::Agent(AgentEvent::Connected));
            }
            EventPayload::Disconnected => {
                gates.handle(AgentEvent::Disconnected);
                let dropped = agent.acks.abandon_all();
                if dropped > 0 {
                    warn!("Abandoning {} unacknowledged request(s)", dropped);
                }
                sink.emit(&AppEvent::Agent(AgentEvent::Disconnected));
            }
            EventPayload::Subscribed(id) | EventPayload::Published(id) => {
                agent.acks.settle(id, Settlement::Acked(AckStatus::Success));
            }
            // Expired from the outbox.
            EventPayload::Deleted(id) => agent.acks.settle(id, Settlement::Discarded),
            EventPayload::Received {
                topic: Some(topic),
                data,
                ..
            } => {
                router.deliver(topic, data);
            }
            EventPayload::Received { topic: None, .. } => {
                warn!("Dropping continuation chunk of an oversized message");
            }
            EventPayload::Error(e) => error!("MQTT error: {:?}", e),
            other => debug!("MQTT event: {:?}", other),
        }
    }
    warn!("MQTT connection closed, event loop exiting");
}
