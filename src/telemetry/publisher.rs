//! Publishes telemetry records on the node's power topic.

use std::sync::Arc;

use log::{error, info};

use crate::app::ports::{MessageAgent, QoS};
use crate::comms::agent::AgentClient;
use crate::config::Topic;
use crate::error::Error;
use crate::telemetry::record::TelemetryRecord;

pub struct TelemetryPublisher<A> {
    client: Arc<AgentClient<A>>,
    topic: Topic,
    qos: QoS,
}

impl<A: MessageAgent> TelemetryPublisher<A> {
    pub fn new(client: Arc<AgentClient<A>>, topic: Topic, qos: QoS) -> Self {
        Self { client, topic, qos }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Serialise and publish one record, waiting for the delivery ack.
    /// No retry: a failed cycle is simply skipped.
    pub fn publish(&self, record: &TelemetryRecord) -> Result<u32, Error> {
        let payload = record.to_json()?;
        info!("Publishing power data to '{}'", self.topic);
        match self.client.publish(&self.topic, self.qos, &payload) {
            Ok(id) => {
                info!("Telemetry publish acknowledged (id {})", id);
                Ok(id)
            }
            Err(e) => {
                error!("Telemetry publish failed: {}", e);
                Err(e)
            }
        }
    }
}
