//! Power perception loop: read all monitor channels, publish one record.

use embedded_hal::i2c::I2c;
use log::{error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, MessageAgent, TimePort};
use crate::comms::gates::ConnectivityGates;
use crate::config::IdentityString;
use crate::error::{CommsError, Error};
use crate::sensors::ina3221::{Ina3221, PowerReading};
use crate::telemetry::publisher::TelemetryPublisher;
use crate::telemetry::record::{CHANNEL_COUNT, TelemetryRecord, TelemetryStatus};

pub struct PowerPerception<I2C, T, A> {
    monitor: Ina3221<I2C, T>,
    publisher: TelemetryPublisher<A>,
    session_id: IdentityString,
}

impl<I2C, T, A> PowerPerception<I2C, T, A>
where
    I2C: I2c,
    T: TimePort,
    A: MessageAgent,
{
    pub fn new(
        monitor: Ina3221<I2C, T>,
        publisher: TelemetryPublisher<A>,
        session_id: IdentityString,
    ) -> Self {
        Self {
            monitor,
            publisher,
            session_id,
        }
    }

    /// Bring up the monitor. A failure is logged; cycles still run and
    /// report `error` status until the device answers.
    pub fn init(&mut self) {
        self.monitor.scan_bus();
        if let Err(e) = self.monitor.init() {
            warn!("Power monitor not configured: {}", e);
        }
    }

    /// Read every channel in order.
    pub fn acquire(&mut self) -> [Result<PowerReading, Error>; CHANNEL_COUNT] {
        core::array::from_fn(|i| {
            let channel = i as u8 + 1;
            self.monitor
                .read_channel(channel)
                .inspect_err(|e| error!("Failed to read channel {}: {}", channel, e))
        })
    }

    /// One acquisition + publish cycle. Returns the publish correlation id.
    pub fn run_cycle(
        &mut self,
        gates: &ConnectivityGates,
        time: &impl TimePort,
        sink: &mut impl EventSink,
    ) -> Result<u32, Error> {
        let samples = self.acquire();
        let record = TelemetryRecord::from_cycle(time.now_utc(), &self.session_id, &samples);
        if record.status() != TelemetryStatus::Ok {
            warn!("Power cycle status {:?}", record.status());
        }

        if !gates.is_ready() {
            info!("Broker not reachable, skipping power telemetry");
            sink.emit(&AppEvent::TelemetrySkipped);
            return Err(CommsError::NotReady.into());
        }

        match self.publisher.publish(&record) {
            Ok(correlation_id) => {
                sink.emit(&AppEvent::TelemetryPublished { correlation_id });
                Ok(correlation_id)
            }
            Err(e) => {
                sink.emit(&AppEvent::TelemetrySkipped);
                Err(e)
            }
        }
    }

    /// Power task body.
    pub fn run(
        &mut self,
        gates: &ConnectivityGates,
        time: &impl TimePort,
        sink: &mut impl EventSink,
        interval_secs: u32,
    ) -> ! {
        self.init();
        loop {
            let _ = self.run_cycle(gates, time, sink);
            time.sleep_ms(interval_secs.saturating_mul(1_000));
        }
    }
}
