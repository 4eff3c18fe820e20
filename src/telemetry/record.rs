//! Power telemetry document.
//!
//! ```json
//! {"timestamp":"2026-03-01T12:00:00Z",
//!  "channels":[{"channel":1,"type":"regulator","bus_voltage_v":5.02,
//!               "shunt_voltage_mv":1.2,"load_voltage_v":5.02,"current_ma":12.0}],
//!  "session-id":"session-987654321","status":"ok"}
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::IdentityString;
use crate::error::Error;
use crate::sensors::ina3221::PowerReading;

/// Number of monitored rails.
pub const CHANNEL_COUNT: usize = 3;

/// What each monitor channel is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Regulator,
    Battery,
    Motor,
}

impl ChannelKind {
    pub fn for_channel(channel: u8) -> Option<Self> {
        match channel {
            1 => Some(Self::Regulator),
            2 => Some(Self::Battery),
            3 => Some(Self::Motor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelReading {
    pub channel: u8,
    #[serde(rename = "type")]
    pub kind: ChannelKind,
    pub bus_voltage_v: f32,
    pub shunt_voltage_mv: f32,
    pub load_voltage_v: f32,
    pub current_ma: f32,
}

impl ChannelReading {
    fn from_reading(r: &PowerReading) -> Option<Self> {
        Some(Self {
            channel: r.channel,
            kind: ChannelKind::for_channel(r.channel)?,
            bus_voltage_v: hundredths(r.bus_voltage_v),
            shunt_voltage_mv: hundredths(r.shunt_voltage_mv),
            load_voltage_v: hundredths(r.load_voltage_v),
            current_ma: hundredths(r.current_ma),
        })
    }
}

fn hundredths(v: f32) -> f32 {
    (v * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TelemetryStatus {
    /// Every channel read.
    Ok,
    /// Some channels failed and were left out.
    Partial,
    /// No channel could be read.
    Error,
}

/// One telemetry cycle, frozen at construction.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryRecord {
    timestamp: heapless::String<24>,
    channels: heapless::Vec<ChannelReading, CHANNEL_COUNT>,
    #[serde(rename = "session-id")]
    session_id: IdentityString,
    status: TelemetryStatus,
}

impl TelemetryRecord {
    /// Build from the per-channel results of one acquisition pass.
    pub fn from_cycle(
        timestamp: DateTime<Utc>,
        session_id: &IdentityString,
        samples: &[Result<PowerReading, Error>],
    ) -> Self {
        let channels: heapless::Vec<ChannelReading, CHANNEL_COUNT> = samples
            .iter()
            .filter_map(|s| s.as_ref().ok())
            .filter_map(ChannelReading::from_reading)
            .take(CHANNEL_COUNT)
            .collect();
        let status = if channels.is_empty() {
            TelemetryStatus::Error
        } else if channels.len() < samples.len() {
            TelemetryStatus::Partial
        } else {
            TelemetryStatus::Ok
        };
        Self {
            timestamp: format_timestamp(timestamp),
            channels,
            session_id: session_id.clone(),
            status,
        }
    }

    pub fn status(&self) -> TelemetryStatus {
        self.status
    }

    pub fn channels(&self) -> &[ChannelReading] {
        &self.channels
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn to_json(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(self).map_err(|_| Error::InvalidArgument("telemetry record not serialisable"))
    }
}

/// `YYYY-MM-DDTHH:MM:SSZ`
fn format_timestamp(t: DateTime<Utc>) -> heapless::String<24> {
    use core::fmt::Write;
    let mut s = heapless::String::new();
    // 20 chars for any four-digit year.
    let _ = write!(s, "{}", t.format("%Y-%m-%dT%H:%M:%SZ"));
    s
}
