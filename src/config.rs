//! System configuration parameters
//!
//! All tunable parameters for the barrier node. Deployment identity defaults
//! come from build-time environment variables (`PB_CITY`, `PB_AREA`,
//! `PB_ZONE`, `PB_THING_NAME`); everything else can be overridden by a JSON
//! document through [`SystemConfig::from_json`].

use core::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Capacity of every identity string (city, zone, thing name...).
pub const IDENTITY_CAP: usize = 32;

/// Capacity of a fully expanded topic string.
pub const TOPIC_CAP: usize = 128;

pub type IdentityString = heapless::String<IDENTITY_CAP>;
pub type Topic = heapless::String<TOPIC_CAP>;

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    pub deployment: DeploymentIdentity,
    pub barrier: BarrierTiming,
    pub bus: BusConfig,
    pub probe: ProbeConfig,
    pub comms: CommsConfig,
    pub telemetry: TelemetryConfig,
}

/// Where this device sits; every topic is derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentIdentity {
    pub city: IdentityString,
    pub area: IdentityString,
    pub zone: IdentityString,
    pub thing_name: IdentityString,
    /// Reported verbatim in every telemetry document.
    pub session_id: IdentityString,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BarrierTiming {
    /// Drive spin-up time before the confirmation sensor is trusted.
    pub settle_ms: u32,
    /// Upper bound on confirmation polling.
    pub operation_timeout_ms: u32,
    /// Sleep between confirmation samples.
    pub poll_interval_ms: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BusConfig {
    /// 7-bit address of the power monitor.
    pub device_address: u8,
    pub frequency_hz: u32,
    /// Total attempts per register read (not retries).
    pub read_attempts: u8,
    /// Fixed wait between failed attempts.
    pub retry_backoff_ms: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub max_distance_cm: u32,
    /// Ambient temperature for speed-of-sound correction, if known.
    pub temperature_c: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommsConfig {
    pub broker_url: heapless::String<TOPIC_CAP>,
    /// 0, 1 or 2.
    pub qos: u8,
    /// Bound on every subscribe/publish acknowledgment wait.
    pub ack_timeout_ms: u32,
    /// Pause between enqueue attempts while the agent queue is full.
    pub enqueue_block_ms: u32,
    /// Command-loop period once the gates are open.
    pub command_loop_delay_ms: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub power_interval_secs: u32,
    pub obstacle_interval_ms: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            deployment: DeploymentIdentity::default(),
            barrier: BarrierTiming {
                settle_ms: 500,
                operation_timeout_ms: 15_000,
                poll_interval_ms: 10,
            },
            bus: BusConfig {
                device_address: 0x40,
                frequency_hz: 100_000,
                read_attempts: 5,
                retry_backoff_ms: 200,
            },
            probe: ProbeConfig {
                max_distance_cm: 500,
                temperature_c: None,
            },
            comms: CommsConfig {
                broker_url: bounded(option_env!("PB_BROKER_URL").unwrap_or("mqtt://localhost:1883")),
                qos: 1,
                ack_timeout_ms: 5_000,
                enqueue_block_ms: 500,
                command_loop_delay_ms: 100,
            },
            telemetry: TelemetryConfig {
                power_interval_secs: 180,
                obstacle_interval_ms: 1_000,
            },
        }
    }
}

impl Default for DeploymentIdentity {
    fn default() -> Self {
        Self {
            city: bounded(option_env!("PB_CITY").unwrap_or("city")),
            area: bounded(option_env!("PB_AREA").unwrap_or("area")),
            zone: bounded(option_env!("PB_ZONE").unwrap_or("zone")),
            thing_name: bounded(option_env!("PB_THING_NAME").unwrap_or("barrier-node")),
            session_id: bounded("session-987654321"),
        }
    }
}

/// Copy `s` into a fixed-capacity string, truncating at a char boundary.
fn bounded<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

impl SystemConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|_| ConfigError::Corrupted)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make a task loop misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let b = &self.barrier;
        if b.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("barrier.poll_interval_ms must be > 0"));
        }
        if b.operation_timeout_ms <= b.poll_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "barrier.operation_timeout_ms must exceed poll interval",
            ));
        }
        if self.bus.read_attempts == 0 {
            return Err(ConfigError::ValidationFailed("bus.read_attempts must be >= 1"));
        }
        if self.bus.device_address > 0x7F {
            return Err(ConfigError::ValidationFailed("bus.device_address must be 7-bit"));
        }
        if self.probe.max_distance_cm == 0 {
            return Err(ConfigError::ValidationFailed("probe.max_distance_cm must be > 0"));
        }
        if self.comms.qos > 2 {
            return Err(ConfigError::ValidationFailed("comms.qos must be 0, 1 or 2"));
        }
        if self.comms.ack_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("comms.ack_timeout_ms must be > 0"));
        }
        if self.telemetry.power_interval_secs == 0 || self.telemetry.obstacle_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("telemetry intervals must be > 0"));
        }
        let d = &self.deployment;
        for part in [&d.city, &d.area, &d.zone, &d.thing_name] {
            if part.is_empty() || part.contains(['/', '+', '#']) {
                return Err(ConfigError::ValidationFailed(
                    "deployment identity parts must be non-empty topic levels",
                ));
            }
        }
        Ok(())
    }
}

impl DeploymentIdentity {
    /// `cmd/pb/<city>/<area>/<zone>/<thing>/barrier/<action>`
    pub fn barrier_topic(&self, action: &str) -> Result<Topic, ConfigError> {
        self.topic("cmd", format_args!("barrier/{action}"))
    }

    /// `cmd/pb/<city>/<area>/<zone>/<thing>/buzzer`
    pub fn buzzer_topic(&self) -> Result<Topic, ConfigError> {
        self.topic("cmd", format_args!("buzzer"))
    }

    /// `dt/pb/<city>/<area>/<zone>/<thing>/power`
    pub fn power_topic(&self) -> Result<Topic, ConfigError> {
        self.topic("dt", format_args!("power"))
    }

    fn topic(&self, prefix: &str, leaf: core::fmt::Arguments<'_>) -> Result<Topic, ConfigError> {
        let mut t = Topic::new();
        write!(
            t,
            "{}/pb/{}/{}/{}/{}/{}",
            prefix, self.city, self.area, self.zone, self.thing_name, leaf
        )
        .map_err(|_| ConfigError::ValidationFailed("topic exceeds buffer"))?;
        Ok(t)
    }
}
