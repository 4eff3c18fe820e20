//! Periodic power telemetry.

pub mod power;
pub mod publisher;
pub mod record;
