//! Application core: domain logic behind port traits.
//!
//! Commands come in decoded from the message channel, services hand them to
//! the barrier controller or the buzzer, and everything observable goes out
//! as [`events::AppEvent`]s. All interaction with hardware and the transport
//! happens through the **port traits** in [`ports`], keeping this layer
//! testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
