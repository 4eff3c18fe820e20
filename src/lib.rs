//! ParkGate barrier node firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. ESP-IDF-specific code is gated behind the `espidf` feature
//! within each module; everything else builds and tests on the host.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod comms;
pub mod config;
pub mod control;
pub mod drivers;
pub mod error;
pub mod perception;
pub mod pins;
pub mod sensors;
pub mod telemetry;
