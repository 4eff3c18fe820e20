//! Actuator drivers and task placement helpers.

pub mod motor;
pub mod task_pin;
