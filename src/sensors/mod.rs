//! Sensor drivers.
//!
//! Every driver is generic over `embedded-hal` 1.0 traits so the same code
//! runs against `esp-idf-hal` peripherals on the device and hand-written
//! mocks on the host.

pub mod ina3221;
pub mod position;
pub mod ultrasonic;
