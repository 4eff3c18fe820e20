//! GPIO / peripheral pin assignments for the barrier node board.
//!
//! Single source of truth: `main` builds every pin driver from these
//! numbers. Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// Barrier motor (L298N H-bridge)
// ---------------------------------------------------------------------------

/// HIGH with IN2 LOW raises the barrier.
pub const MOTOR_IN1_GPIO: i32 = 25;
/// HIGH with IN1 LOW lowers the barrier.
pub const MOTOR_IN2_GPIO: i32 = 26;

// ---------------------------------------------------------------------------
// Position inputs (pull-ups enabled)
// ---------------------------------------------------------------------------

/// End stop at the lowered position. LOW = reached.
pub const LOCKED_LIMIT_SWITCH_GPIO: i32 = 32;
/// End stop at the raised position. LOW = reached.
pub const UNLOCKED_LIMIT_SWITCH_GPIO: i32 = 33;
/// FC-33 slot sensor at the bay. HIGH = vehicle present.
pub const PRESENCE_SENSOR_GPIO: i32 = 15;

// ---------------------------------------------------------------------------
// HC-SR04 ultrasonic probe
// ---------------------------------------------------------------------------

pub const ULTRASONIC_TRIGGER_GPIO: i32 = 5;
pub const ULTRASONIC_ECHO_GPIO: i32 = 17;

// ---------------------------------------------------------------------------
// I²C bus (INA3221 power monitor)
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 21;
pub const I2C_SCL_GPIO: i32 = 22;
