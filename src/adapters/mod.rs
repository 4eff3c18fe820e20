//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements                     | Connects to               |
//! |-------------|--------------------------------|---------------------------|
//! | `hardware`  | DrivePort, ConfirmationPort    | H-bridge + end-stop input |
//! | `indicator` | EventSink, IndicatorPort,      | status LED / buzzer       |
//! |             | AudioPort                      |                           |
//! | `log_sink`  | EventSink                      | Serial log output         |
//! | `mqtt`      | MessageAgent                   | ESP-IDF MQTT client       |
//! | `time`      | TimePort                       | ESP32 system timer        |

pub mod hardware;
pub mod indicator;
pub mod log_sink;
#[cfg(feature = "espidf")]
pub mod mqtt;
pub mod time;
