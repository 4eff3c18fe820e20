//! Time adapters.
//!
//! - **`feature = "espidf"`**: [`Esp32TimeAdapter`] wraps
//!   `esp_timer_get_time()` (microsecond precision, monotonic), FreeRTOS
//!   delays and the SNTP-synced system clock.
//! - **host**: the same adapter over `std::time`, plus [`SimClock`], a
//!   manually advanced clock for deterministic tests.

use std::time::SystemTime;

use chrono::{DateTime, Utc};

use crate::app::ports::TimePort;

/// Time adapter for the ESP32 platform.
#[derive(Debug, Clone, Copy)]
pub struct Esp32TimeAdapter {
    #[cfg(not(feature = "espidf"))]
    start: std::time::Instant,
}

impl Default for Esp32TimeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32TimeAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(feature = "espidf"))]
            start: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "espidf")]
impl TimePort for Esp32TimeAdapter {
    fn uptime_us(&self) -> u64 {
        // SAFETY: reads the monotonic high-resolution timer; no preconditions.
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
    }

    fn sleep_ms(&self, ms: u32) {
        esp_idf_hal::delay::FreeRtos::delay_ms(ms);
    }

    fn delay_us(&self, us: u32) {
        esp_idf_hal::delay::Ets::delay_us(us);
    }

    fn now_utc(&self) -> DateTime<Utc> {
        SystemTime::now().into()
    }
}

#[cfg(not(feature = "espidf"))]
impl TimePort for Esp32TimeAdapter {
    fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    fn sleep_ms(&self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }

    fn delay_us(&self, us: u32) {
        std::thread::sleep(std::time::Duration::from_micros(u64::from(us)));
    }

    fn now_utc(&self) -> DateTime<Utc> {
        SystemTime::now().into()
    }
}

/// Simulated clock. Time only moves when something sleeps or calls
/// [`advance_us`](SimClock::advance_us), so timing assertions are exact and
/// tests never wait.
#[cfg(not(feature = "espidf"))]
#[derive(Debug)]
pub struct SimClock {
    now_us: core::sync::atomic::AtomicU64,
    wall_base: DateTime<Utc>,
}

#[cfg(not(feature = "espidf"))]
impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(feature = "espidf"))]
impl SimClock {
    pub fn new() -> Self {
        Self::starting_at(DateTime::<Utc>::from(std::time::UNIX_EPOCH))
    }

    /// Clock whose wall time reads `wall_base` at uptime zero.
    pub fn starting_at(wall_base: DateTime<Utc>) -> Self {
        Self {
            now_us: core::sync::atomic::AtomicU64::new(0),
            wall_base,
        }
    }

    pub fn advance_us(&self, us: u64) {
        self.now_us
            .fetch_add(us, core::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(not(feature = "espidf"))]
impl TimePort for SimClock {
    fn uptime_us(&self) -> u64 {
        self.now_us.load(core::sync::atomic::Ordering::SeqCst)
    }

    fn sleep_ms(&self, ms: u32) {
        self.advance_us(u64::from(ms) * 1_000);
    }

    fn delay_us(&self, us: u32) {
        self.advance_us(u64::from(us));
    }

    fn now_utc(&self) -> DateTime<Utc> {
        self.wall_base + chrono::Duration::microseconds(self.uptime_us() as i64)
    }
}
