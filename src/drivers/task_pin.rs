//! Core-pinned thread spawning for the ESP32 dual-core.
//!
//! Wraps `esp_pthread_set_cfg()` so that `std::thread::spawn` creates a
//! FreeRTOS task pinned to a specific CPU core with explicit priority
//! and stack size. On the host, falls back to a plain named thread.
//!
//! `esp_pthread_set_cfg()` sets thread-local configuration that applies to
//! the *next* `pthread_create()` call from the calling thread, so the
//! config→spawn pair must not be interleaved with other thread creation on
//! the same thread.

use std::io;
use std::thread::JoinHandle;

/// CPU core identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Core {
    /// Core 0 (PRO_CPU): Wi-Fi, lwIP and the MQTT client.
    Pro = 0,
    /// Core 1 (APP_CPU): barrier control and perception.
    App = 1,
}

/// Placement of one long-running task.
#[derive(Debug, Clone, Copy)]
pub struct TaskSpec {
    /// NUL-terminated for the FreeRTOS task name.
    pub name: &'static str,
    pub core: Core,
    pub priority: u8,
    pub stack_kb: usize,
}

pub const BARRIER_TASK: TaskSpec = TaskSpec {
    name: "barrier\0",
    core: Core::App,
    priority: 5,
    stack_kb: 6,
};

pub const BUZZER_TASK: TaskSpec = TaskSpec {
    name: "buzzer\0",
    core: Core::App,
    priority: 4,
    stack_kb: 4,
};

pub const POWER_TASK: TaskSpec = TaskSpec {
    name: "power\0",
    core: Core::App,
    priority: 3,
    stack_kb: 6,
};

pub const OBSTACLE_TASK: TaskSpec = TaskSpec {
    name: "obstacle\0",
    core: Core::App,
    priority: 5,
    stack_kb: 4,
};

pub const MQTT_EVENT_TASK: TaskSpec = TaskSpec {
    name: "mqtt-events\0",
    core: Core::Pro,
    priority: 6,
    stack_kb: 6,
};

/// Spawn a thread placed according to `spec`.
#[cfg(feature = "espidf")]
pub fn spawn_on_core(
    spec: TaskSpec,
    f: impl FnOnce() + Send + 'static,
) -> io::Result<JoinHandle<()>> {
    // SAFETY: `cfg` is fully initialised by the IDF default and `name` is a
    // 'static NUL-terminated string.
    let ret = unsafe {
        let mut cfg = esp_idf_sys::esp_create_default_pthread_config();
        cfg.pin_to_core = spec.core as i32;
        cfg.prio = i32::from(spec.priority);
        cfg.stack_size = (spec.stack_kb * 1024) as i32;
        cfg.thread_name = spec.name.as_ptr().cast();
        esp_idf_sys::esp_pthread_set_cfg(&cfg)
    };
    if ret != esp_idf_sys::ESP_OK as i32 {
        return Err(io::Error::other(format!("esp_pthread_set_cfg failed: {ret}")));
    }

    let display_name = spec.name.trim_end_matches('\0');
    log::info!(
        "Spawning '{}' on {:?} (pri={}, stack={}KB)",
        display_name,
        spec.core,
        spec.priority,
        spec.stack_kb
    );

    std::thread::Builder::new()
        .name(display_name.into())
        .spawn(f)
}

/// Host fallback: ignores core affinity and priority.
#[cfg(not(feature = "espidf"))]
pub fn spawn_on_core(
    spec: TaskSpec,
    f: impl FnOnce() + Send + 'static,
) -> io::Result<JoinHandle<()>> {
    let display_name = spec.name.trim_end_matches('\0');
    log::info!(
        "Spawning '{}' (sim, no core pinning, stack={}KB)",
        display_name,
        spec.stack_kb
    );

    std::thread::Builder::new()
        .name(display_name.into())
        .stack_size(spec.stack_kb.max(64) * 1024)
        .spawn(f)
}
