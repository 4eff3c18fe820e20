//! ParkGate Firmware — Main Entry Point
//!
//! Hexagonal layout: the barrier, telemetry and perception logic live in the
//! library and only see port traits. This file builds the ESP-IDF adapters,
//! injects them, and starts one task per concern.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  BarrierHardware    LogEventSink   EspMqttAgent   Esp32Time    │
//! │  (Drive+Confirm)    IndicatorSink  (MessageAgent) (TimePort)   │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  BarrierService · CommandDispatcher · PowerPerception   │    │
//! │  │  ObstacleMonitor                                        │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Tasks: barrier · buzzer · power · obstacle · mqtt-events      │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info, warn};

use esp_idf_hal::gpio::{AnyIOPin, Input, Output, PinDriver, Pull};
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::units::Hertz;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sntp::{EspSntp, SyncStatus};
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};

use parkgate::adapters::hardware::BarrierHardware;
use parkgate::adapters::indicator::{IndicatorSink, LogBuzzer, LogIndicator};
use parkgate::adapters::log_sink::{LogEventSink, Tee};
use parkgate::adapters::mqtt::{self, EspMqttAgent};
use parkgate::adapters::time::Esp32TimeAdapter;
use parkgate::app::commands::{BarrierCommand, Sound};
use parkgate::app::events::AppEvent;
use parkgate::app::ports::{EventSink, QoS, TimePort};
use parkgate::app::service::{BarrierService, BuzzerControl};
use parkgate::comms::agent::{AgentClient, SubscriptionHandle};
use parkgate::comms::dispatcher::CommandDispatcher;
use parkgate::comms::gates::ConnectivityGates;
use parkgate::comms::router::Router;
use parkgate::config::SystemConfig;
use parkgate::control::barrier::BarrierController;
use parkgate::drivers::motor::MotorDriver;
use parkgate::drivers::task_pin::{self, BARRIER_TASK, BUZZER_TASK, MQTT_EVENT_TASK, OBSTACLE_TASK, POWER_TASK};
use parkgate::perception::ObstacleMonitor;
use parkgate::pins;
use parkgate::sensors::ina3221::{Ina3221, RegisterReader};
use parkgate::sensors::position::{ActiveLevel, LimitSwitches, PresenceSensor};
use parkgate::sensors::ultrasonic::UltrasonicProbe;
use parkgate::telemetry::power::PowerPerception;
use parkgate::telemetry::publisher::TelemetryPublisher;

type OutPin = PinDriver<'static, AnyIOPin, Output>;
type InPin = PinDriver<'static, AnyIOPin, Input>;

type Service = BarrierService<BarrierHardware<MotorDriver<OutPin, OutPin>, LimitSwitches<InPin, InPin>>, Esp32TimeAdapter>;

/// How long boot waits for the first broker connection before starting
/// tasks anyway. Tasks block on the gates themselves.
const FIRST_CONNECT_WAIT: Duration = Duration::from_secs(30);
const SNTP_WAIT_SECS: u32 = 15;

fn event_sink() -> Tee<LogEventSink, IndicatorSink<LogIndicator>> {
    Tee(LogEventSink::new(), IndicatorSink::new(LogIndicator))
}

/// SAFETY: caller guarantees each GPIO number is claimed at most once.
unsafe fn gpio(num: i32) -> AnyIOPin {
    // SAFETY: forwarded from the caller.
    unsafe { AnyIOPin::new(num) }
}

fn output(num: i32) -> Result<OutPin> {
    // SAFETY: pin numbers come from `pins`, which assigns each one once.
    PinDriver::output(unsafe { gpio(num) }).with_context(|| format!("GPIO{num} as output"))
}

fn input_pulled_up(num: i32) -> Result<InPin> {
    // SAFETY: as above.
    let mut pin = PinDriver::input(unsafe { gpio(num) }).with_context(|| format!("GPIO{num} as input"))?;
    pin.set_pull(Pull::Up)?;
    Ok(pin)
}

fn connect_wifi(wifi: &mut BlockingWifi<EspWifi<'static>>) -> Result<()> {
    let ssid = option_env!("PB_WIFI_SSID").unwrap_or("");
    let password = option_env!("PB_WIFI_PASS").unwrap_or("");
    if ssid.is_empty() {
        anyhow::bail!("no Wi-Fi SSID compiled in (set PB_WIFI_SSID)");
    }

    let conf = Configuration::Client(ClientConfiguration {
        ssid: ssid.try_into().map_err(|()| anyhow::anyhow!("SSID too long"))?,
        password: password.try_into().map_err(|()| anyhow::anyhow!("password too long"))?,
        auth_method: if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        },
        ..Default::default()
    });
    wifi.set_configuration(&conf)?;
    wifi.start()?;
    info!("WiFi started, connecting to '{}'", ssid);
    wifi.connect()?;
    wifi.wait_netif_up()?;
    let ip = wifi.wifi().sta_netif().get_ip_info()?;
    info!("WiFi connected, IP {}", ip.ip);
    Ok(())
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  ParkGate v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Configuration ──────────────────────────────────────
    let config = SystemConfig::default();
    config.validate()?;
    let identity = &config.deployment;
    info!(
        "Node {}/{}/{}/{} (session {})",
        identity.city, identity.area, identity.zone, identity.thing_name, identity.session_id
    );

    // ── 3. Network ────────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let mut wifi = BlockingWifi::wrap(EspWifi::new(peripherals.modem, sysloop.clone(), Some(nvs))?, sysloop)?;
    connect_wifi(&mut wifi)?;

    let sntp = EspSntp::new_default()?;
    let time = Esp32TimeAdapter::new();
    let mut waited = 0;
    while sntp.get_sync_status() != SyncStatus::Completed && waited < SNTP_WAIT_SECS {
        time.sleep_ms(1_000);
        waited += 1;
    }
    if sntp.get_sync_status() != SyncStatus::Completed {
        warn!("SNTP not synced after {}s, telemetry timestamps may be wrong", SNTP_WAIT_SECS);
    }

    // ── 4. Hardware adapters ──────────────────────────────────
    let motor = MotorDriver::new(output(pins::MOTOR_IN1_GPIO)?, output(pins::MOTOR_IN2_GPIO)?)
        .map_err(|e| anyhow::anyhow!("motor driver: {e}"))?;
    let switches = LimitSwitches::new(
        input_pulled_up(pins::LOCKED_LIMIT_SWITCH_GPIO)?,
        input_pulled_up(pins::UNLOCKED_LIMIT_SWITCH_GPIO)?,
    );
    let controller = BarrierController::new(BarrierHardware::new(motor, switches), time, config.barrier);
    let gates = Arc::new(ConnectivityGates::new());
    let service: Arc<Service> = Arc::new(BarrierService::new(controller, Arc::clone(&gates)));

    // SAFETY: SDA/SCL numbers are unique in `pins`.
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        unsafe { gpio(pins::I2C_SDA_GPIO) },
        unsafe { gpio(pins::I2C_SCL_GPIO) },
        &I2cConfig::new().baudrate(Hertz(config.bus.frequency_hz)),
    )?;
    let monitor = Ina3221::new(RegisterReader::new(i2c, time, &config.bus));

    let probe = UltrasonicProbe::new(
        output(pins::ULTRASONIC_TRIGGER_GPIO)?,
        PinDriver::input(unsafe { gpio(pins::ULTRASONIC_ECHO_GPIO) })?,
        time,
    )
    .map_err(|e| anyhow::anyhow!("ultrasonic probe: {e}"))?;
    let presence = PresenceSensor::new(PinDriver::input(unsafe { gpio(pins::PRESENCE_SENSOR_GPIO) })?, ActiveLevel::High);
    let mut obstacle = ObstacleMonitor::new(probe, presence, config.probe);

    // ── 5. Message channel ────────────────────────────────────
    let router = Arc::new(Router::new());
    let (agent, connection) = EspMqttAgent::connect(&config.comms.broker_url, &identity.thing_name)?;
    let agent = Arc::new(agent);
    let client = Arc::new(AgentClient::new(Arc::clone(&agent), Arc::clone(&router), &config.comms));
    let qos = QoS::from_level(config.comms.qos)?;

    {
        let (agent, router, gates) = (Arc::clone(&agent), Arc::clone(&router), Arc::clone(&gates));
        task_pin::spawn_on_core(MQTT_EVENT_TASK, move || {
            mqtt::run_event_loop(connection, agent, router, gates, &mut event_sink());
        })?;
    }

    if !gates.wait_ready(FIRST_CONNECT_WAIT) {
        warn!("Broker not reachable after {:?}, starting tasks anyway", FIRST_CONNECT_WAIT);
    }

    // ── 6. Tasks ──────────────────────────────────────────────
    {
        let (service, client) = (Arc::clone(&service), Arc::clone(&client));
        let unlock = identity.barrier_topic("unlock")?;
        let lock = identity.barrier_topic("lock")?;
        let loop_delay = config.comms.command_loop_delay_ms;
        task_pin::spawn_on_core(BARRIER_TASK, move || {
            let mut sink = event_sink();
            let dispatcher = Arc::new(CommandDispatcher::<BarrierCommand, _>::new(Arc::clone(&service)));
            for filter in [unlock, lock] {
                let subscribed = SubscriptionHandle::new(&filter, qos)
                    .and_then(|mut handle| client.subscribe(&mut handle, dispatcher.clone()));
                if let Err(e) = subscribed {
                    error!("Barrier task not started: {}", e);
                    return;
                }
                sink.emit(&AppEvent::Subscribed { topic: filter });
            }
            service.run(&mut sink, loop_delay);
        })?;
    }

    {
        let client = Arc::clone(&client);
        let topic = identity.buzzer_topic()?;
        task_pin::spawn_on_core(BUZZER_TASK, move || {
            let dispatcher = Arc::new(CommandDispatcher::<Sound, _>::new(BuzzerControl::new(LogBuzzer)));
            match SubscriptionHandle::new(&topic, qos).and_then(|mut h| client.subscribe(&mut h, dispatcher)) {
                Ok(()) => event_sink().emit(&AppEvent::Subscribed { topic }),
                Err(e) => error!("Buzzer task not started: {}", e),
            }
        })?;
    }

    {
        let publisher = TelemetryPublisher::new(Arc::clone(&client), identity.power_topic()?, QoS::AtLeastOnce);
        let mut power = PowerPerception::new(monitor, publisher, identity.session_id.clone());
        let gates = Arc::clone(&gates);
        let interval = config.telemetry.power_interval_secs;
        task_pin::spawn_on_core(POWER_TASK, move || {
            power.run(&gates, &time, &mut event_sink(), interval);
        })?;
    }

    {
        let interval = config.telemetry.obstacle_interval_ms;
        task_pin::spawn_on_core(OBSTACLE_TASK, move || {
            obstacle.run(&time, &mut event_sink(), interval);
        })?;
    }

    event_sink().emit(&AppEvent::Started);

    // Wi-Fi and SNTP drivers live as long as main does.
    let _keep = (wifi, sntp);
    loop {
        std::thread::park();
    }
}
