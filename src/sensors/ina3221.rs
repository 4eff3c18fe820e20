//! INA3221 three-channel power monitor on the I²C bus.
//!
//! Register reads go through [`RegisterReader`], which makes up to
//! `read_attempts` full write-then-read exchanges with a fixed backoff
//! between failures. A flaky bus costs latency, never a crash.
//!
//! | Register | Meaning                          |
//! |----------|----------------------------------|
//! | `0x00`   | configuration                    |
//! | `0x01`   | ch1 shunt voltage (10 µV / LSB)  |
//! | `0x02`   | ch1 bus voltage (1 mV / LSB)     |
//! | `0x03`..`0x06` | ch2, ch3 (same layout)     |

use embedded_hal::i2c::{Error as _, ErrorKind, I2c};
use log::{error, info, warn};

use crate::app::ports::TimePort;
use crate::config::BusConfig;
use crate::error::{Error, SensorError};

/// Largest single register read.
pub const MAX_READ_LEN: usize = 8;

pub const REG_CONFIG: u8 = 0x00;
const REG_SHUNT_CH1: u8 = 0x01;

const CONFIG_ENABLE_CH1: u16 = 0x4000;
const CONFIG_ENABLE_CH2: u16 = 0x2000;
const CONFIG_ENABLE_CH3: u16 = 0x1000;
/// Averaging, conversion times and continuous shunt+bus mode.
const CONFIG_DEFAULT: u16 = 0x7127;

/// Shunt resistor fitted on every channel.
const SHUNT_RESISTOR_OHMS: f32 = 0.1;

/// Raw bytes from one successful register read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorReading {
    pub register: u8,
    pub bytes: heapless::Vec<u8, MAX_READ_LEN>,
    /// Attempts consumed, including the successful one.
    pub attempts: u8,
}

impl SensorReading {
    /// First two bytes as a big-endian signed word.
    pub fn word(&self) -> Option<i16> {
        match self.bytes.as_slice() {
            [hi, lo, ..] => Some(i16::from_be_bytes([*hi, *lo])),
            _ => None,
        }
    }
}

/// Bounded-retry register access to one bus device.
pub struct RegisterReader<I2C, T> {
    bus: I2C,
    address: u8,
    attempts: u8,
    backoff_ms: u32,
    time: T,
}

impl<I2C: I2c, T: TimePort> RegisterReader<I2C, T> {
    pub fn new(bus: I2C, time: T, config: &BusConfig) -> Self {
        Self {
            bus,
            address: config.device_address,
            attempts: config.read_attempts.max(1),
            backoff_ms: config.retry_backoff_ms,
            time,
        }
    }

    /// Read `length` bytes starting at `register`.
    pub fn read(&mut self, register: u8, length: usize) -> Result<SensorReading, Error> {
        if length == 0 || length > MAX_READ_LEN {
            return Err(Error::InvalidArgument("read length must be 1..=MAX_READ_LEN"));
        }
        let mut buf = [0u8; MAX_READ_LEN];
        let mut last = ErrorKind::Other;
        for attempt in 1..=self.attempts {
            match self
                .bus
                .write_read(self.address, &[register], &mut buf[..length])
            {
                Ok(()) => {
                    let mut bytes = heapless::Vec::new();
                    bytes
                        .extend_from_slice(&buf[..length])
                        .map_err(|_| Error::InvalidArgument("read length exceeds buffer"))?;
                    return Ok(SensorReading {
                        register,
                        bytes,
                        attempts: attempt,
                    });
                }
                Err(e) => {
                    last = e.kind();
                    warn!(
                        "I2C read attempt {} failed: {} (reg: 0x{:02x}, len: {})",
                        attempt, last, register, length
                    );
                    if attempt < self.attempts {
                        self.time.sleep_ms(self.backoff_ms);
                    }
                }
            }
        }
        error!(
            "Failed to read reg 0x{:02x} after {} attempts: {}",
            register, self.attempts, last
        );
        Err(SensorError::Bus(last).into())
    }

    /// Write a 16-bit big-endian register value. Single attempt.
    pub fn write_word(&mut self, register: u8, value: u16) -> Result<(), Error> {
        let [hi, lo] = value.to_be_bytes();
        self.bus
            .write(self.address, &[register, hi, lo])
            .map_err(|e| SensorError::Bus(e.kind()).into())
    }

    /// Probe every 7-bit address and return those that ACK.
    pub fn scan_bus(&mut self) -> heapless::Vec<u8, 16> {
        info!("Scanning I2C bus...");
        let mut found = heapless::Vec::new();
        for addr in 0x01..0x7F {
            if self.bus.write(addr, &[]).is_ok() {
                info!("Found device at: 0x{:02x}", addr);
                if found.push(addr).is_err() {
                    warn!("More than {} devices on the bus, list truncated", found.capacity());
                    break;
                }
            }
        }
        info!("I2C scan completed");
        found
    }
}

/// One converted channel sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerReading {
    pub channel: u8,
    pub bus_voltage_v: f32,
    pub shunt_voltage_mv: f32,
    pub load_voltage_v: f32,
    pub current_ma: f32,
}

impl PowerReading {
    fn from_raw(channel: u8, shunt_raw: i16, bus_raw: i16) -> Self {
        let shunt_voltage_mv = f32::from(shunt_raw) * 0.01;
        let bus_voltage_v = f32::from(bus_raw) * 0.001;
        Self {
            channel,
            bus_voltage_v,
            shunt_voltage_mv,
            load_voltage_v: bus_voltage_v - shunt_voltage_mv * 0.001,
            current_ma: shunt_voltage_mv / SHUNT_RESISTOR_OHMS,
        }
    }
}

/// INA3221 driver built on the retrying reader.
pub struct Ina3221<I2C, T> {
    reader: RegisterReader<I2C, T>,
}

impl<I2C: I2c, T: TimePort> Ina3221<I2C, T> {
    pub fn new(reader: RegisterReader<I2C, T>) -> Self {
        Self { reader }
    }

    /// Enable all three channels with the default conversion settings.
    pub fn init(&mut self) -> Result<(), Error> {
        let config = CONFIG_ENABLE_CH1 | CONFIG_ENABLE_CH2 | CONFIG_ENABLE_CH3 | CONFIG_DEFAULT;
        self.reader.write_word(REG_CONFIG, config).inspect_err(|e| {
            error!("Failed to configure INA3221: {}", e);
        })
    }

    pub fn scan_bus(&mut self) -> heapless::Vec<u8, 16> {
        self.reader.scan_bus()
    }

    /// Read and convert one channel (1..=3).
    pub fn read_channel(&mut self, channel: u8) -> Result<PowerReading, Error> {
        if !(1..=3).contains(&channel) {
            return Err(Error::InvalidArgument("INA3221 channel must be 1..=3"));
        }
        let reg_shunt = REG_SHUNT_CH1 + (channel - 1) * 2;
        let reg_bus = reg_shunt + 1;

        let shunt = self.read_word(reg_shunt).inspect_err(|_| {
            error!("Failed to read shunt voltage from channel {}", channel);
        })?;
        let bus = self.read_word(reg_bus).inspect_err(|_| {
            error!("Failed to read bus voltage from channel {}", channel);
        })?;

        let reading = PowerReading::from_raw(channel, shunt, bus);
        info!(
            "Channel {} - Bus Voltage: {:.2} V, Shunt Voltage: {:.2} mV, Load Voltage: {:.2} V, Current: {:.2} mA",
            channel,
            reading.bus_voltage_v,
            reading.shunt_voltage_mv,
            reading.load_voltage_v,
            reading.current_ma
        );
        Ok(reading)
    }

    fn read_word(&mut self, register: u8) -> Result<i16, Error> {
        let reading = self.reader.read(register, 2)?;
        reading
            .word()
            .ok_or(Error::InvalidArgument("short register read"))
    }
}
