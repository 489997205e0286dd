//! Sensor link configuration
//!
//! Settings load from YAML; every field has a default matching the
//! reference current sensor (address 1, holding register 0x56, 9600 baud).
//!
//! ```yaml
//! port: /dev/ttyUSB0
//! baud_rate: 9600
//! request:
//!   address: 1
//!   function: 3
//!   register: 0x56
//!   count: 1
//! response:
//!   frame_len: 7
//!   data_offset: 3
//! timing:
//!   scan_timeout_ms: 1000
//!   frame_timeout_ms: 250
//!   poll_interval_ms: 100
//! history_capacity: 500
//! scale: 0.02
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::buffer::DEFAULT_CAPACITY;
use crate::codec::{
    CommandFrame, DEFAULT_ADDRESS, DEFAULT_DATA_OFFSET, DEFAULT_FRAME_LEN, DEFAULT_REGISTER,
    FrameLayout, READ_HOLDING_REGISTERS, ReadRequest,
};
use crate::driver::DriverOptions;
use crate::resync::ResyncTiming;
use crate::{LinkError, Result};

pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";
pub const DEFAULT_BAUD: u32 = 9600;

/// Amps per raw count on the reference sensor (200 A full scale over 10000 counts).
pub const DEFAULT_SCALE: f64 = 200.0 / 10_000.0;

/// Complete link configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SensorConfig {
    pub port: String,
    pub baud_rate: u32,
    pub request: RequestConfig,
    pub response: ResponseConfig,
    pub timing: TimingConfig,
    pub history_capacity: usize,
    pub scale: f64,
}

/// Command frame parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RequestConfig {
    pub address: u8,
    pub function: u8,
    pub register: u16,
    pub count: u16,
}

/// Response frame shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResponseConfig {
    pub frame_len: usize,
    pub data_offset: usize,
}

/// Wait bounds, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    pub scan_timeout_ms: u64,
    pub frame_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud_rate: DEFAULT_BAUD,
            request: RequestConfig::default(),
            response: ResponseConfig::default(),
            timing: TimingConfig::default(),
            history_capacity: DEFAULT_CAPACITY,
            scale: DEFAULT_SCALE,
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            function: READ_HOLDING_REGISTERS,
            register: DEFAULT_REGISTER,
            count: 1,
        }
    }
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self { frame_len: DEFAULT_FRAME_LEN, data_offset: DEFAULT_DATA_OFFSET }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self { scan_timeout_ms: 1000, frame_timeout_ms: 250, poll_interval_ms: 100 }
    }
}

impl SensorConfig {
    /// Load and validate a YAML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| LinkError::file_error(path.to_path_buf(), e))?;
        let config: Self = serde_yaml_ng::from_str(&text)
            .map_err(|e| LinkError::config(path.display().to_string(), e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(text)
            .map_err(|e| LinkError::config("YAML", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml_ng::to_string(self).map_err(|e| LinkError::config("YAML", e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.port.trim().is_empty() {
            return Err(LinkError::config("port", "must not be empty"));
        }
        if self.baud_rate == 0 {
            return Err(LinkError::config("baud_rate", "must be positive"));
        }
        if self.timing.scan_timeout_ms == 0 || self.timing.frame_timeout_ms == 0 {
            return Err(LinkError::config("timing", "timeouts must be at least 1 ms"));
        }
        if self.history_capacity == 0 {
            return Err(LinkError::config("history_capacity", "must hold at least one sample"));
        }
        if !self.scale.is_finite() {
            return Err(LinkError::config("scale", "must be a finite number"));
        }
        self.layout().map(|_| ())
    }

    pub fn request(&self) -> ReadRequest {
        ReadRequest {
            address: self.request.address,
            function: self.request.function,
            register: self.request.register,
            count: self.request.count,
        }
    }

    pub fn command(&self) -> CommandFrame {
        self.request().encode()
    }

    /// Response layout; the start byte is the request address.
    pub fn layout(&self) -> Result<FrameLayout> {
        FrameLayout::new(self.request.address, self.response.frame_len, self.response.data_offset)
    }

    pub fn resync_timing(&self) -> ResyncTiming {
        ResyncTiming {
            scan_timeout: Duration::from_millis(self.timing.scan_timeout_ms),
            frame_timeout: Duration::from_millis(self.timing.frame_timeout_ms),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.timing.poll_interval_ms)
    }

    pub fn driver_options(&self) -> DriverOptions {
        DriverOptions { poll_interval: self.poll_interval(), max_samples: None }
    }

    /// Upper bound on the poll rate, used to normalise subscription rates.
    pub fn poll_hz(&self) -> f64 {
        match self.timing.poll_interval_ms {
            0 => f64::INFINITY,
            ms => 1000.0 / ms as f64,
        }
    }
}
