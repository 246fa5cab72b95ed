use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest sampling interval the wrapping interval gate can tell apart from
/// a counter rollover.
pub const MAX_SAMPLE_INTERVAL_MS: u32 = u32::MAX / 2;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("thresholds must be finite (low {low}, high {high})")]
    NonFiniteThreshold { low: f32, high: f32 },
    #[error("low threshold {low} °C must be below high threshold {high} °C")]
    InvertedBand { low: f32, high: f32 },
    #[error("sample interval must be greater than zero")]
    ZeroInterval,
    #[error("sample interval {0} ms exceeds half the millisecond counter period")]
    IntervalTooLong(u32),
    #[error("plausible range {min}..={max} °C is empty or not finite")]
    InvalidPlausibleRange { min: f32, max: f32 },
    #[error("threshold band {low}..={high} °C lies outside the plausible range {min}..={max} °C")]
    BandOutsidePlausibleRange { low: f32, high: f32, min: f32, max: f32 },
    #[error("{name} pin {pin} is not a valid GPIO number")]
    InvalidPin { name: &'static str, pin: i32 },
    #[error("sensor and relay cannot share GPIO {0}")]
    SharedPin(i32),
    #[error("display address {0:#04x} is not a 7-bit I2C address")]
    InvalidDisplayAddress(u8),
    #[error("sensor resolution {0} bits is outside 9..=12")]
    InvalidResolution(u8),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub low_threshold_c: f32,
    pub high_threshold_c: f32,
    pub sample_interval_ms: u32,
    pub min_plausible_c: f32,
    pub max_plausible_c: f32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            low_threshold_c: -18.0,
            high_threshold_c: -15.0,
            sample_interval_ms: 60_000,
            min_plausible_c: -55.0,
            max_plausible_c: 125.0,
        }
    }
}

impl ControlConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (low, high) = (self.low_threshold_c, self.high_threshold_c);
        if !low.is_finite() || !high.is_finite() {
            return Err(ConfigError::NonFiniteThreshold { low, high });
        }
        if low >= high {
            return Err(ConfigError::InvertedBand { low, high });
        }

        if self.sample_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.sample_interval_ms > MAX_SAMPLE_INTERVAL_MS {
            return Err(ConfigError::IntervalTooLong(self.sample_interval_ms));
        }

        let (min, max) = (self.min_plausible_c, self.max_plausible_c);
        if !min.is_finite() || !max.is_finite() || min >= max {
            return Err(ConfigError::InvalidPlausibleRange { min, max });
        }
        if low < min || high > max {
            return Err(ConfigError::BandOutsidePlausibleRange {
                low,
                high,
                min,
                max,
            });
        }

        Ok(())
    }

    pub fn is_plausible(&self, temp_c: f32) -> bool {
        temp_c.is_finite() && (self.min_plausible_c..=self.max_plausible_c).contains(&temp_c)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    pub sensor_pin: i32,
    pub relay_pin: i32,
    pub display_address: u8,
    pub sensor_resolution_bits: u8,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            sensor_pin: 14,
            relay_pin: 12,
            display_address: 0x3C,
            sensor_resolution_bits: 9,
        }
    }
}

impl HardwareConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sensor_pin < 0 {
            return Err(ConfigError::InvalidPin {
                name: "sensor",
                pin: self.sensor_pin,
            });
        }
        if self.relay_pin < 0 {
            return Err(ConfigError::InvalidPin {
                name: "relay",
                pin: self.relay_pin,
            });
        }
        if self.sensor_pin == self.relay_pin {
            return Err(ConfigError::SharedPin(self.relay_pin));
        }
        if self.display_address > 0x7F {
            return Err(ConfigError::InvalidDisplayAddress(self.display_address));
        }
        if !(9..=12).contains(&self.sensor_resolution_bits) {
            return Err(ConfigError::InvalidResolution(self.sensor_resolution_bits));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub hardware: HardwareConfig,
}

impl RuntimeConfig {
    pub fn from_json(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.control.validate()?;
        self.hardware.validate()
    }
}
