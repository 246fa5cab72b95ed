use core::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelayState {
    #[default]
    Off,
    On,
}

impl RelayState {
    pub fn from_energized(energized: bool) -> Self {
        if energized {
            Self::On
        } else {
            Self::Off
        }
    }

    pub fn is_energized(self) -> bool {
        matches!(self, Self::On)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::On => "ON",
        }
    }
}

/// ROM code of a device on the one-wire bus, least significant byte first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SensorAddress(pub [u8; 8]);

impl SensorAddress {
    pub fn from_rom(rom: u64) -> Self {
        Self(rom.to_le_bytes())
    }

    pub fn family_code(&self) -> u8 {
        self.0[0]
    }
}

impl fmt::Display for SensorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, byte) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerStatus {
    pub relay: &'static str,
    #[serde(rename = "temperatureC")]
    pub temperature_c: Option<f32>,
    #[serde(rename = "lowThresholdC")]
    pub low_threshold_c: f32,
    #[serde(rename = "highThresholdC")]
    pub high_threshold_c: f32,
    #[serde(rename = "lastSampleMs")]
    pub last_sample_ms: u32,
    #[serde(rename = "relaySwitches")]
    pub relay_switches: u32,
    #[serde(rename = "sensorFaults")]
    pub sensor_faults: u32,
    #[serde(rename = "consecutiveFaults")]
    pub consecutive_faults: u32,
}
