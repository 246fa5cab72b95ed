use core::fmt;

use crate::types::RelayState;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DisplayReading {
    Live(f32),
    Stale(f32),
    Missing,
}

impl DisplayReading {
    pub fn temperature_c(self) -> Option<f32> {
        match self {
            Self::Live(value) | Self::Stale(value) => Some(value),
            Self::Missing => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusFrame {
    pub reading: DisplayReading,
    pub relay: RelayState,
}

impl StatusFrame {
    pub fn temperature_line(&self) -> String {
        match self.reading {
            DisplayReading::Live(value) => format!("{value:.1} C"),
            DisplayReading::Stale(value) => format!("{value:.1} C?"),
            DisplayReading::Missing => "--.- C".to_string(),
        }
    }

    pub fn relay_line(&self) -> String {
        let relay = if self.relay.is_energized() {
            "COOLING"
        } else {
            "IDLE"
        };

        match self.reading {
            DisplayReading::Stale(_) => format!("{relay} SENSOR ERR"),
            DisplayReading::Live(_) | DisplayReading::Missing => relay.to_string(),
        }
    }
}

impl fmt::Display for StatusFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {}", self.temperature_line(), self.relay_line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_reading_one_decimal() {
        let frame = StatusFrame {
            reading: DisplayReading::Live(-16.54),
            relay: RelayState::On,
        };
        assert_eq!(frame.temperature_line(), "-16.5 C");
        assert_eq!(frame.relay_line(), "COOLING");
        assert_eq!(frame.to_string(), "-16.5 C | COOLING");
    }

    #[test]
    fn stale_reading_is_marked() {
        let frame = StatusFrame {
            reading: DisplayReading::Stale(-17.0),
            relay: RelayState::Off,
        };
        assert_eq!(frame.to_string(), "-17.0 C? | IDLE SENSOR ERR");
    }

    #[test]
    fn missing_reading_uses_placeholder() {
        let frame = StatusFrame {
            reading: DisplayReading::Missing,
            relay: RelayState::Off,
        };
        assert_eq!(frame.to_string(), "--.- C | IDLE");
        assert_eq!(frame.reading.temperature_c(), None);
    }
}
