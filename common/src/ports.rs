use thiserror::Error;

use crate::{display::StatusFrame, types::SensorAddress};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensorFault {
    #[error("no temperature sensor found on the bus")]
    NotFound,
    #[error("temperature sensor disconnected")]
    Disconnected,
    #[error("implausible reading {value} °C")]
    OutOfRange { value: f32 },
    #[error("sensor bus error: {0}")]
    Bus(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisplayError {
    #[error("display not detected")]
    NotDetected,
    #[error("display bus error: {0}")]
    Bus(String),
}

pub trait Clock {
    fn now_ms(&self) -> u32;
}

pub trait TemperatureSensor {
    fn request_reading(&mut self) -> Result<f32, SensorFault>;

    fn address(&self) -> Option<SensorAddress> {
        None
    }
}

pub trait RelayActuator {
    fn set_energized(&mut self, energized: bool);
}

pub trait StatusDisplay {
    fn show_status(&mut self, frame: &StatusFrame) -> Result<(), DisplayError>;
}

// A display that failed to initialize is carried as `None`.
impl<D: StatusDisplay> StatusDisplay for Option<D> {
    fn show_status(&mut self, frame: &StatusFrame) -> Result<(), DisplayError> {
        match self {
            Some(display) => display.show_status(frame),
            None => Ok(()),
        }
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }
}
