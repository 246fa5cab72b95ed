pub mod config;
pub mod controller;
pub mod diagnostics;
pub mod display;
pub mod hysteresis;
pub mod interval;
pub mod ports;
pub mod types;

pub use config::{ConfigError, ControlConfig, HardwareConfig, RuntimeConfig};
pub use controller::{ControllerState, FridgeController, TickOutcome};
pub use diagnostics::{ControlEvent, Diagnostics, NoDiagnostics};
pub use display::{DisplayReading, StatusFrame};
pub use ports::{
    Clock, DisplayError, RelayActuator, SensorFault, StatusDisplay, TemperatureSensor,
};
pub use types::{ControllerStatus, RelayState, SensorAddress};
