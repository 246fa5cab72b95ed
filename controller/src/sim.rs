use std::{cell::RefCell, rc::Rc};

use anyhow::ensure;
use serde::{Deserialize, Serialize};
use tracing::info;

use fridge_common::{
    Clock, DisplayError, RelayActuator, SensorAddress, SensorFault, StatusDisplay, StatusFrame,
    TemperatureSensor,
};

use crate::clock::MonotonicClock;

const SIMULATED_ADDRESS: SensorAddress =
    SensorAddress([0x28, 0x61, 0x64, 0x12, 0x3C, 0x7C, 0x2F, 0x27]);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub initial_temp_c: f32,
    pub ambient_temp_c: f32,
    pub floor_temp_c: f32,
    pub warming_rate_c_per_min: f32,
    pub cooling_rate_c_per_min: f32,
    pub fault_every: Option<u32>,
    pub display_attached: bool,
    pub clock_offset_ms: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            initial_temp_c: -12.0,
            ambient_temp_c: 21.0,
            floor_temp_c: -30.0,
            warming_rate_c_per_min: 0.4,
            cooling_rate_c_per_min: 0.9,
            fault_every: None,
            display_attached: true,
            clock_offset_ms: 0,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            [
                self.initial_temp_c,
                self.ambient_temp_c,
                self.floor_temp_c,
                self.warming_rate_c_per_min,
                self.cooling_rate_c_per_min,
            ]
            .iter()
            .all(|value| value.is_finite()),
            "simulation temperatures and rates must be finite"
        );
        ensure!(
            self.floor_temp_c < self.ambient_temp_c,
            "simulated floor {:.1} °C must be below ambient {:.1} °C",
            self.floor_temp_c,
            self.ambient_temp_c
        );
        ensure!(
            self.warming_rate_c_per_min >= 0.0 && self.cooling_rate_c_per_min >= 0.0,
            "simulated warming and cooling rates must not be negative"
        );
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FreezerModel {
    config: SimulationConfig,
    temperature_c: f32,
    compressor_on: bool,
    last_update_ms: Option<u32>,
}

impl FreezerModel {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            temperature_c: config.initial_temp_c,
            config,
            compressor_on: false,
            last_update_ms: None,
        }
    }

    pub fn temperature_c(&self) -> f32 {
        self.temperature_c
    }

    pub fn is_compressor_on(&self) -> bool {
        self.compressor_on
    }

    pub fn advance(&mut self, now_ms: u32) {
        let Some(last) = self.last_update_ms.replace(now_ms) else {
            return;
        };

        let minutes = now_ms.wrapping_sub(last) as f32 / 60_000.0;
        let delta = if self.compressor_on {
            -self.config.cooling_rate_c_per_min * minutes
        } else {
            self.config.warming_rate_c_per_min * minutes
        };
        self.temperature_c = (self.temperature_c + delta)
            .clamp(self.config.floor_temp_c, self.config.ambient_temp_c);
    }

    pub fn set_compressor(&mut self, on: bool, now_ms: u32) {
        self.advance(now_ms);
        self.compressor_on = on;
    }
}

pub type SharedFreezer = Rc<RefCell<FreezerModel>>;

pub struct SimulatedSensor {
    plant: SharedFreezer,
    clock: MonotonicClock,
    fault_every: Option<u32>,
    step_c: f32,
    requests: u32,
}

impl SimulatedSensor {
    pub fn new(
        plant: SharedFreezer,
        clock: MonotonicClock,
        fault_every: Option<u32>,
        resolution_bits: u8,
    ) -> Self {
        Self {
            plant,
            clock,
            fault_every: fault_every.filter(|n| *n > 0),
            step_c: resolution_step_c(resolution_bits),
            requests: 0,
        }
    }
}

impl TemperatureSensor for SimulatedSensor {
    fn request_reading(&mut self) -> Result<f32, SensorFault> {
        self.requests = self.requests.wrapping_add(1);
        if let Some(every) = self.fault_every {
            if self.requests % every == 0 {
                return Err(SensorFault::Disconnected);
            }
        }

        let mut plant = self.plant.borrow_mut();
        plant.advance(self.clock.now_ms());
        Ok(quantize(plant.temperature_c(), self.step_c))
    }

    fn address(&self) -> Option<SensorAddress> {
        Some(SIMULATED_ADDRESS)
    }
}

pub struct SimulatedRelay {
    plant: SharedFreezer,
    clock: MonotonicClock,
}

impl SimulatedRelay {
    pub fn new(plant: SharedFreezer, clock: MonotonicClock) -> Self {
        plant.borrow_mut().set_compressor(false, clock.now_ms());
        Self { plant, clock }
    }
}

impl RelayActuator for SimulatedRelay {
    fn set_energized(&mut self, energized: bool) {
        self.plant
            .borrow_mut()
            .set_compressor(energized, self.clock.now_ms());
    }
}

#[derive(Debug, Default)]
pub struct ConsoleDisplay {
    frames_shown: u64,
}

impl ConsoleDisplay {
    pub fn connect(attached: bool) -> Result<Self, DisplayError> {
        if attached {
            Ok(Self::default())
        } else {
            Err(DisplayError::NotDetected)
        }
    }

    pub fn frames_shown(&self) -> u64 {
        self.frames_shown
    }
}

impl StatusDisplay for ConsoleDisplay {
    fn show_status(&mut self, frame: &StatusFrame) -> Result<(), DisplayError> {
        self.frames_shown += 1;
        info!(target: "display", "[{}] [{}]", frame.temperature_line(), frame.relay_line());
        Ok(())
    }
}

// 0.5 °C at 9 bits, halving per extra bit.
fn resolution_step_c(bits: u8) -> f32 {
    let extra = bits.clamp(9, 12) - 9;
    0.5 / f32::from(1_u8 << extra)
}

fn quantize(value: f32, step: f32) -> f32 {
    (value / step).round() * step
}

#[cfg(test)]
mod tests {
    use fridge_common::{DisplayReading, RelayState};

    use super::*;

    fn model() -> FreezerModel {
        FreezerModel::new(SimulationConfig {
            initial_temp_c: -16.0,
            warming_rate_c_per_min: 0.5,
            cooling_rate_c_per_min: 1.0,
            ..SimulationConfig::default()
        })
    }

    #[test]
    fn warms_while_compressor_off() {
        let mut freezer = model();
        freezer.advance(0);
        freezer.advance(120_000);
        assert!((freezer.temperature_c() - -15.0).abs() < 1e-4);
    }

    #[test]
    fn cools_while_compressor_on() {
        let mut freezer = model();
        freezer.set_compressor(true, 0);
        freezer.advance(180_000);
        assert!(freezer.is_compressor_on());
        assert!((freezer.temperature_c() - -19.0).abs() < 1e-4);
    }

    #[test]
    fn switching_settles_elapsed_time_first() {
        let mut freezer = model();
        freezer.advance(0);
        freezer.set_compressor(true, 60_000);
        freezer.advance(120_000);
        // +0.5 while off, then -1.0 while on.
        assert!((freezer.temperature_c() - -16.5).abs() < 1e-4);
    }

    #[test]
    fn stays_between_floor_and_ambient() {
        let mut freezer = model();
        freezer.advance(0);
        freezer.advance(600 * 60_000);
        assert_eq!(freezer.temperature_c(), 21.0);

        freezer.set_compressor(true, 600 * 60_000);
        freezer.advance(1_200 * 60_000);
        assert_eq!(freezer.temperature_c(), -30.0);
    }

    #[test]
    fn advance_handles_counter_rollover() {
        let mut freezer = model();
        freezer.advance(u32::MAX - 59_999);
        freezer.advance(60_000);
        assert!((freezer.temperature_c() - -15.0).abs() < 1e-4);
    }

    #[test]
    fn default_simulation_is_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_unusable_simulation() {
        let inverted = SimulationConfig {
            floor_temp_c: 25.0,
            ..SimulationConfig::default()
        };
        let negative_rate = SimulationConfig {
            cooling_rate_c_per_min: -0.9,
            ..SimulationConfig::default()
        };
        let nan_ambient = SimulationConfig {
            ambient_temp_c: f32::NAN,
            ..SimulationConfig::default()
        };

        assert!(inverted.validate().is_err());
        assert!(negative_rate.validate().is_err());
        assert!(nan_ambient.validate().is_err());
    }

    #[test]
    fn resolution_steps_match_probe() {
        assert_eq!(resolution_step_c(9), 0.5);
        assert_eq!(resolution_step_c(10), 0.25);
        assert_eq!(resolution_step_c(12), 0.0625);
        assert_eq!(quantize(-16.3, 0.5), -16.5);
        assert_eq!(quantize(-16.2, 0.5), -16.0);
    }

    #[test]
    fn sensor_injects_periodic_faults() {
        let plant = Rc::new(RefCell::new(model()));
        let mut sensor = SimulatedSensor::new(plant, MonotonicClock::new(), Some(3), 9);

        assert_eq!(sensor.request_reading(), Ok(-16.0));
        assert_eq!(sensor.request_reading(), Ok(-16.0));
        assert_eq!(sensor.request_reading(), Err(SensorFault::Disconnected));
        assert!(sensor.request_reading().is_ok());
        assert_eq!(sensor.address().map(|a| a.family_code()), Some(0x28));
    }

    #[test]
    fn zero_fault_period_disables_faults() {
        let plant = Rc::new(RefCell::new(model()));
        let mut sensor = SimulatedSensor::new(plant, MonotonicClock::new(), Some(0), 9);
        for _ in 0..5 {
            assert!(sensor.request_reading().is_ok());
        }
    }

    #[test]
    fn relay_drives_compressor() {
        let plant = Rc::new(RefCell::new(model()));
        let mut relay = SimulatedRelay::new(plant.clone(), MonotonicClock::new());
        assert!(!plant.borrow().is_compressor_on());

        relay.set_energized(true);
        assert!(plant.borrow().is_compressor_on());

        relay.set_energized(false);
        assert!(!plant.borrow().is_compressor_on());
    }

    #[test]
    fn detached_display_fails_to_connect() {
        assert_eq!(
            ConsoleDisplay::connect(false).unwrap_err(),
            DisplayError::NotDetected
        );

        let mut display = ConsoleDisplay::connect(true).unwrap();
        let frame = StatusFrame {
            reading: DisplayReading::Live(-16.0),
            relay: RelayState::Off,
        };
        display.show_status(&frame).unwrap();
        assert_eq!(display.frames_shown(), 1);
    }
}
