use crate::{
    config::{ConfigError, ControlConfig},
    diagnostics::{ControlEvent, Diagnostics, NoDiagnostics},
    display::{DisplayReading, StatusFrame},
    hysteresis, interval,
    ports::{Clock, RelayActuator, SensorFault, StatusDisplay, TemperatureSensor},
    types::{ControllerStatus, RelayState},
};

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    NotDue,
    Held {
        temperature_c: f32,
    },
    Switched {
        relay: RelayState,
        temperature_c: f32,
    },
    SensorFault(SensorFault),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControllerState {
    pub last_sample_ms: u32,
    pub relay: RelayState,
    pub last_temperature_c: Option<f32>,
    pub relay_switches: u32,
    pub sensor_faults: u32,
    pub consecutive_faults: u32,
}

#[derive(Debug)]
pub struct FridgeController<S, R, D, G = NoDiagnostics> {
    config: ControlConfig,
    state: ControllerState,
    sensor: S,
    relay: R,
    display: D,
    diagnostics: G,
}

impl<S, R, D> FridgeController<S, R, D>
where
    S: TemperatureSensor,
    R: RelayActuator,
    D: StatusDisplay,
{
    pub fn new(
        config: ControlConfig,
        sensor: S,
        relay: R,
        display: D,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            state: ControllerState::default(),
            sensor,
            relay,
            display,
            diagnostics: NoDiagnostics,
        })
    }
}

impl<S, R, D, G> FridgeController<S, R, D, G>
where
    S: TemperatureSensor,
    R: RelayActuator,
    D: StatusDisplay,
    G: Diagnostics,
{
    pub fn with_diagnostics<N: Diagnostics>(
        self,
        diagnostics: N,
    ) -> FridgeController<S, R, D, N> {
        FridgeController {
            config: self.config,
            state: self.state,
            sensor: self.sensor,
            relay: self.relay,
            display: self.display,
            diagnostics,
        }
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn relay_state(&self) -> RelayState {
        self.state.relay
    }

    pub fn last_temperature_c(&self) -> Option<f32> {
        self.state.last_temperature_c
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn relay(&self) -> &R {
        &self.relay
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn diagnostics(&self) -> &G {
        &self.diagnostics
    }

    pub fn poll<C: Clock>(&mut self, clock: &C) -> TickOutcome {
        self.tick(clock.now_ms())
    }

    pub fn tick(&mut self, now_ms: u32) -> TickOutcome {
        if !interval::elapsed(
            self.state.last_sample_ms,
            now_ms,
            self.config.sample_interval_ms,
        ) {
            return TickOutcome::NotDue;
        }
        self.state.last_sample_ms = now_ms;

        let outcome = match self.read_sensor() {
            Ok(temperature_c) => self.apply_reading(temperature_c),
            Err(fault) => self.handle_fault(fault),
        };

        let reading = match (&outcome, self.state.last_temperature_c) {
            (TickOutcome::SensorFault(_), Some(last)) => DisplayReading::Stale(last),
            (TickOutcome::SensorFault(_), None) => DisplayReading::Missing,
            (_, Some(last)) => DisplayReading::Live(last),
            (_, None) => DisplayReading::Missing,
        };
        self.refresh_display(reading);

        outcome
    }

    pub fn shutdown(&mut self) -> bool {
        if !self.state.relay.is_energized() {
            return false;
        }
        self.relay.set_energized(false);
        self.state.relay = RelayState::Off;
        self.state.relay_switches = self.state.relay_switches.saturating_add(1);
        true
    }

    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            relay: self.state.relay.as_str(),
            temperature_c: self.state.last_temperature_c,
            low_threshold_c: self.config.low_threshold_c,
            high_threshold_c: self.config.high_threshold_c,
            last_sample_ms: self.state.last_sample_ms,
            relay_switches: self.state.relay_switches,
            sensor_faults: self.state.sensor_faults,
            consecutive_faults: self.state.consecutive_faults,
        }
    }

    fn read_sensor(&mut self) -> Result<f32, SensorFault> {
        let value = self.sensor.request_reading()?;
        if self.config.is_plausible(value) {
            Ok(value)
        } else {
            Err(SensorFault::OutOfRange { value })
        }
    }

    fn apply_reading(&mut self, temperature_c: f32) -> TickOutcome {
        self.state.last_temperature_c = Some(temperature_c);
        self.state.consecutive_faults = 0;
        self.diagnostics.record(&ControlEvent::Sampled { temperature_c });

        let energized = self.state.relay.is_energized();
        let next = hysteresis::decide(temperature_c, energized, &self.config);
        if next == energized {
            return TickOutcome::Held { temperature_c };
        }

        let relay = RelayState::from_energized(next);
        self.relay.set_energized(next);
        self.state.relay = relay;
        self.state.relay_switches = self.state.relay_switches.saturating_add(1);
        self.diagnostics.record(&ControlEvent::RelaySwitched {
            relay,
            temperature_c,
        });

        TickOutcome::Switched {
            relay,
            temperature_c,
        }
    }

    fn handle_fault(&mut self, fault: SensorFault) -> TickOutcome {
        self.state.sensor_faults = self.state.sensor_faults.saturating_add(1);
        self.state.consecutive_faults = self.state.consecutive_faults.saturating_add(1);
        self.diagnostics.record(&ControlEvent::SensorFault {
            fault: fault.clone(),
        });
        TickOutcome::SensorFault(fault)
    }

    fn refresh_display(&mut self, reading: DisplayReading) {
        let frame = StatusFrame {
            reading,
            relay: self.state.relay,
        };
        if let Err(error) = self.display.show_status(&frame) {
            self.diagnostics.record(&ControlEvent::DisplayFault { error });
        }
    }
}
