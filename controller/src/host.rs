use std::{cell::RefCell, io::ErrorKind, path::Path, rc::Rc, time::Duration};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use fridge_common::{
    interval, Clock, ControlEvent, Diagnostics, FridgeController, RelayActuator, RuntimeConfig,
    StatusDisplay, TemperatureSensor,
};

use crate::{
    clock::MonotonicClock,
    sim::{ConsoleDisplay, FreezerModel, SimulatedRelay, SimulatedSensor, SimulationConfig},
};

const CONFIG_PATH: &str = "fridge.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct HostSettings {
    host: LoopConfig,
    simulation: SimulationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct LoopConfig {
    poll_interval_ms: u32,
    status_interval_ms: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            status_interval_ms: 300_000,
        }
    }
}

struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn record(&mut self, event: &ControlEvent) {
        match event {
            ControlEvent::Sampled { temperature_c } => {
                debug!("current temperature = {temperature_c:.2} °C");
            }
            ControlEvent::RelaySwitched {
                relay,
                temperature_c,
            } => {
                info!(
                    "switching relay {} at {temperature_c:.2} °C",
                    relay.as_str().to_lowercase()
                );
            }
            ControlEvent::SensorFault { fault } => {
                warn!("could not read temperature data: {fault}");
            }
            ControlEvent::DisplayFault { error } => {
                warn!("status display update failed: {error}");
            }
        }
    }
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let (runtime, settings) = load_config(Path::new(CONFIG_PATH))
        .await
        .with_context(|| format!("failed to load {CONFIG_PATH}"))?;
    validate_config(&runtime, &settings)?;
    info!(
        "configuration: {}",
        serde_json::to_string(&runtime).context("failed to serialize configuration")?
    );

    let clock = MonotonicClock::with_offset(settings.simulation.clock_offset_ms);
    let plant = Rc::new(RefCell::new(FreezerModel::new(settings.simulation.clone())));

    // Relay first so the compressor is known to be off before anything else.
    let relay = SimulatedRelay::new(plant.clone(), clock);

    let display = match ConsoleDisplay::connect(settings.simulation.display_attached) {
        Ok(display) => Some(display),
        Err(err) => {
            warn!("status display unavailable, continuing without it: {err}");
            None
        }
    };

    let sensor = SimulatedSensor::new(
        plant.clone(),
        clock,
        settings.simulation.fault_every,
        runtime.hardware.sensor_resolution_bits,
    );
    match sensor.address() {
        Some(address) => info!("sensor address = {address}"),
        None => warn!("unable to find address for sensor 0"),
    }

    let mut controller = FridgeController::new(runtime.control.clone(), sensor, relay, display)?
        .with_diagnostics(TracingDiagnostics);

    info!(
        "controller started: band {:.1}..{:.1} °C, sampling every {} ms",
        runtime.control.low_threshold_c,
        runtime.control.high_threshold_c,
        runtime.control.sample_interval_ms
    );

    let mut poll = tokio::time::interval(Duration::from_millis(u64::from(
        settings.host.poll_interval_ms.max(1),
    )));
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut last_status_ms = clock.now_ms();

    loop {
        tokio::select! {
            _ = poll.tick() => {
                controller.poll(&clock);

                let now_ms = clock.now_ms();
                if interval::elapsed(last_status_ms, now_ms, settings.host.status_interval_ms) {
                    last_status_ms = now_ms;
                    report_status(&controller);
                }
            }
            result = &mut shutdown => {
                if let Err(err) = result {
                    warn!("failed to listen for shutdown signal: {err}");
                }
                break;
            }
        }
    }

    if controller.shutdown() {
        info!("relay de-energized for shutdown");
    }
    report_status(&controller);
    {
        let freezer = plant.borrow();
        info!(
            "simulated freezer at {:.2} °C, compressor {}",
            freezer.temperature_c(),
            if freezer.is_compressor_on() { "on" } else { "off" }
        );
    }
    if let Some(console) = controller.display() {
        debug!("{} status frames shown", console.frames_shown());
    }
    info!("controller stopped");
    Ok(())
}

async fn load_config(path: &Path) -> anyhow::Result<(RuntimeConfig, HostSettings)> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!("no {} found, using built-in defaults", path.display());
            return Ok((RuntimeConfig::default(), HostSettings::default()));
        }
        Err(err) => return Err(err.into()),
    };

    let runtime = RuntimeConfig::from_json(&raw)?;
    let settings = serde_json::from_slice::<HostSettings>(&raw)?;
    Ok((runtime, settings))
}

fn validate_config(runtime: &RuntimeConfig, settings: &HostSettings) -> anyhow::Result<()> {
    runtime
        .validate()
        .context("refusing to start with an invalid configuration")?;
    settings
        .simulation
        .validate()
        .context("refusing to start with an invalid simulation")?;
    Ok(())
}

fn report_status<S, R, D, G>(controller: &FridgeController<S, R, D, G>)
where
    S: TemperatureSensor,
    R: RelayActuator,
    D: StatusDisplay,
    G: Diagnostics,
{
    match serde_json::to_string(&controller.status()) {
        Ok(payload) => info!("status {payload}"),
        Err(err) => warn!("failed to serialize controller status: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn missing_config_file_uses_defaults() {
        let (runtime, settings) = load_config(Path::new("does-not-exist/fridge.json"))
            .await
            .unwrap();

        assert_eq!(runtime, RuntimeConfig::default());
        assert_eq!(settings.host.poll_interval_ms, 100);
        assert!(settings.simulation.display_attached);
    }

    #[test]
    fn one_document_feeds_both_sections() {
        let raw = br#"{
            "control": { "sample_interval_ms": 5000 },
            "simulation": { "fault_every": 4, "display_attached": false },
            "host": { "poll_interval_ms": 50 }
        }"#;

        let runtime = RuntimeConfig::from_json(raw).unwrap();
        let settings = serde_json::from_slice::<HostSettings>(raw).unwrap();

        assert_eq!(runtime.control.sample_interval_ms, 5_000);
        assert_eq!(runtime.control.low_threshold_c, -18.0);
        assert_eq!(settings.simulation.fault_every, Some(4));
        assert!(!settings.simulation.display_attached);
        assert_eq!(settings.host.poll_interval_ms, 50);
        assert_eq!(settings.host.status_interval_ms, 300_000);
    }

    #[test]
    fn inverted_simulation_range_fails_at_startup() {
        let raw = br#"{ "simulation": { "floor_temp_c": 25.0, "ambient_temp_c": 21.0 } }"#;

        let runtime = RuntimeConfig::from_json(raw).unwrap();
        let settings = serde_json::from_slice::<HostSettings>(raw).unwrap();
        let err = validate_config(&runtime, &settings).unwrap_err();

        assert_eq!(err.to_string(), "refusing to start with an invalid simulation");
    }

    #[test]
    fn default_configuration_passes_startup_checks() {
        assert!(validate_config(&RuntimeConfig::default(), &HostSettings::default()).is_ok());
    }
}
