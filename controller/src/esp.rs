use core::convert::Infallible;
use std::{thread, time::Duration};

use anyhow::{anyhow, Context};
use ds18b20::{Ds18b20, Resolution};
use esp_idf_hal::{
    delay::Ets,
    gpio::{AnyIOPin, InputOutput, Output, PinDriver, Pull},
    i2c::{I2c, I2cConfig, I2cDriver},
    peripheral::Peripheral,
    prelude::*,
};
use esp_idf_svc::log::EspLogger;
use log::{debug, info, warn};
use one_wire_bus::{Address, OneWire};

use fridge_common::{
    ControlEvent, Diagnostics, DisplayError, FridgeController, RelayActuator, RuntimeConfig,
    SensorAddress, SensorFault, TemperatureSensor,
};

use crate::{clock::MonotonicClock, ssd1306::Ssd1306};

/// Value the DS18B20 scratchpad decodes to when the probe drops off the bus.
const DISCONNECTED_SENTINEL_C: f32 = -127.0;

const DISPLAY_SDA_PIN: i32 = 4;
const DISPLAY_SCL_PIN: i32 = 5;
const WATCHDOG_TIMEOUT: Duration = Duration::from_secs(30);
const LOOP_PERIOD_MS: u64 = 100;

type OneWireBus = OneWire<PinDriver<'static, AnyIOPin, InputOutput>>;

struct Ds18b20Probe {
    bus: Option<OneWireBus>,
    address: Option<Address>,
    resolution: Resolution,
    pin: i32,
    delay: Ets,
}

impl Ds18b20Probe {
    fn new(pin: i32, resolution: Resolution) -> Self {
        let mut probe = Self {
            bus: None,
            address: None,
            resolution,
            pin,
            delay: Ets,
        };
        probe.reconnect();
        probe
    }

    fn reconnect(&mut self) {
        if self.bus.is_none() {
            match open_bus(self.pin) {
                Ok(bus) => self.bus = Some(bus),
                Err(err) => {
                    warn!("one-wire bus on GPIO{} unavailable: {err:#}", self.pin);
                    self.address = None;
                    return;
                }
            }
        }
        self.address = self.scan();
        if let Some(address) = self.address {
            self.apply_resolution(address);
        }
    }

    fn scan(&mut self) -> Option<Address> {
        let bus = self.bus.as_mut()?;
        let mut others = 0_u32;
        let mut found = None;

        for result in bus.devices(false, &mut self.delay) {
            let address = match result {
                Ok(address) => address,
                Err(err) => {
                    warn!("one-wire search stopped: {err:?}");
                    break;
                }
            };
            if found.is_none() && address.family_code() == ds18b20::FAMILY_CODE {
                found = Some(address);
            } else {
                others = others.saturating_add(1);
            }
        }

        match found {
            Some(address) => info!(
                "sensor address = {} on GPIO{} ({others} other device(s) on the bus)",
                SensorAddress::from_rom(address.0),
                self.pin
            ),
            None => warn!(
                "unable to find address for DS18B20 on GPIO{} ({others} other device(s) on the bus)",
                self.pin
            ),
        }
        found
    }

    fn apply_resolution(&mut self, address: Address) {
        let Some(bus) = self.bus.as_mut() else {
            return;
        };
        let result = Ds18b20::new::<Infallible>(address)
            .map_err(|err| format!("{err:?}"))
            .and_then(|sensor| {
                sensor
                    .set_config(i8::MIN, i8::MAX, self.resolution, bus, &mut self.delay)
                    .map_err(|err| format!("{err:?}"))
            });
        if let Err(err) = result {
            warn!("failed to set DS18B20 resolution: {err}");
        }
    }

    fn bus_fault(&mut self, detail: String) -> SensorFault {
        self.address = None;
        SensorFault::Bus(detail)
    }
}

fn open_bus(pin: i32) -> anyhow::Result<OneWireBus> {
    // SAFETY: only the probe claims this GPIO, and a previous driver for it
    // has been dropped before the bus is opened again.
    let mut one_wire_pin = PinDriver::input_output_od(unsafe { AnyIOPin::new(pin) })?;
    one_wire_pin.set_pull(Pull::Up)?;
    one_wire_pin.set_high()?;
    OneWire::new(one_wire_pin).map_err(|err| anyhow!("failed to release one-wire bus: {err:?}"))
}

fn measure(
    bus: &mut OneWireBus,
    address: Address,
    resolution: Resolution,
    delay: &mut Ets,
) -> Result<f32, String> {
    let sensor = Ds18b20::new::<Infallible>(address)
        .map_err(|err| format!("invalid DS18B20 address: {err:?}"))?;
    ds18b20::start_simultaneous_temp_measurement(bus, delay)
        .map_err(|err| format!("failed to start DS18B20 conversion: {err:?}"))?;
    resolution.delay_for_measurement_time(delay);
    let data = sensor
        .read_data(bus, delay)
        .map_err(|err| format!("failed to read DS18B20 data: {err:?}"))?;
    Ok(data.temperature)
}

impl TemperatureSensor for Ds18b20Probe {
    fn request_reading(&mut self) -> Result<f32, SensorFault> {
        if self.address.is_none() {
            self.reconnect();
        }
        let Some(bus) = self.bus.as_mut() else {
            return Err(SensorFault::Bus("one-wire bus unavailable".to_string()));
        };
        let address = self.address.ok_or(SensorFault::NotFound)?;

        let measured = measure(bus, address, self.resolution, &mut self.delay);
        let temperature = measured.map_err(|detail| self.bus_fault(detail))?;

        if temperature == DISCONNECTED_SENTINEL_C {
            self.address = None;
            return Err(SensorFault::Disconnected);
        }

        debug!("[DS18B20] temperature: {temperature:.2} °C");
        Ok(temperature)
    }

    fn address(&self) -> Option<SensorAddress> {
        self.address.map(|address| SensorAddress::from_rom(address.0))
    }
}

struct GpioRelay {
    pin: PinDriver<'static, AnyIOPin, Output>,
}

impl GpioRelay {
    fn new(pin: AnyIOPin) -> anyhow::Result<Self> {
        let mut pin = PinDriver::output(pin)?;
        pin.set_low()?;
        Ok(Self { pin })
    }
}

impl RelayActuator for GpioRelay {
    fn set_energized(&mut self, energized: bool) {
        let result = if energized {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        if let Err(err) = result {
            warn!("failed to drive SSR pin: {err:?}");
        }
    }
}

struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn record(&mut self, event: &ControlEvent) {
        match event {
            ControlEvent::Sampled { temperature_c } => {
                info!("current temperature = {temperature_c:.2} °C");
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

pub fn run() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    let runtime = RuntimeConfig::default();
    runtime
        .validate()
        .context("refusing to start with an invalid configuration")?;
    let hardware = &runtime.hardware;

    let peripherals = Peripherals::take()?;

    // SAFETY: the pin numbers come from a validated configuration and each
    // GPIO is claimed exactly once; `peripherals.pins` is never used. The
    // sensor pin is claimed by the probe itself.
    let (relay_pin, sda, scl) = unsafe {
        (
            AnyIOPin::new(hardware.relay_pin),
            AnyIOPin::new(DISPLAY_SDA_PIN),
            AnyIOPin::new(DISPLAY_SCL_PIN),
        )
    };

    // Relay output goes low before the display or sensor bus are touched.
    let relay = GpioRelay::new(relay_pin).context("failed to configure SSR output")?;
    info!("SSR ready on GPIO{}", hardware.relay_pin);

    let display = match connect_display(peripherals.i2c0, sda, scl, hardware.display_address) {
        Ok(display) => {
            info!("SSD1306 ready at {:#04x}", hardware.display_address);
            Some(display)
        }
        Err(err) => {
            warn!("SSD1306 allocation failed, continuing without display: {err}");
            None
        }
    };

    let sensor = Ds18b20Probe::new(
        hardware.sensor_pin,
        resolution_from_bits(hardware.sensor_resolution_bits),
    );
    if sensor.address().is_none() {
        warn!("temperature sensor not ready, relay stays off until it answers");
    }

    let mut controller = FridgeController::new(runtime.control.clone(), sensor, relay, display)?
        .with_diagnostics(LogDiagnostics);

    let watchdog = TaskWatchdog::subscribe(WATCHDOG_TIMEOUT)?;

    let clock = MonotonicClock::new();
    info!(
        "controller started: band {:.1}..{:.1} °C, sampling every {} ms",
        runtime.control.low_threshold_c,
        runtime.control.high_threshold_c,
        runtime.control.sample_interval_ms
    );

    loop {
        watchdog.feed();
        controller.poll(&clock);
        thread::sleep(Duration::from_millis(LOOP_PERIOD_MS));
    }
}

fn connect_display<I: I2c>(
    i2c: impl Peripheral<P = I> + 'static,
    sda: AnyIOPin,
    scl: AnyIOPin,
    address: u8,
) -> Result<Ssd1306, DisplayError> {
    let config = I2cConfig::new().baudrate(400.kHz().into());
    let driver = I2cDriver::new(i2c, sda, scl, &config)
        .map_err(|err| DisplayError::Bus(format!("{err:?}")))?;
    Ssd1306::new(driver, address)
}

fn resolution_from_bits(bits: u8) -> Resolution {
    match bits {
        9 => Resolution::Bits9,
        10 => Resolution::Bits10,
        11 => Resolution::Bits11,
        _ => Resolution::Bits12,
    }
}

struct TaskWatchdog;

impl TaskWatchdog {
    fn subscribe(timeout: Duration) -> anyhow::Result<Self> {
        let config = esp_idf_svc::sys::esp_task_wdt_config_t {
            timeout_ms: u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX),
            idle_core_mask: 0,
            trigger_panic: true,
        };
        check_watchdog("esp_task_wdt_init", unsafe {
            esp_idf_svc::sys::esp_task_wdt_init(&config)
        })?;
        check_watchdog("esp_task_wdt_add", unsafe {
            esp_idf_svc::sys::esp_task_wdt_add(core::ptr::null_mut())
        })?;
        info!("task watchdog armed ({} s)", timeout.as_secs());
        Ok(Self)
    }

    fn feed(&self) {
        let rc = unsafe { esp_idf_svc::sys::esp_task_wdt_reset() };
        if rc != esp_idf_svc::sys::ESP_OK {
            debug!("watchdog reset returned {rc}");
        }
    }
}

// Already initialized or already subscribed counts as success.
fn check_watchdog(call: &str, rc: esp_idf_svc::sys::esp_err_t) -> anyhow::Result<()> {
    if rc == esp_idf_svc::sys::ESP_OK || rc == esp_idf_svc::sys::ESP_ERR_INVALID_STATE {
        Ok(())
    } else {
        Err(anyhow!("{call} failed with code {rc}"))
    }
}
