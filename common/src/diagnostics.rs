use crate::{
    ports::{DisplayError, SensorFault},
    types::RelayState,
};

#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    Sampled { temperature_c: f32 },
    RelaySwitched { relay: RelayState, temperature_c: f32 },
    SensorFault { fault: SensorFault },
    DisplayFault { error: DisplayError },
}

/// Sink for controller events. The default body drops the event, so a
/// controller built with [`NoDiagnostics`] compiles the calls away.
pub trait Diagnostics {
    #[inline]
    fn record(&mut self, event: &ControlEvent) {
        let _ = event;
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoDiagnostics;

impl Diagnostics for NoDiagnostics {}
