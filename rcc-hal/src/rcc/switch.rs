//! System clock source selection.

use core::marker::PhantomData;

use super::bus::RegisterBus;
use super::error::{ClockFault, ConfigError, HardwareTimeout};
use super::osc;
use super::wait::{poll_until, Timeout};
use crate::family::{self, Family};

/// The oscillator the status field reports as driving SYSCLK.
pub(crate) fn current_source<F: Family, B: RegisterBus>(bus: &mut B) -> F::Osc {
    let code = bus.read_field(F::SWS);
    F::SYSCLK_SOURCES
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(o, _)| *o)
        .unwrap_or(F::SAFE_SOURCE)
}

pub(crate) fn select_source<F: Family, B: RegisterBus>(bus: &mut B, source: F::Osc) -> Result<(), ClockFault> {
    let name = F::oscillator(source).name;
    let code = family::sysclk_code::<F>(source).ok_or(ConfigError::NotSystemClock(name))?;
    if !osc::is_ready::<F, B>(bus, source) {
        return Err(ClockFault::SourceNotReady(name));
    }
    if bus.write_field(F::SW, code) {
        trace!("rcc: sysclk -> {}", name);
    }
    Ok(())
}

pub(crate) fn wait_for_switch<F: Family, B: RegisterBus, T: Timeout + ?Sized>(
    bus: &mut B,
    source: F::Osc,
    timeout: &mut T,
) -> Result<(), ClockFault> {
    let name = F::oscillator(source).name;
    let code = family::sysclk_code::<F>(source).ok_or(ConfigError::NotSystemClock(name))?;
    poll_until(timeout, || bus.read_field(F::SWS) == code, HardwareTimeout::Switch(name))
}

/// System clock multiplexer.
pub struct ClockSwitch<'a, F: Family, B: RegisterBus> {
    bus: &'a mut B,
    _family: PhantomData<F>,
}

impl<'a, F: Family, B: RegisterBus> ClockSwitch<'a, F, B> {
    pub(crate) fn new(bus: &'a mut B) -> Self {
        Self { bus, _family: PhantomData }
    }

    /// Writes the source selector. The oscillator must already be ready;
    /// nothing is written otherwise.
    pub fn select_source(&mut self, source: F::Osc) -> Result<(), ClockFault> {
        select_source::<F, B>(self.bus, source)
    }

    /// Polls the status field until it reports `source`.
    pub fn wait_for_switch<T: Timeout + ?Sized>(&mut self, source: F::Osc, timeout: &mut T) -> Result<(), ClockFault> {
        wait_for_switch::<F, B, T>(self.bus, source, timeout)
    }

    pub fn current_source(&mut self) -> F::Osc {
        current_source::<F, B>(self.bus)
    }
}
